//! Deterministic pool-lookup keys.

use crate::models::{Credentials, Dialect};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

/// Deterministic identifier for a `(dialect, credentials)` pair.
///
/// Derivation canonicalizes the credential fields in a fixed order and
/// digests them, so two logically-identical credential sets always yield
/// the same key while distinct credentials collide only with negligible
/// probability. Keys are used for pool lookups only; `Display` prints an
/// abbreviated prefix so full keys never land in logs.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ConnectionKey(String);

impl ConnectionKey {
    /// Derive the key for a dialect and credential set.
    pub fn derive(dialect: Dialect, credentials: &Credentials) -> Self {
        let canonical = match credentials {
            Credentials::Url(url) => format!("{:?}|url|{}", dialect, url),
            Credentials::Discrete {
                host,
                port,
                username,
                password,
                database,
                sid,
            } => format!(
                "{:?}|discrete|{}|{}|{}|{}|{}|{}",
                dialect,
                host,
                port.map(|p| p.to_string()).unwrap_or_default(),
                username,
                password,
                database,
                sid.as_deref().unwrap_or_default(),
            ),
        };

        let digest = Sha256::digest(canonical.as_bytes());
        Self(URL_SAFE_NO_PAD.encode(digest))
    }

    /// Full key string, for map lookups.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}…", &self.0[..8.min(self.0.len())])
    }
}

impl std::fmt::Debug for ConnectionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ConnectionKey")
            .field(&self.to_string())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discrete(host: &str, database: &str) -> Credentials {
        Credentials::Discrete {
            host: host.into(),
            port: Some(5432),
            username: "u".into(),
            password: "p".into(),
            database: database.into(),
            sid: None,
        }
    }

    #[test]
    fn test_identical_credentials_same_key() {
        let a = ConnectionKey::derive(Dialect::PostgreSql, &discrete("h", "d"));
        let b = ConnectionKey::derive(Dialect::PostgreSql, &discrete("h", "d"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_credentials_different_key() {
        let a = ConnectionKey::derive(Dialect::PostgreSql, &discrete("h", "d1"));
        let b = ConnectionKey::derive(Dialect::PostgreSql, &discrete("h", "d2"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_dialect_is_part_of_key() {
        let creds = discrete("h", "d");
        let a = ConnectionKey::derive(Dialect::PostgreSql, &creds);
        let b = ConnectionKey::derive(Dialect::SqlServer, &creds);
        assert_ne!(a, b);
    }

    #[test]
    fn test_url_and_discrete_forms_are_distinct() {
        let a = ConnectionKey::derive(
            Dialect::PostgreSql,
            &Credentials::Url("postgres://u:p@h:5432/d".into()),
        );
        let b = ConnectionKey::derive(Dialect::PostgreSql, &discrete("h", "d"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_missing_optionals_do_not_collide_with_empty() {
        let with_sid = Credentials::Discrete {
            host: "h".into(),
            port: None,
            username: "u".into(),
            password: "p".into(),
            database: "d".into(),
            sid: Some("X".into()),
        };
        let without_sid = Credentials::Discrete {
            host: "h".into(),
            port: None,
            username: "u".into(),
            password: "p".into(),
            database: "d".into(),
            sid: None,
        };
        assert_ne!(
            ConnectionKey::derive(Dialect::Oracle, &with_sid),
            ConnectionKey::derive(Dialect::Oracle, &without_sid)
        );
    }

    #[test]
    fn test_display_abbreviates() {
        let key = ConnectionKey::derive(Dialect::PostgreSql, &discrete("h", "d"));
        let shown = key.to_string();
        assert!(shown.len() < key.as_str().len());
        assert!(shown.ends_with('…'));
    }
}
