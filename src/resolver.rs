//! Credential resolution.
//!
//! Maps `(dialect, credentials)` to a fully-populated, driver-ready
//! [`ConnectionProfile`]. Pure: never mutates its input, performs no I/O,
//! and surfaces every error synchronously.

use crate::error::{Error, Result};
use crate::models::{ConnectionProfile, Credentials, Dialect, TlsMode};
use url::Url;

/// Hosts treated as local development, where TLS defaults to off.
const LOCAL_HOSTS: &[&str] = &["localhost", "127.0.0.1", "::1"];

/// Resolve credentials into a dialect-specific connection profile.
///
/// For PostgreSQL, a raw connection string (either the `Url` credential
/// form or a discrete `host` beginning with `postgresql://` or
/// `postgres://`) is parsed into discrete fields. All other dialects
/// require discrete credentials; Oracle additionally requires `sid`.
pub fn resolve(dialect: Dialect, credentials: &Credentials) -> Result<ConnectionProfile> {
    match credentials {
        Credentials::Url(raw) => {
            if dialect != Dialect::PostgreSql {
                return Err(Error::invalid_connection_string(format!(
                    "connection-string credentials are only supported for PostgreSQL, not {}",
                    dialect
                )));
            }
            parse_postgres_url(raw)
        }
        Credentials::Discrete { host, .. }
            if dialect == Dialect::PostgreSql && is_postgres_url(host) =>
        {
            parse_postgres_url(host)
        }
        Credentials::Discrete {
            host,
            port,
            username,
            password,
            database,
            sid,
        } => resolve_discrete(dialect, host, *port, username, password, database, sid.as_deref()),
    }
}

fn is_postgres_url(host: &str) -> bool {
    host.starts_with("postgresql://") || host.starts_with("postgres://")
}

/// Parse a PostgreSQL connection URL into a profile.
///
/// Defaults: host `localhost`, port 5432. `sslmode=require` enables TLS
/// with relaxed certificate verification; any other or absent value
/// leaves TLS off.
fn parse_postgres_url(raw: &str) -> Result<ConnectionProfile> {
    let url = Url::parse(raw).map_err(|e| Error::invalid_connection_string(e.to_string()))?;

    let host = url.host_str().unwrap_or("localhost").to_string();
    let port = url.port().unwrap_or_else(|| Dialect::PostgreSql.default_port());
    let username = url.username().to_string();
    let password = url.password().unwrap_or_default().to_string();

    let database = url
        .path()
        .trim_start_matches('/')
        .split('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(String::from)
        .ok_or(Error::missing_credential(Dialect::PostgreSql, "database"))?;

    let ssl_required = url
        .query_pairs()
        .any(|(k, v)| k == "sslmode" && v == "require");

    Ok(ConnectionProfile {
        dialect: Dialect::PostgreSql,
        host,
        port,
        username,
        password,
        database,
        sid: None,
        tls: if ssl_required {
            TlsMode::AcceptInvalid
        } else {
            TlsMode::Disabled
        },
    })
}

fn resolve_discrete(
    dialect: Dialect,
    host: &str,
    port: Option<u16>,
    username: &str,
    password: &str,
    database: &str,
    sid: Option<&str>,
) -> Result<ConnectionProfile> {
    if host.is_empty() {
        return Err(Error::missing_credential(dialect, "host"));
    }
    if username.is_empty() {
        return Err(Error::missing_credential(dialect, "username"));
    }
    if database.is_empty() {
        return Err(Error::missing_credential(dialect, "database"));
    }

    let sid = match (dialect, sid) {
        (Dialect::Oracle, Some(sid)) if !sid.is_empty() => Some(sid.to_string()),
        (Dialect::Oracle, _) => return Err(Error::missing_credential(dialect, "sid")),
        (_, _) => None,
    };

    // TLS on with relaxed verification everywhere outside local
    // development; customer databases rarely carry CA-signed certs.
    let tls = if LOCAL_HOSTS.contains(&host) {
        TlsMode::Disabled
    } else {
        TlsMode::AcceptInvalid
    };

    Ok(ConnectionProfile {
        dialect,
        host: host.to_string(),
        port: port.unwrap_or_else(|| dialect.default_port()),
        username: username.to_string(),
        password: password.to_string(),
        database: database.to_string(),
        sid,
        tls,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discrete(dialect_host: &str) -> Credentials {
        Credentials::Discrete {
            host: dialect_host.into(),
            port: None,
            username: "u".into(),
            password: "p".into(),
            database: "d".into(),
            sid: None,
        }
    }

    #[test]
    fn test_postgres_url_with_sslmode_require() {
        let creds = Credentials::Discrete {
            host: "postgresql://u:p@h:5432/d?sslmode=require".into(),
            port: None,
            username: String::new(),
            password: String::new(),
            database: String::new(),
            sid: None,
        };
        let profile = resolve(Dialect::PostgreSql, &creds).unwrap();
        assert_eq!(profile.host, "h");
        assert_eq!(profile.port, 5432);
        assert_eq!(profile.username, "u");
        assert_eq!(profile.password, "p");
        assert_eq!(profile.database, "d");
        assert_eq!(profile.tls, TlsMode::AcceptInvalid);
    }

    #[test]
    fn test_postgres_url_without_sslmode_disables_tls() {
        let creds = Credentials::Url("postgres://u:p@h/d".into());
        let profile = resolve(Dialect::PostgreSql, &creds).unwrap();
        assert_eq!(profile.tls, TlsMode::Disabled);
        assert_eq!(profile.port, 5432);
    }

    #[test]
    fn test_postgres_url_applies_port_default() {
        let creds = Credentials::Url("postgres://u:p@db.example.com/app".into());
        let profile = resolve(Dialect::PostgreSql, &creds).unwrap();
        assert_eq!(profile.host, "db.example.com");
        assert_eq!(profile.port, 5432);
    }

    #[test]
    fn test_postgres_url_missing_database_fails() {
        let creds = Credentials::Url("postgres://u:p@h:5432".into());
        let err = resolve(Dialect::PostgreSql, &creds).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingCredential {
                field: "database",
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_postgres_url_carries_parser_message() {
        let creds = Credentials::Url("postgres://u:p@h:notaport/d".into());
        let err = resolve(Dialect::PostgreSql, &creds).unwrap_err();
        match err {
            Error::InvalidConnectionString { message } => assert!(!message.is_empty()),
            other => panic!("expected InvalidConnectionString, got {:?}", other),
        }
    }

    #[test]
    fn test_url_credentials_rejected_for_oracle() {
        let creds = Credentials::Url("oracle://u:p@h/d".into());
        let err = resolve(Dialect::Oracle, &creds).unwrap_err();
        assert!(matches!(err, Error::InvalidConnectionString { .. }));
    }

    #[test]
    fn test_discrete_defaults_by_dialect() {
        let profile = resolve(Dialect::SqlServer, &discrete("db.example.com")).unwrap();
        assert_eq!(profile.port, 1433);
        assert_eq!(profile.tls, TlsMode::AcceptInvalid);
    }

    #[test]
    fn test_discrete_local_host_disables_tls() {
        let profile = resolve(Dialect::PostgreSql, &discrete("localhost")).unwrap();
        assert_eq!(profile.tls, TlsMode::Disabled);
        assert_eq!(profile.port, 5432);
    }

    #[test]
    fn test_oracle_requires_sid() {
        let err = resolve(Dialect::Oracle, &discrete("db.example.com")).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingCredential { field: "sid", .. }
        ));
    }

    #[test]
    fn test_oracle_with_sid_resolves() {
        let creds = Credentials::Discrete {
            host: "db.example.com".into(),
            port: Some(1522),
            username: "scott".into(),
            password: "tiger".into(),
            database: "ORCL".into(),
            sid: Some("ORCL".into()),
        };
        let profile = resolve(Dialect::Oracle, &creds).unwrap();
        assert_eq!(profile.port, 1522);
        assert_eq!(profile.sid.as_deref(), Some("ORCL"));
    }

    #[test]
    fn test_missing_discrete_fields_fail() {
        let creds = Credentials::Discrete {
            host: "h".into(),
            port: None,
            username: String::new(),
            password: "p".into(),
            database: "d".into(),
            sid: None,
        };
        let err = resolve(Dialect::SqlServer, &creds).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingCredential {
                field: "username",
                ..
            }
        ));
    }

    #[test]
    fn test_resolve_does_not_mutate_input() {
        let creds = discrete("db.example.com");
        let before = format!("{:?}", creds);
        let _ = resolve(Dialect::PostgreSql, &creds).unwrap();
        assert_eq!(before, format!("{:?}", creds));
    }
}
