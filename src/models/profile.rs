//! Resolved connection profiles.

use crate::models::Dialect;

/// TLS policy for a resolved connection.
///
/// Customer databases frequently present self-signed certificates, so
/// the only TLS-on mode is "encrypt but accept any certificate".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    /// Plain TCP.
    Disabled,
    /// TLS with certificate verification disabled.
    AcceptInvalid,
}

/// Fully-resolved, driver-ready connection profile for one dialect.
///
/// Produced by [`resolver::resolve`](crate::resolver::resolve); all
/// defaults are applied and the connection-string form, if any, has been
/// parsed into discrete fields.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionProfile {
    pub dialect: Dialect,
    pub host: String,
    pub port: u16,
    pub username: String,
    /// Contains sensitive data - never log
    pub password: String,
    pub database: String,
    /// Oracle system identifier. Present only for the Oracle dialect.
    pub sid: Option<String>,
    pub tls: TlsMode,
}

impl ConnectionProfile {
    /// Non-secret summary used in error messages and log lines.
    pub fn describe(&self) -> String {
        format!(
            "{} at {}:{}/{}",
            self.dialect, self.host, self.port, self.database
        )
    }
}

impl std::fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("dialect", &self.dialect)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"****")
            .field("database", &self.database)
            .field("sid", &self.sid)
            .field("tls", &self.tls)
            .finish()
    }
}
