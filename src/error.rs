//! Error types for the connection manager.
//!
//! This module defines all error types using `thiserror` for ergonomic
//! error handling. Every rendered message carries enough non-secret
//! context (dialect, target, failing SQL) to be actionable; credentials
//! never appear in an error message or log line.

use crate::models::Dialect;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Dialect name outside the supported set.
    #[error("unsupported dialect '{name}': expected postgresql, oracle or sqlserver")]
    UnsupportedDialect { name: String },

    /// Malformed PostgreSQL connection string.
    #[error("invalid connection string: {message}")]
    InvalidConnectionString { message: String },

    /// A required credential field is absent.
    #[error("missing credential for {dialect}: {field}")]
    MissingCredential {
        dialect: Dialect,
        field: &'static str,
    },

    /// Native driver failed to establish or verify a connection.
    #[error("failed to initialize connection to {target}: {message}")]
    ConnectionInit {
        dialect: Dialect,
        /// Non-secret profile summary, e.g. `PostgreSQL at host:5432/db`.
        target: String,
        message: String,
    },

    /// A catalog query failed during schema introspection.
    #[error("introspection failed on {dialect}: {message} (sql: {sql})")]
    Introspection {
        dialect: Dialect,
        sql: String,
        message: String,
    },

    /// A data query failed.
    #[error("query failed on {dialect}: {message} (sql: {sql})")]
    Query {
        dialect: Dialect,
        sql: String,
        message: String,
    },

    /// Caller-supplied table identifier failed validation.
    #[error("invalid table identifier: {identifier}")]
    InvalidIdentifier { identifier: String },

    /// Internal error.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl Error {
    /// Create an unsupported dialect error.
    pub fn unsupported_dialect(name: impl Into<String>) -> Self {
        Self::UnsupportedDialect { name: name.into() }
    }

    /// Create an invalid connection string error.
    pub fn invalid_connection_string(message: impl Into<String>) -> Self {
        Self::InvalidConnectionString {
            message: message.into(),
        }
    }

    /// Create a missing credential error.
    pub fn missing_credential(dialect: Dialect, field: &'static str) -> Self {
        Self::MissingCredential { dialect, field }
    }

    /// Create a connection initialization error.
    pub fn connection_init(
        dialect: Dialect,
        target: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ConnectionInit {
            dialect,
            target: target.into(),
            message: message.into(),
        }
    }

    /// Create an introspection error carrying the attempted SQL.
    pub fn introspection(
        dialect: Dialect,
        sql: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Introspection {
            dialect,
            sql: sql.into(),
            message: message.into(),
        }
    }

    /// Create a query error carrying the failing SQL.
    pub fn query(dialect: Dialect, sql: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Query {
            dialect,
            sql: sql.into(),
            message: message.into(),
        }
    }

    /// Create an invalid identifier error.
    pub fn invalid_identifier(identifier: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            identifier: identifier.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Check if this error is retryable.
    ///
    /// Connection establishment can fail transiently; credential and
    /// identifier problems cannot resolve themselves.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConnectionInit { .. })
    }
}

/// Result type alias for connection manager operations.
pub type Result<T> = std::result::Result<T, Error>;
