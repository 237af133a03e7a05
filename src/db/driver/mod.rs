//! Native driver abstraction.
//!
//! Core seams for database connectivity:
//! - NativeConnection: one live connection with query execution
//! - ConnectionFactory: dialect dispatch for connection establishment
//!
//! The pool owns connections through these traits only, which keeps the
//! three backends (tokio-postgres, tiberius, oracle) interchangeable and
//! lets tests substitute fakes.

pub mod oracle;
pub mod postgres;
pub mod sqlserver;

use crate::dialect::ops_for;
use crate::error::{Error, Result};
use crate::models::{ConnectionProfile, Dialect, Row};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// A live native connection to one external database.
///
/// The pool exclusively owns each connection's lifecycle; callers borrow
/// the handle for queries and never close it themselves.
#[async_trait]
pub trait NativeConnection: Send + Sync {
    /// The dialect this connection speaks.
    fn dialect(&self) -> Dialect;

    /// Execute a statement and return its rows, normalized to JSON
    /// objects. Implementations must return a `Vec` regardless of the
    /// shape the driver reports for single-row results.
    async fn query(&self, sql: &str) -> Result<Vec<Row>>;

    /// Liveness probe: runs the dialect's trivial query.
    async fn ping(&self) -> Result<()>;

    /// Tear down the native handle. Idempotent.
    async fn close(&self) -> Result<()>;
}

/// Factory for establishing native connections.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    /// Create a new connection for the resolved profile.
    async fn connect(&self, profile: &ConnectionProfile) -> Result<Arc<dyn NativeConnection>>;
}

/// Production factory: dispatches on the profile's dialect and bounds
/// establishment with a fixed connect timeout.
pub struct NativeConnectionFactory {
    connect_timeout: Duration,
}

impl NativeConnectionFactory {
    /// Create a factory with the given connect timeout.
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    async fn connect_inner(
        &self,
        profile: &ConnectionProfile,
    ) -> Result<Arc<dyn NativeConnection>> {
        match profile.dialect {
            Dialect::PostgreSql => {
                let conn =
                    postgres::PostgresConnection::connect(profile, self.connect_timeout).await?;
                Ok(Arc::new(conn))
            }
            Dialect::SqlServer => {
                let conn = sqlserver::SqlServerConnection::connect(profile).await?;
                Ok(Arc::new(conn))
            }
            Dialect::Oracle => {
                let conn = oracle::OracleConnection::connect(profile).await?;
                Ok(Arc::new(conn))
            }
        }
    }
}

#[async_trait]
impl ConnectionFactory for NativeConnectionFactory {
    async fn connect(&self, profile: &ConnectionProfile) -> Result<Arc<dyn NativeConnection>> {
        match tokio::time::timeout(self.connect_timeout, self.connect_inner(profile)).await {
            Ok(result) => result,
            Err(_) => Err(Error::connection_init(
                profile.dialect,
                profile.describe(),
                format!(
                    "connect timed out after {}s",
                    self.connect_timeout.as_secs()
                ),
            )),
        }
    }
}

/// Liveness SQL for a dialect, shared by the backends' `ping` impls.
pub(crate) fn liveness_sql(dialect: Dialect) -> &'static str {
    ops_for(dialect).liveness_sql()
}
