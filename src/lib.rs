//! dbconduit
//!
//! Pooled, multi-dialect connectivity to customer-supplied relational
//! databases (PostgreSQL, Oracle, SQL Server). The crate lets a host
//! application open, reuse, health-check, bound and expire native
//! connections, then run dialect-specific introspection and
//! paginated-fetch queries against them.
//!
//! ```rust,no_run
//! use dbconduit::{ConnectionPool, Credentials, Dialect, PoolOptions, SchemaIntrospector};
//!
//! # async fn example() -> dbconduit::Result<()> {
//! let pool = ConnectionPool::new(PoolOptions::from_env());
//!
//! let creds = Credentials::Url("postgresql://u:p@db.example.com/app?sslmode=require".into());
//! let conn = pool.get_connection(Dialect::PostgreSql, &creds).await?;
//!
//! let tables = SchemaIntrospector::list_tables_and_columns(conn.as_ref(), Dialect::PostgreSql).await?;
//! let page = SchemaIntrospector::fetch_page(conn.as_ref(), Dialect::PostgreSql, "public.orders", 50, 0).await?;
//! # let _ = (tables, page);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod dialect;
pub mod error;
pub mod models;
pub mod resolver;
pub mod shutdown;

pub use config::PoolOptions;
pub use db::{
    ConnectionFactory, ConnectionPool, NativeConnection, PoolStats, SchemaIntrospector,
};
pub use error::{Error, Result};
pub use models::{ConnectionKey, ConnectionProfile, Credentials, Dialect, Row, TableInfo, TlsMode};
