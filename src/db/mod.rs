//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Connection pool management
//! - Native driver backends for the supported dialects
//! - Schema introspection and paginated fetches

pub mod driver;
pub mod introspect;
pub mod pool;

pub use driver::{ConnectionFactory, NativeConnection, NativeConnectionFactory};
pub use introspect::SchemaIntrospector;
pub use pool::{ConnectionPool, PoolStats};
