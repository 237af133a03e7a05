//! Per-dialect SQL generation.
//!
//! Each supported dialect implements [`DialectOps`]: the liveness probe,
//! the two catalog queries used by introspection, and the paginated
//! fetch builder. Adding a dialect means implementing the trait, not
//! editing a shared switch.
//!
//! # Architecture
//!
//! Catalog SQL lives in the `queries` submodule with constants for each
//! dialect. All three catalog query pairs alias their output columns to
//! `table_schema` / `table_name` / `column_name` / `ordinal_position`
//! so the introspector can join result sets without per-dialect casing
//! rules.

use crate::error::{Error, Result};
use crate::models::Dialect;

/// Dialect-specific SQL capability set.
pub trait DialectOps: Send + Sync {
    /// The dialect this implementation serves.
    fn dialect(&self) -> Dialect;

    /// Trivial query used to confirm a cached connection is still usable.
    fn liveness_sql(&self) -> &'static str;

    /// Quote a single identifier part.
    fn quote_identifier(&self, name: &str) -> String;

    /// Catalog query listing base tables (system schemas excluded).
    fn list_tables_sql(&self) -> &'static str;

    /// Catalog query listing columns of base tables (system schemas excluded).
    fn list_columns_sql(&self) -> &'static str;

    /// Paginated fetch from an already-qualified table identifier,
    /// admitting exactly rows `offset+1 ..= offset+limit`.
    fn page_sql(&self, table: &str, limit: u64, offset: u64) -> String;
}

/// Get the operations for a dialect.
pub fn ops_for(dialect: Dialect) -> &'static dyn DialectOps {
    match dialect {
        Dialect::PostgreSql => &PostgresOps,
        Dialect::Oracle => &OracleOps,
        Dialect::SqlServer => &SqlServerOps,
    }
}

/// Validate a caller-supplied, optionally schema-qualified table
/// identifier before it is interpolated into SQL.
///
/// Accepts at most one `.` qualifier; each part must start with a letter
/// or underscore and continue with alphanumerics, `_`, `$` or `#`
/// (Oracle allows the latter two). Anything else is rejected so page
/// and catalog SQL cannot be injected through identifiers.
pub fn validate_table_identifier(identifier: &str) -> Result<()> {
    let parts: Vec<&str> = identifier.split('.').collect();
    if identifier.is_empty() || parts.len() > 2 {
        return Err(Error::invalid_identifier(identifier));
    }
    for part in parts {
        let mut chars = part.chars();
        let valid_first = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        let valid_rest =
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '#');
        if !valid_first || !valid_rest || part.len() > 128 {
            return Err(Error::invalid_identifier(identifier));
        }
    }
    Ok(())
}

// =============================================================================
// SQL Query Templates
// =============================================================================
//
// Centralized catalog queries for schema introspection. Each dialect has
// its own submodule with queries adapted to its system catalogs.

mod queries {
    pub mod postgres {
        pub const LIST_TABLES: &str = r#"
            SELECT table_schema, table_name
            FROM information_schema.tables
            WHERE table_type = 'BASE TABLE'
              AND table_schema NOT IN ('pg_catalog', 'information_schema')
            ORDER BY table_schema, table_name
            "#;

        pub const LIST_COLUMNS: &str = r#"
            SELECT table_schema, table_name, column_name, ordinal_position
            FROM information_schema.columns
            WHERE table_schema NOT IN ('pg_catalog', 'information_schema')
            ORDER BY table_schema, table_name, ordinal_position
            "#;
    }

    pub mod oracle {
        // Owner exclusions cover the schemas Oracle seeds into every
        // instance; customer schemas are everything else.
        pub const LIST_TABLES: &str = r#"
            SELECT owner AS "table_schema", table_name AS "table_name"
            FROM all_tables
            WHERE owner NOT IN (
                'SYS', 'SYSTEM', 'OUTLN', 'XDB', 'CTXSYS', 'MDSYS',
                'ORDSYS', 'DBSNMP', 'APPQOSSYS', 'WMSYS', 'GSMADMIN_INTERNAL'
            )
            ORDER BY owner, table_name
            "#;

        pub const LIST_COLUMNS: &str = r#"
            SELECT owner AS "table_schema", table_name AS "table_name",
                   column_name AS "column_name", column_id AS "ordinal_position"
            FROM all_tab_columns
            WHERE owner NOT IN (
                'SYS', 'SYSTEM', 'OUTLN', 'XDB', 'CTXSYS', 'MDSYS',
                'ORDSYS', 'DBSNMP', 'APPQOSSYS', 'WMSYS', 'GSMADMIN_INTERNAL'
            )
            ORDER BY owner, table_name, column_id
            "#;
    }

    pub mod sqlserver {
        pub const LIST_TABLES: &str = r#"
            SELECT TABLE_SCHEMA AS table_schema, TABLE_NAME AS table_name
            FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_TYPE = 'BASE TABLE'
              AND TABLE_SCHEMA NOT IN ('sys', 'INFORMATION_SCHEMA')
            ORDER BY TABLE_SCHEMA, TABLE_NAME
            "#;

        pub const LIST_COLUMNS: &str = r#"
            SELECT c.TABLE_SCHEMA AS table_schema, c.TABLE_NAME AS table_name,
                   c.COLUMN_NAME AS column_name, c.ORDINAL_POSITION AS ordinal_position
            FROM INFORMATION_SCHEMA.COLUMNS c
            JOIN INFORMATION_SCHEMA.TABLES t
                ON t.TABLE_SCHEMA = c.TABLE_SCHEMA AND t.TABLE_NAME = c.TABLE_NAME
            WHERE t.TABLE_TYPE = 'BASE TABLE'
              AND c.TABLE_SCHEMA NOT IN ('sys', 'INFORMATION_SCHEMA')
            ORDER BY c.TABLE_SCHEMA, c.TABLE_NAME, c.ORDINAL_POSITION
            "#;
    }
}

/// PostgreSQL operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresOps;

impl DialectOps for PostgresOps {
    fn dialect(&self) -> Dialect {
        Dialect::PostgreSql
    }

    fn liveness_sql(&self) -> &'static str {
        "SELECT 1"
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn list_tables_sql(&self) -> &'static str {
        queries::postgres::LIST_TABLES
    }

    fn list_columns_sql(&self) -> &'static str {
        queries::postgres::LIST_COLUMNS
    }

    fn page_sql(&self, table: &str, limit: u64, offset: u64) -> String {
        format!("SELECT * FROM {} LIMIT {} OFFSET {}", table, limit, offset)
    }
}

/// Oracle operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct OracleOps;

impl DialectOps for OracleOps {
    fn dialect(&self) -> Dialect {
        Dialect::Oracle
    }

    fn liveness_sql(&self) -> &'static str {
        "SELECT 1 FROM DUAL"
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn list_tables_sql(&self) -> &'static str {
        queries::oracle::LIST_TABLES
    }

    fn list_columns_sql(&self) -> &'static str {
        queries::oracle::LIST_COLUMNS
    }

    fn page_sql(&self, table: &str, limit: u64, offset: u64) -> String {
        // Nested ROWNUM window admitting rows (offset, offset+limit].
        // The outer filter must use the aliased rnum: ROWNUM is assigned
        // before ORDER BY/after WHERE, so a direct `ROWNUM > n` matches
        // nothing.
        format!(
            "SELECT * FROM (SELECT inner_q.*, ROWNUM rnum FROM (SELECT * FROM {}) inner_q WHERE ROWNUM <= {}) WHERE rnum > {}",
            table,
            offset + limit,
            offset
        )
    }
}

/// SQL Server operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerOps;

impl DialectOps for SqlServerOps {
    fn dialect(&self) -> Dialect {
        Dialect::SqlServer
    }

    fn liveness_sql(&self) -> &'static str {
        "SELECT 1"
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("[{}]", name.replace(']', "]]"))
    }

    fn list_tables_sql(&self) -> &'static str {
        queries::sqlserver::LIST_TABLES
    }

    fn list_columns_sql(&self) -> &'static str {
        queries::sqlserver::LIST_COLUMNS
    }

    fn page_sql(&self, table: &str, limit: u64, offset: u64) -> String {
        // OFFSET-FETCH requires an ORDER BY clause.
        format!(
            "SELECT * FROM {} ORDER BY (SELECT NULL) OFFSET {} ROWS FETCH NEXT {} ROWS ONLY",
            table, offset, limit
        )
    }
}
