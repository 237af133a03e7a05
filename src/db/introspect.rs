//! Schema introspection module.
//!
//! Runs the dialect's catalog queries against a live connection and
//! joins the table and column result sets into [`TableInfo`] records,
//! and fetches bounded row pages with dialect-appropriate pagination.

use crate::db::driver::NativeConnection;
use crate::dialect::{ops_for, validate_table_identifier};
use crate::error::{Error, Result};
use crate::models::{Dialect, Row, TableInfo};
use std::collections::HashMap;
use tracing::debug;

/// Schema introspector for external databases.
pub struct SchemaIntrospector;

impl SchemaIntrospector {
    /// List base tables with their column names.
    ///
    /// Issues two catalog queries (tables, then columns) and joins them
    /// by qualified `schema.table` name. Table ordering and column
    /// ordinal ordering follow the catalog queries' ORDER BY clauses.
    pub async fn list_tables_and_columns(
        conn: &dyn NativeConnection,
        dialect: Dialect,
    ) -> Result<Vec<TableInfo>> {
        let ops = ops_for(dialect);

        let tables_sql = ops.list_tables_sql();
        let table_rows = conn
            .query(tables_sql)
            .await
            .map_err(|e| introspection_error(dialect, tables_sql, e))?;

        let columns_sql = ops.list_columns_sql();
        let column_rows = conn
            .query(columns_sql)
            .await
            .map_err(|e| introspection_error(dialect, columns_sql, e))?;

        // Group columns by qualified table name, preserving ordinal
        // order from the catalog query.
        let mut columns_by_table: HashMap<String, Vec<String>> = HashMap::new();
        for row in &column_rows {
            let (Some(schema), Some(table), Some(column)) = (
                field_str(row, "table_schema"),
                field_str(row, "table_name"),
                field_str(row, "column_name"),
            ) else {
                continue;
            };
            columns_by_table
                .entry(format!("{}.{}", schema, table))
                .or_default()
                .push(column.to_string());
        }

        let mut out = Vec::with_capacity(table_rows.len());
        for row in &table_rows {
            let (Some(schema), Some(table)) = (
                field_str(row, "table_schema"),
                field_str(row, "table_name"),
            ) else {
                continue;
            };
            let qualified = format!("{}.{}", schema, table);
            out.push(TableInfo {
                table: table.to_string(),
                schema: schema.to_string(),
                columns: columns_by_table.remove(&qualified).unwrap_or_default(),
            });
        }

        debug!(dialect = %dialect, tables = out.len(), "introspected schema");
        Ok(out)
    }

    /// Fetch one bounded page of rows from an already-qualified table.
    ///
    /// The identifier is validated before being interpolated; the page
    /// query admits exactly rows `offset+1 ..= offset+limit`.
    pub async fn fetch_page(
        conn: &dyn NativeConnection,
        dialect: Dialect,
        table: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Row>> {
        validate_table_identifier(table)?;

        let sql = ops_for(dialect).page_sql(table, limit, offset);
        let mut rows = conn
            .query(&sql)
            .await
            .map_err(|e| query_error(dialect, &sql, e))?;

        // Oracle's ROWNUM wrapper adds a bookkeeping column; drop it
        // before returning rows to the caller.
        if dialect == Dialect::Oracle {
            for row in &mut rows {
                row.remove("RNUM");
                row.remove("rnum");
            }
        }

        Ok(rows)
    }
}

/// Look up a string field tolerating driver casing differences.
fn field_str<'a>(row: &'a Row, name: &str) -> Option<&'a str> {
    row.get(name)
        .or_else(|| row.get(name.to_uppercase().as_str()))
        .and_then(|v| v.as_str())
}

fn introspection_error(dialect: Dialect, sql: &str, source: Error) -> Error {
    match source {
        Error::Query { message, .. } => Error::introspection(dialect, sql, message),
        other => other,
    }
}

fn query_error(dialect: Dialect, sql: &str, source: Error) -> Error {
    match source {
        // Drivers already attach the SQL; keep the variant but make sure
        // the failing statement is the page query the caller saw built.
        Error::Query { message, .. } => Error::query(dialect, sql, message),
        other => other,
    }
}
