//! Introspection result models.

use serde::Serialize;

/// A fetched row, normalized to a JSON object keyed by column name.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// One base table with its column names, in catalog ordinal order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableInfo {
    pub table: String,
    pub schema: String,
    pub columns: Vec<String>,
}

impl TableInfo {
    /// Qualified `schema.table` name used to join catalog result sets.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }
}
