//! Oracle backend via the blocking `oracle` crate.
//!
//! The driver is synchronous, so every call runs on the blocking thread
//! pool through `tokio::task::spawn_blocking`. The connection sits
//! behind a `std::sync::Mutex` which also serializes statement execution
//! per connection.

use crate::db::driver::NativeConnection;
use crate::error::{Error, Result};
use crate::models::{ConnectionProfile, Dialect, Row};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// One native Oracle connection.
pub struct OracleConnection {
    conn: Arc<Mutex<Option<oracle::Connection>>>,
}

impl OracleConnection {
    /// Establish a connection from a resolved profile.
    ///
    /// Uses the EZCONNECT form `//host:port/sid`. Transport security is
    /// the Oracle client's concern (TCPS requires wallet configuration),
    /// so the profile's TLS mode is not applied here.
    pub async fn connect(profile: &ConnectionProfile) -> Result<Self> {
        let sid = profile
            .sid
            .clone()
            .ok_or(Error::missing_credential(Dialect::Oracle, "sid"))?;
        let connect_string = format!("//{}:{}/{}", profile.host, profile.port, sid);
        let username = profile.username.clone();
        let password = profile.password.clone();
        let target = profile.describe();

        let conn = tokio::task::spawn_blocking(move || {
            oracle::Connection::connect(&username, &password, &connect_string)
        })
        .await
        .map_err(|e| Error::internal(format!("oracle connect task failed: {}", e)))?
        .map_err(|e| Error::connection_init(Dialect::Oracle, target, e.to_string()))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
        })
    }

    /// Run a closure against the live connection on the blocking pool.
    async fn with_conn<T, F>(&self, sql_for_errors: String, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&oracle::Connection) -> std::result::Result<T, oracle::Error> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| Error::internal("oracle connection mutex poisoned"))?;
            let conn = guard
                .as_ref()
                .ok_or_else(|| Error::query(Dialect::Oracle, &sql_for_errors, "connection is closed"))?;
            f(conn).map_err(|e| Error::query(Dialect::Oracle, &sql_for_errors, e.to_string()))
        })
        .await
        .map_err(|e| Error::internal(format!("oracle worker task failed: {}", e)))?
    }
}

#[async_trait]
impl NativeConnection for OracleConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Oracle
    }

    async fn query(&self, sql: &str) -> Result<Vec<Row>> {
        let sql_owned = sql.to_string();
        self.with_conn(sql.to_string(), move |conn| {
            let rows = conn.query(&sql_owned, &[])?;
            let columns: Vec<String> = rows
                .column_info()
                .iter()
                .map(|c| c.name().to_string())
                .collect();

            let mut out = Vec::new();
            for row_result in rows {
                let row = row_result?;
                out.push(ora_row_to_json(&columns, &row));
            }
            Ok(out)
        })
        .await
    }

    async fn ping(&self) -> Result<()> {
        self.with_conn("ping".to_string(), |conn| conn.ping()).await
    }

    async fn close(&self) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let taken = {
                let mut guard = conn
                    .lock()
                    .map_err(|_| Error::internal("oracle connection mutex poisoned"))?;
                guard.take()
            };
            if let Some(conn) = taken {
                conn.close()
                    .map_err(|e| Error::internal(format!("failed to close connection: {}", e)))?;
            }
            Ok(())
        })
        .await
        .map_err(|e| Error::internal(format!("oracle close task failed: {}", e)))?
    }
}

/// Convert one Oracle row to a JSON object.
///
/// The driver converts most scalar types on demand; probe integers, then
/// floats, then text, then raw bytes.
fn ora_row_to_json(columns: &[String], row: &oracle::Row) -> Row {
    let mut out = Row::new();
    for (idx, name) in columns.iter().enumerate() {
        out.insert(name.clone(), ora_value_to_json(row, idx));
    }
    out
}

fn ora_value_to_json(row: &oracle::Row, idx: usize) -> Value {
    if let Ok(v) = row.get::<usize, Option<i64>>(idx) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.get::<usize, Option<f64>>(idx) {
        return v
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null);
    }
    if let Ok(v) = row.get::<usize, Option<String>>(idx) {
        return v.map(Value::String).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.get::<usize, Option<Vec<u8>>>(idx) {
        return v
            .map(|bytes| Value::String(BASE64.encode(bytes)))
            .unwrap_or(Value::Null);
    }
    Value::Null
}
