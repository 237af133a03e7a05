//! SQL Server backend via tiberius.

use crate::db::driver::{NativeConnection, liveness_sql};
use crate::error::{Error, Result};
use crate::models::{ConnectionProfile, Dialect, Row, TlsMode};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::Value;
use tiberius::{AuthMethod, Client, Config, EncryptionLevel};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

type TdsClient = Client<Compat<TcpStream>>;

/// One native SQL Server connection.
///
/// tiberius requires `&mut` access for queries, so the client sits
/// behind an async mutex. `close` takes the client out, dropping the
/// socket; later queries observe the empty slot.
pub struct SqlServerConnection {
    client: Mutex<Option<TdsClient>>,
}

impl SqlServerConnection {
    /// Establish a connection from a resolved profile.
    pub async fn connect(profile: &ConnectionProfile) -> Result<Self> {
        let mut config = Config::new();
        config.host(&profile.host);
        config.port(profile.port);
        config.database(&profile.database);
        config.authentication(AuthMethod::sql_server(&profile.username, &profile.password));

        match profile.tls {
            TlsMode::AcceptInvalid => config.trust_cert(),
            TlsMode::Disabled => config.encryption(EncryptionLevel::NotSupported),
        }

        let init_err = |message: String| {
            Error::connection_init(Dialect::SqlServer, profile.describe(), message)
        };

        let tcp = TcpStream::connect(config.get_addr())
            .await
            .map_err(|e| init_err(format!("failed to connect: {}", e)))?;
        tcp.set_nodelay(true).ok();

        let client = Client::connect(config, tcp.compat_write())
            .await
            .map_err(|e| init_err(format!("failed to authenticate: {}", e)))?;

        Ok(Self {
            client: Mutex::new(Some(client)),
        })
    }
}

#[async_trait]
impl NativeConnection for SqlServerConnection {
    fn dialect(&self) -> Dialect {
        Dialect::SqlServer
    }

    async fn query(&self, sql: &str) -> Result<Vec<Row>> {
        let mut guard = self.client.lock().await;
        let client = guard
            .as_mut()
            .ok_or_else(|| Error::query(Dialect::SqlServer, sql, "connection is closed"))?;

        let stream = client
            .query(sql, &[])
            .await
            .map_err(|e| Error::query(Dialect::SqlServer, sql, e.to_string()))?;

        // into_first_result materializes the first result set; a
        // single-row result comes back as a one-element Vec like any
        // other.
        let tds_rows = stream
            .into_first_result()
            .await
            .map_err(|e| Error::query(Dialect::SqlServer, sql, e.to_string()))?;

        Ok(tds_rows.iter().map(tds_row_to_json).collect())
    }

    async fn ping(&self) -> Result<()> {
        self.query(liveness_sql(Dialect::SqlServer)).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if let Some(client) = self.client.lock().await.take() {
            client
                .close()
                .await
                .map_err(|e| Error::internal(format!("failed to close TDS client: {}", e)))?;
        }
        Ok(())
    }
}

/// Convert a tiberius row to a JSON object.
///
/// tiberius exposes values through typed `try_get`; probe bool first,
/// then numerics, then strings, then binary, so BIT columns do not come
/// back as raw bytes.
fn tds_row_to_json(row: &tiberius::Row) -> Row {
    let mut out = Row::new();
    for (idx, column) in row.columns().iter().enumerate() {
        out.insert(column.name().to_string(), tds_value_to_json(row, idx));
    }
    out
}

fn tds_value_to_json(row: &tiberius::Row, idx: usize) -> Value {
    if let Ok(Some(v)) = row.try_get::<bool, _>(idx) {
        return Value::Bool(v);
    }
    if let Ok(Some(v)) = row.try_get::<i16, _>(idx) {
        return Value::from(v as i64);
    }
    if let Ok(Some(v)) = row.try_get::<i32, _>(idx) {
        return Value::from(v as i64);
    }
    if let Ok(Some(v)) = row.try_get::<i64, _>(idx) {
        return Value::from(v);
    }
    if let Ok(Some(v)) = row.try_get::<f32, _>(idx) {
        return serde_json::Number::from_f64(v as f64)
            .map(Value::Number)
            .unwrap_or(Value::Null);
    }
    if let Ok(Some(v)) = row.try_get::<f64, _>(idx) {
        return serde_json::Number::from_f64(v)
            .map(Value::Number)
            .unwrap_or(Value::Null);
    }
    if let Ok(Some(v)) = row.try_get::<&str, _>(idx) {
        return Value::String(v.to_string());
    }
    if let Ok(Some(v)) = row.try_get::<uuid::Uuid, _>(idx) {
        return Value::String(v.to_string());
    }
    if let Ok(Some(v)) = row.try_get::<chrono::NaiveDateTime, _>(idx) {
        return Value::String(v.to_string());
    }
    if let Ok(Some(v)) = row.try_get::<&[u8], _>(idx) {
        return Value::String(BASE64.encode(v));
    }
    Value::Null
}
