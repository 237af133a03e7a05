//! PostgreSQL backend via tokio-postgres.

use crate::db::driver::{NativeConnection, liveness_sql};
use crate::error::{Error, Result};
use crate::models::{ConnectionProfile, Dialect, Row, TlsMode};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_postgres::NoTls;
use tokio_postgres::types::Type;
use tracing::debug;

/// One native PostgreSQL connection.
///
/// tokio-postgres splits a session into a `Client` and a background
/// connection task; the task handle is kept so `close` can tear down the
/// socket deterministically.
pub struct PostgresConnection {
    client: tokio_postgres::Client,
    io_task: JoinHandle<()>,
    closed: AtomicBool,
}

impl PostgresConnection {
    /// Establish a connection from a resolved profile.
    pub async fn connect(profile: &ConnectionProfile, connect_timeout: Duration) -> Result<Self> {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&profile.host)
            .port(profile.port)
            .user(&profile.username)
            .password(&profile.password)
            .dbname(&profile.database)
            .connect_timeout(connect_timeout);

        let init_err = |e: tokio_postgres::Error| {
            Error::connection_init(Dialect::PostgreSql, profile.describe(), e.to_string())
        };

        let (client, io_task) = match profile.tls {
            TlsMode::Disabled => {
                let (client, connection) = config.connect(NoTls).await.map_err(init_err)?;
                let task = tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        debug!(error = %e, "postgres connection task ended");
                    }
                });
                (client, task)
            }
            TlsMode::AcceptInvalid => {
                let connector = TlsConnector::builder()
                    .danger_accept_invalid_certs(true)
                    .build()
                    .map_err(|e| {
                        Error::connection_init(
                            Dialect::PostgreSql,
                            profile.describe(),
                            format!("failed to build TLS connector: {}", e),
                        )
                    })?;
                let tls = MakeTlsConnector::new(connector);
                let (client, connection) = config.connect(tls).await.map_err(init_err)?;
                let task = tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        debug!(error = %e, "postgres connection task ended");
                    }
                });
                (client, task)
            }
        };

        Ok(Self {
            client,
            io_task,
            closed: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl NativeConnection for PostgresConnection {
    fn dialect(&self) -> Dialect {
        Dialect::PostgreSql
    }

    async fn query(&self, sql: &str) -> Result<Vec<Row>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::query(Dialect::PostgreSql, sql, "connection is closed"));
        }

        let pg_rows = self
            .client
            .query(sql, &[])
            .await
            .map_err(|e| Error::query(Dialect::PostgreSql, sql, e.to_string()))?;

        Ok(pg_rows.iter().map(pg_row_to_json).collect())
    }

    async fn ping(&self) -> Result<()> {
        self.query(liveness_sql(Dialect::PostgreSql)).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            // Aborting the io task drops the socket; the client side
            // errors out on any later use, which `query` guards against.
            self.io_task.abort();
        }
        Ok(())
    }
}

/// Convert a tokio-postgres row to a JSON object.
fn pg_row_to_json(row: &tokio_postgres::Row) -> Row {
    let mut out = Row::new();
    for (idx, column) in row.columns().iter().enumerate() {
        out.insert(
            column.name().to_string(),
            pg_value_to_json(row, idx, column.type_()),
        );
    }
    out
}

fn pg_value_to_json(row: &tokio_postgres::Row, idx: usize, ty: &Type) -> Value {
    fn opt<T>(v: std::result::Result<Option<T>, tokio_postgres::Error>) -> Option<T> {
        v.ok().flatten()
    }

    if *ty == Type::BOOL {
        opt(row.try_get::<_, Option<bool>>(idx))
            .map(Value::Bool)
            .unwrap_or(Value::Null)
    } else if *ty == Type::INT2 {
        opt(row.try_get::<_, Option<i16>>(idx))
            .map(|v| Value::from(v as i64))
            .unwrap_or(Value::Null)
    } else if *ty == Type::INT4 {
        opt(row.try_get::<_, Option<i32>>(idx))
            .map(|v| Value::from(v as i64))
            .unwrap_or(Value::Null)
    } else if *ty == Type::INT8 {
        opt(row.try_get::<_, Option<i64>>(idx))
            .map(Value::from)
            .unwrap_or(Value::Null)
    } else if *ty == Type::FLOAT4 {
        opt(row.try_get::<_, Option<f32>>(idx))
            .and_then(|v| serde_json::Number::from_f64(v as f64))
            .map(Value::Number)
            .unwrap_or(Value::Null)
    } else if *ty == Type::FLOAT8 {
        opt(row.try_get::<_, Option<f64>>(idx))
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    } else if *ty == Type::NUMERIC {
        opt(row.try_get::<_, Option<rust_decimal::Decimal>>(idx))
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null)
    } else if *ty == Type::VARCHAR || *ty == Type::TEXT || *ty == Type::BPCHAR || *ty == Type::NAME
    {
        opt(row.try_get::<_, Option<String>>(idx))
            .map(Value::String)
            .unwrap_or(Value::Null)
    } else if *ty == Type::BYTEA {
        opt(row.try_get::<_, Option<Vec<u8>>>(idx))
            .map(|v| Value::String(BASE64.encode(v)))
            .unwrap_or(Value::Null)
    } else if *ty == Type::DATE {
        opt(row.try_get::<_, Option<chrono::NaiveDate>>(idx))
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null)
    } else if *ty == Type::TIME {
        opt(row.try_get::<_, Option<chrono::NaiveTime>>(idx))
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null)
    } else if *ty == Type::TIMESTAMP {
        opt(row.try_get::<_, Option<chrono::NaiveDateTime>>(idx))
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null)
    } else if *ty == Type::TIMESTAMPTZ {
        opt(row.try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(idx))
            .map(|v| Value::String(v.to_rfc3339()))
            .unwrap_or(Value::Null)
    } else if *ty == Type::UUID {
        opt(row.try_get::<_, Option<uuid::Uuid>>(idx))
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null)
    } else if *ty == Type::JSON || *ty == Type::JSONB {
        opt(row.try_get::<_, Option<Value>>(idx)).unwrap_or(Value::Null)
    } else {
        opt(row.try_get::<_, Option<String>>(idx))
            .map(Value::String)
            .unwrap_or(Value::Null)
    }
}
