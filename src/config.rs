//! Configuration for the connection manager.
//!
//! The host process supplies pool knobs either directly or through
//! environment variables; every field falls back to a documented default.

use std::time::Duration;

// Pool configuration defaults
pub const DEFAULT_MAX_CONNECTIONS: usize = 10;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 3_600;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3_600;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

// Environment variable names consumed by `PoolOptions::from_env`.
pub const ENV_MAX_CONNECTIONS: &str = "DBCONDUIT_MAX_CONNECTIONS";
pub const ENV_IDLE_TIMEOUT: &str = "DBCONDUIT_IDLE_TIMEOUT";
pub const ENV_SWEEP_INTERVAL: &str = "DBCONDUIT_SWEEP_INTERVAL";
pub const ENV_CONNECT_TIMEOUT: &str = "DBCONDUIT_CONNECT_TIMEOUT";

/// Connection pool configuration options.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct PoolOptions {
    /// Maximum live entries in the pool (default: 10)
    pub max_connections: Option<usize>,
    /// Idle timeout in seconds (default: 3600)
    pub idle_timeout_secs: Option<u64>,
    /// Liveness sweep interval in seconds (default: 3600)
    pub sweep_interval_secs: Option<u64>,
    /// Native connect timeout in seconds (default: 10)
    pub connect_timeout_secs: Option<u64>,
}

impl PoolOptions {
    /// Read options from the process environment. Unset or unparseable
    /// values fall back to defaults.
    pub fn from_env() -> Self {
        fn parse<T: std::str::FromStr>(name: &str) -> Option<T> {
            std::env::var(name).ok().and_then(|v| v.parse().ok())
        }

        Self {
            max_connections: parse(ENV_MAX_CONNECTIONS),
            idle_timeout_secs: parse(ENV_IDLE_TIMEOUT),
            sweep_interval_secs: parse(ENV_SWEEP_INTERVAL),
            connect_timeout_secs: parse(ENV_CONNECT_TIMEOUT),
        }
    }

    /// Get max_connections with default value.
    pub fn max_connections_or_default(&self) -> usize {
        self.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS)
    }

    /// Get idle_timeout with default value.
    pub fn idle_timeout_or_default(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs.unwrap_or(DEFAULT_IDLE_TIMEOUT_SECS))
    }

    /// Get sweep_interval with default value.
    pub fn sweep_interval_or_default(&self) -> Duration {
        Duration::from_secs(
            self.sweep_interval_secs
                .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS),
        )
    }

    /// Get connect_timeout with default value.
    pub fn connect_timeout_or_default(&self) -> Duration {
        Duration::from_secs(
            self.connect_timeout_secs
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
        )
    }

    /// Validate pool options and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(max) = self.max_connections {
            if max == 0 {
                return Err("max_connections must be greater than 0".to_string());
            }
        }
        if let Some(secs) = self.connect_timeout_secs {
            if secs == 0 {
                return Err("connect_timeout must be greater than 0".to_string());
            }
        }
        if let Some(secs) = self.sweep_interval_secs {
            if secs == 0 {
                return Err("sweep_interval must be greater than 0".to_string());
            }
        }
        Ok(())
    }
}
