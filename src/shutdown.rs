//! Graceful shutdown wiring.
//!
//! The host application owns the pool instance; awaiting
//! [`close_on_signal`] from its startup routine drains every native
//! socket on SIGINT/SIGTERM before the process exits.

use crate::db::ConnectionPool;
use std::sync::Arc;
use tokio::signal;
use tracing::info;

/// Wait for an interrupt or terminate signal, then close every pooled
/// connection. Returns once the drain completes.
pub async fn close_on_signal(pool: Arc<ConnectionPool>) {
    wait_for_signal().await;
    info!("shutdown signal received, draining connection pool");
    pool.close_all().await;
}

/// Wait for SIGINT or SIGTERM.
async fn wait_for_signal() {
    let ctrl_c = signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
