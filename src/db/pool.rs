//! Connection pool management.
//!
//! The pool owns one native connection per `(dialect, credentials)` key,
//! bounded by `max_connections`. Entries are reused only after a
//! liveness probe, expire after an idle timeout, and are torn down by
//! the pool alone; callers borrow connection handles and never close
//! them directly.
//!
//! # Concurrency
//!
//! - Per-key `OnceCell` gives single-flight initialization: concurrent
//!   `get_connection` calls for the same unresolved key await one
//!   connect attempt instead of each opening a native connection.
//! - Locks are never held across driver I/O. Probes, connects and
//!   closes all happen outside the entries lock, with membership
//!   re-checked afterwards where it matters.
//! - The periodic sweep holds only a `Weak` pool reference, so dropping
//!   the pool stops the task instead of leaking it.

use crate::config::PoolOptions;
use crate::db::driver::{ConnectionFactory, NativeConnection, NativeConnectionFactory};
use crate::error::{Error, Result};
use crate::models::{ConnectionKey, Credentials, Dialect};
use crate::resolver;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::{OnceCell, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Pool counters returned by [`ConnectionPool::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PoolStats {
    /// Entries currently in the pool, including ones mid-initialization.
    pub total_connections: usize,
    /// Entries holding a live, initialized native connection.
    pub active_connections: usize,
}

/// One initialized pool entry.
///
/// Lifecycle: created on cache miss, touched on every successful reuse,
/// removed on explicit removal, failed probe, idle expiry, capacity
/// eviction or shutdown. Every terminal transition closes the native
/// handle exactly once, guarded by the drivers' idempotent `close`.
struct PoolEntry {
    key: ConnectionKey,
    conn: Arc<dyn NativeConnection>,
    created_at: Instant,
    /// Uses std::sync::RwLock (not tokio) to avoid holding locks across
    /// await points.
    last_touched: std::sync::RwLock<Instant>,
}

impl PoolEntry {
    fn new(key: ConnectionKey, conn: Arc<dyn NativeConnection>) -> Self {
        let now = Instant::now();
        Self {
            key,
            conn,
            created_at: now,
            last_touched: std::sync::RwLock::new(now),
        }
    }

    /// Reset the idle clock. Synchronous.
    fn touch(&self) {
        if let Ok(mut last_touched) = self.last_touched.write() {
            *last_touched = Instant::now();
        }
    }

    /// Last reuse time. Synchronous.
    fn last_touched(&self) -> Instant {
        self.last_touched
            .read()
            .map(|guard| *guard)
            .unwrap_or(self.created_at)
    }
}

/// Map slot: the single-flight cell plus its insertion time, so the
/// sweep can tell a healthy in-flight initialization from an abandoned
/// one.
#[derive(Clone)]
struct Slot {
    cell: Arc<OnceCell<PoolEntry>>,
    inserted_at: Instant,
}

/// Bounded pool of native connections keyed by [`ConnectionKey`].
pub struct ConnectionPool {
    factory: Arc<dyn ConnectionFactory>,
    entries: RwLock<HashMap<ConnectionKey, Slot>>,
    max_connections: usize,
    idle_timeout: Duration,
    sweep_interval: Duration,
    /// Empty cells older than this are reaped by the sweep; twice the
    /// connect timeout outlives any bounded connect attempt.
    init_grace: Duration,
    /// Sweep task handle. Uses std::sync::Mutex for synchronous storage.
    sweep_handle: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionPool {
    /// Create a pool backed by the native drivers.
    ///
    /// Spawns the periodic sweep task for the lifetime of the pool.
    pub fn new(options: PoolOptions) -> Arc<Self> {
        let factory = Arc::new(NativeConnectionFactory::new(
            options.connect_timeout_or_default(),
        ));
        Self::with_factory(options, factory)
    }

    /// Create a pool with a custom connection factory.
    pub fn with_factory(options: PoolOptions, factory: Arc<dyn ConnectionFactory>) -> Arc<Self> {
        let pool = Arc::new(Self {
            factory,
            entries: RwLock::new(HashMap::new()),
            max_connections: options.max_connections_or_default(),
            idle_timeout: options.idle_timeout_or_default(),
            sweep_interval: options.sweep_interval_or_default(),
            init_grace: options.connect_timeout_or_default() * 2,
            sweep_handle: std::sync::Mutex::new(None),
        });

        let weak = Arc::downgrade(&pool);
        let sweep_interval = pool.sweep_interval;
        let handle = tokio::spawn(async move {
            Self::sweep_task(weak, sweep_interval).await;
        });
        *pool.sweep_handle.lock().unwrap() = Some(handle);

        pool
    }

    /// Get a live connection for the given dialect and credentials,
    /// reusing a verified cached connection when one exists.
    pub async fn get_connection(
        &self,
        dialect: Dialect,
        credentials: &Credentials,
    ) -> Result<Arc<dyn NativeConnection>> {
        let key = ConnectionKey::derive(dialect, credentials);

        // Reuse path: probe the cached entry before handing it out.
        let cached = {
            let entries = self.entries.read().await;
            entries.get(&key).map(|slot| Arc::clone(&slot.cell))
        };
        if let Some(cell) = cached {
            if let Some(entry) = cell.get() {
                match entry.conn.ping().await {
                    Ok(()) => {
                        entry.touch();
                        debug!(key = %key, "reusing pooled connection");
                        return Ok(Arc::clone(&entry.conn));
                    }
                    Err(e) => {
                        warn!(key = %key, error = %e, "liveness probe failed, discarding entry");
                        self.remove_connection(&key).await;
                    }
                }
            }
            // Empty cell: an initialization is in flight; fall through
            // and join it below.
        }

        // Resolver errors are synchronous and surface before the map is
        // touched.
        let profile = resolver::resolve(dialect, credentials)?;

        // Claim or join the key's slot, evicting at capacity.
        let (cell, evicted) = {
            let mut entries = self.entries.write().await;
            match entries.get(&key) {
                Some(slot) => (Arc::clone(&slot.cell), None),
                None => {
                    let mut evicted = None;
                    if entries.len() >= self.max_connections {
                        // Victim is the least-recently-touched live
                        // entry. Slots still mid-initialization cannot
                        // be closed safely; if every slot is in flight
                        // the sweep restores the bound shortly.
                        if let Some(victim) = Self::lru_victim(&entries) {
                            evicted = entries.remove(&victim).map(|slot| (victim, slot));
                        }
                    }
                    let cell = Arc::new(OnceCell::new());
                    entries.insert(
                        key.clone(),
                        Slot {
                            cell: Arc::clone(&cell),
                            inserted_at: Instant::now(),
                        },
                    );
                    (cell, evicted)
                }
            }
        };

        if let Some((victim_key, slot)) = evicted {
            info!(key = %victim_key, "evicting least-recently-used entry at capacity");
            Self::close_slot(&victim_key, &slot).await;
        }

        // Single-flight initialization: concurrent callers for this key
        // await the same attempt.
        let init_result = cell
            .get_or_try_init(|| async {
                info!(key = %key, target = %profile.describe(), "initializing native connection");
                let conn = self.factory.connect(&profile).await?;
                if let Err(e) = conn.ping().await {
                    let _ = conn.close().await;
                    return Err(Error::connection_init(
                        dialect,
                        profile.describe(),
                        format!("verification probe failed: {}", e),
                    ));
                }
                Ok::<_, Error>(PoolEntry::new(key.clone(), conn))
            })
            .await;

        match init_result {
            Ok(entry) => {
                entry.touch();
                // A concurrent failure on this key may have dropped the
                // slot while we waited on the cell; restore membership
                // so the entry stays pool-managed.
                {
                    let mut entries = self.entries.write().await;
                    entries.entry(key.clone()).or_insert_with(|| Slot {
                        cell: Arc::clone(&cell),
                        inserted_at: Instant::now(),
                    });
                }
                Ok(Arc::clone(&entry.conn))
            }
            Err(e) => {
                // A failed initialization must not retain an entry.
                let mut entries = self.entries.write().await;
                if let Some(slot) = entries.get(&key) {
                    if Arc::ptr_eq(&slot.cell, &cell) && slot.cell.get().is_none() {
                        entries.remove(&key);
                    }
                }
                Err(e)
            }
        }
    }

    /// Remove one entry, closing its native connection if initialized.
    ///
    /// Idempotent; close failures are logged and swallowed so a broken
    /// teardown never blocks new acquisitions.
    pub async fn remove_connection(&self, key: &ConnectionKey) {
        let slot = { self.entries.write().await.remove(key) };
        if let Some(slot) = slot {
            Self::close_slot(key, &slot).await;
        }
    }

    /// One sweep pass: drop abandoned uninitialized slots, idle-expired
    /// entries, and entries whose liveness probe fails.
    pub async fn cleanup(&self) {
        let now = Instant::now();

        // Phase 1: classify under a read lock, holding it only to copy
        // out keys and connection handles.
        let mut stale_uninit = Vec::new();
        let mut idle_expired = Vec::new();
        let mut to_probe = Vec::new();
        {
            let entries = self.entries.read().await;
            for (key, slot) in entries.iter() {
                match slot.cell.get() {
                    None => {
                        // An empty cell is normally an in-flight
                        // initialization; reap it only once it has
                        // outlived any bounded connect attempt.
                        if now.saturating_duration_since(slot.inserted_at) > self.init_grace {
                            stale_uninit.push(key.clone());
                        }
                    }
                    Some(entry) => {
                        if now.saturating_duration_since(entry.last_touched()) > self.idle_timeout {
                            idle_expired.push(key.clone());
                        } else {
                            to_probe.push((key.clone(), Arc::clone(&entry.conn)));
                        }
                    }
                }
            }
        }

        // Phase 2: remove outside the read lock.
        for key in stale_uninit {
            debug!(key = %key, "removing abandoned uninitialized entry");
            self.remove_connection(&key).await;
        }
        for key in idle_expired {
            info!(key = %key, "removing idle-expired connection");
            self.remove_connection(&key).await;
        }
        for (key, conn) in to_probe {
            if let Err(e) = conn.ping().await {
                warn!(key = %key, error = %e, "sweep probe failed, removing connection");
                self.remove_connection(&key).await;
            }
        }
    }

    /// Close every entry concurrently and stop the sweep task.
    ///
    /// Every connection is attempted; individual close failures are
    /// logged, never propagated. Used on graceful shutdown.
    pub async fn close_all(&self) {
        {
            let mut handle_guard = self.sweep_handle.lock().unwrap();
            if let Some(handle) = handle_guard.take() {
                handle.abort();
            }
        }

        let drained: Vec<(ConnectionKey, Slot)> =
            { self.entries.write().await.drain().collect() };

        let closes = drained.iter().map(|(key, slot)| Self::close_slot(key, slot));
        futures_util::future::join_all(closes).await;
        info!("all connections closed");
    }

    /// Get pool counters.
    pub async fn stats(&self) -> PoolStats {
        let entries = self.entries.read().await;
        PoolStats {
            total_connections: entries.len(),
            active_connections: entries
                .values()
                .filter(|slot| slot.cell.get().is_some())
                .count(),
        }
    }

    fn lru_victim(entries: &HashMap<ConnectionKey, Slot>) -> Option<ConnectionKey> {
        entries
            .iter()
            .filter_map(|(key, slot)| slot.cell.get().map(|entry| (key, entry.last_touched())))
            .min_by_key(|(_, touched)| *touched)
            .map(|(key, _)| key.clone())
    }

    async fn close_slot(key: &ConnectionKey, slot: &Slot) {
        if let Some(entry) = slot.cell.get() {
            if let Err(e) = entry.conn.close().await {
                warn!(key = %key, error = %e, "failed to close native connection");
            }
            info!(key = %entry.key, "closed connection");
        }
    }

    /// Background sweep loop.
    ///
    /// Holds only a `Weak` pool reference and exits when the pool is
    /// dropped.
    async fn sweep_task(weak: Weak<Self>, sweep_interval: Duration) {
        let mut interval = tokio::time::interval(sweep_interval);
        // The first tick of a tokio interval completes immediately;
        // consume it so sweeps start one full interval after startup.
        interval.tick().await;

        loop {
            interval.tick().await;

            let Some(pool) = weak.upgrade() else {
                debug!("connection pool dropped, sweep task exiting");
                return;
            };

            pool.cleanup().await;

            // Drop the strong reference before sleeping so the pool can
            // be deallocated between sweeps.
            drop(pool);
        }
    }
}

impl Drop for ConnectionPool {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.sweep_handle.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("max_connections", &self.max_connections)
            .field("idle_timeout", &self.idle_timeout)
            .field("sweep_interval", &self.sweep_interval)
            .finish()
    }
}
