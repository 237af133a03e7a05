//! Pool behavior tests driven through a fake connection factory.
//!
//! The fake records connects, pings and closes so reuse, single-flight
//! initialization, eviction, probe-failure replacement, idle expiry and
//! shutdown can all be asserted without a live database.

use async_trait::async_trait;
use dbconduit::{
    ConnectionFactory, ConnectionPool, ConnectionProfile, Credentials, Dialect, Error,
    NativeConnection, PoolOptions, Row,
};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio_test::assert_ok;

struct FakeConnection {
    id: usize,
    healthy: AtomicBool,
    pings: AtomicUsize,
    closes: AtomicUsize,
}

impl FakeConnection {
    fn new(id: usize) -> Arc<Self> {
        Arc::new(Self {
            id,
            healthy: AtomicBool::new(true),
            pings: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl NativeConnection for FakeConnection {
    fn dialect(&self) -> Dialect {
        Dialect::PostgreSql
    }

    async fn query(&self, _sql: &str) -> dbconduit::Result<Vec<Row>> {
        Ok(Vec::new())
    }

    async fn ping(&self) -> dbconduit::Result<()> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::query(
                Dialect::PostgreSql,
                "SELECT 1",
                "connection lost",
            ))
        }
    }

    async fn close(&self) -> dbconduit::Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FakeFactory {
    connects: AtomicUsize,
    failing: AtomicBool,
    connect_delay: Duration,
    created: Mutex<Vec<Arc<FakeConnection>>>,
}

impl FakeFactory {
    fn new() -> Arc<Self> {
        Self::with_delay(Duration::ZERO)
    }

    fn with_delay(connect_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            connects: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            connect_delay,
            created: Mutex::new(Vec::new()),
        })
    }

    fn connection(&self, index: usize) -> Arc<FakeConnection> {
        Arc::clone(&self.created.lock().unwrap()[index])
    }
}

#[async_trait]
impl ConnectionFactory for FakeFactory {
    async fn connect(
        &self,
        profile: &ConnectionProfile,
    ) -> dbconduit::Result<Arc<dyn NativeConnection>> {
        if self.connect_delay > Duration::ZERO {
            tokio::time::sleep(self.connect_delay).await;
        }
        let id = self.connects.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::connection_init(
                profile.dialect,
                profile.describe(),
                "connection refused",
            ));
        }
        let conn = FakeConnection::new(id);
        self.created.lock().unwrap().push(Arc::clone(&conn));
        Ok(conn)
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn creds(database: &str) -> Credentials {
    Credentials::Discrete {
        host: "db.example.com".into(),
        port: Some(5432),
        username: "u".into(),
        password: "p".into(),
        database: database.into(),
        sid: None,
    }
}

fn options() -> PoolOptions {
    PoolOptions {
        max_connections: Some(10),
        idle_timeout_secs: Some(3_600),
        sweep_interval_secs: Some(3_600),
        connect_timeout_secs: Some(5),
    }
}

#[tokio::test]
async fn sequential_gets_reuse_the_same_handle() {
    let factory = FakeFactory::new();
    let pool = ConnectionPool::with_factory(options(), factory.clone());

    let a = pool
        .get_connection(Dialect::PostgreSql, &creds("app"))
        .await
        .unwrap();
    let b = pool
        .get_connection(Dialect::PostgreSql, &creds("app"))
        .await
        .unwrap();

    assert_eq!(factory.connects.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&a, &b));

    let stats = pool.stats().await;
    assert_eq!(stats.total_connections, 1);
    assert_eq!(stats.active_connections, 1);
}

#[tokio::test]
async fn distinct_credentials_get_distinct_entries() {
    let factory = FakeFactory::new();
    let pool = ConnectionPool::with_factory(options(), factory.clone());

    pool.get_connection(Dialect::PostgreSql, &creds("one"))
        .await
        .unwrap();
    pool.get_connection(Dialect::PostgreSql, &creds("two"))
        .await
        .unwrap();

    assert_eq!(factory.connects.load(Ordering::SeqCst), 2);
    assert_eq!(pool.stats().await.total_connections, 2);
}

#[tokio::test]
async fn concurrent_gets_for_one_key_initialize_once() {
    let factory = FakeFactory::with_delay(Duration::from_millis(50));
    let pool = ConnectionPool::with_factory(options(), factory.clone());

    let mut handles = Vec::new();
    for _ in 0..8 {
        let pool = Arc::clone(&pool);
        handles.push(tokio::spawn(async move {
            pool.get_connection(Dialect::PostgreSql, &creds("app"))
                .await
                .unwrap()
        }));
    }

    let mut conns = Vec::new();
    for handle in handles {
        conns.push(handle.await.unwrap());
    }

    assert_eq!(factory.connects.load(Ordering::SeqCst), 1);
    for conn in &conns[1..] {
        assert!(Arc::ptr_eq(&conns[0], conn));
    }
    assert_eq!(pool.stats().await.total_connections, 1);
}

#[tokio::test]
async fn failed_probe_replaces_the_handle_and_closes_the_stale_one() {
    let factory = FakeFactory::new();
    let pool = ConnectionPool::with_factory(options(), factory.clone());

    pool.get_connection(Dialect::PostgreSql, &creds("app"))
        .await
        .unwrap();
    let first = factory.connection(0);

    first.healthy.store(false, Ordering::SeqCst);

    let replacement = pool
        .get_connection(Dialect::PostgreSql, &creds("app"))
        .await
        .unwrap();

    assert_eq!(factory.connects.load(Ordering::SeqCst), 2);
    assert_eq!(first.closes.load(Ordering::SeqCst), 1);
    let second = factory.connection(1);
    assert_eq!(second.id, 1);
    let first_dyn: Arc<dyn NativeConnection> = Arc::clone(&first) as Arc<dyn NativeConnection>;
    assert!(!Arc::ptr_eq(&replacement, &first_dyn));
    assert_eq!(pool.stats().await.total_connections, 1);
}

#[tokio::test]
async fn capacity_evicts_exactly_one_least_recently_used_entry() {
    let factory = FakeFactory::new();
    let pool = ConnectionPool::with_factory(
        PoolOptions {
            max_connections: Some(2),
            ..options()
        },
        factory.clone(),
    );

    pool.get_connection(Dialect::PostgreSql, &creds("first"))
        .await
        .unwrap();
    pool.get_connection(Dialect::PostgreSql, &creds("second"))
        .await
        .unwrap();
    // Touch "first" so "second" becomes the least recently used.
    pool.get_connection(Dialect::PostgreSql, &creds("first"))
        .await
        .unwrap();

    pool.get_connection(Dialect::PostgreSql, &creds("third"))
        .await
        .unwrap();

    let stats = pool.stats().await;
    assert_eq!(stats.total_connections, 2);
    assert_eq!(factory.connection(1).closes.load(Ordering::SeqCst), 1);
    assert_eq!(factory.connection(0).closes.load(Ordering::SeqCst), 0);
    assert_eq!(factory.connection(2).closes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn close_all_closes_every_handle_exactly_once() {
    init_tracing();
    let factory = FakeFactory::new();
    let pool = ConnectionPool::with_factory(options(), factory.clone());

    for db in ["a", "b", "c"] {
        assert_ok!(pool.get_connection(Dialect::PostgreSql, &creds(db)).await);
    }

    pool.close_all().await;

    assert_eq!(pool.stats().await.total_connections, 0);
    for i in 0..3 {
        assert_eq!(factory.connection(i).closes.load(Ordering::SeqCst), 1);
    }

    // A second shutdown pass finds nothing left to close.
    pool.close_all().await;
    for i in 0..3 {
        assert_eq!(factory.connection(i).closes.load(Ordering::SeqCst), 1);
    }
}

#[tokio::test]
async fn idle_entries_are_swept_and_reinitialized_on_next_get() {
    let factory = FakeFactory::new();
    let pool = ConnectionPool::with_factory(
        PoolOptions {
            idle_timeout_secs: Some(0),
            ..options()
        },
        factory.clone(),
    );

    pool.get_connection(Dialect::PostgreSql, &creds("app"))
        .await
        .unwrap();
    assert_eq!(pool.stats().await.total_connections, 1);

    // With a zero idle timeout any settled entry expires on the next
    // sweep pass.
    tokio::time::sleep(Duration::from_millis(5)).await;
    pool.cleanup().await;

    assert_eq!(pool.stats().await.total_connections, 0);
    assert_eq!(factory.connection(0).closes.load(Ordering::SeqCst), 1);

    pool.get_connection(Dialect::PostgreSql, &creds("app"))
        .await
        .unwrap();
    assert_eq!(factory.connects.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn cleanup_removes_entries_whose_probe_fails() {
    let factory = FakeFactory::new();
    let pool = ConnectionPool::with_factory(options(), factory.clone());

    pool.get_connection(Dialect::PostgreSql, &creds("app"))
        .await
        .unwrap();
    factory.connection(0).healthy.store(false, Ordering::SeqCst);

    pool.cleanup().await;

    assert_eq!(pool.stats().await.total_connections, 0);
    assert_eq!(factory.connection(0).closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_initialization_retains_no_entry_and_later_gets_retry() {
    let factory = FakeFactory::new();
    let pool = ConnectionPool::with_factory(options(), factory.clone());

    factory.failing.store(true, Ordering::SeqCst);
    let err = pool
        .get_connection(Dialect::PostgreSql, &creds("app"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ConnectionInit { .. }));
    assert_eq!(pool.stats().await.total_connections, 0);

    factory.failing.store(false, Ordering::SeqCst);
    pool.get_connection(Dialect::PostgreSql, &creds("app"))
        .await
        .unwrap();
    assert_eq!(pool.stats().await.total_connections, 1);
    assert_eq!(factory.connects.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn reuse_probes_before_handing_out_the_connection() {
    let factory = FakeFactory::new();
    let pool = ConnectionPool::with_factory(options(), factory.clone());

    pool.get_connection(Dialect::PostgreSql, &creds("app"))
        .await
        .unwrap();
    let pings_after_init = factory.connection(0).pings.load(Ordering::SeqCst);

    pool.get_connection(Dialect::PostgreSql, &creds("app"))
        .await
        .unwrap();
    assert_eq!(
        factory.connection(0).pings.load(Ordering::SeqCst),
        pings_after_init + 1
    );
}
