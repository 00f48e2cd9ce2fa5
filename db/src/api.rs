use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, warn};

// one attempt per second, five minutes in total
const CONNECT_RETRY_ATTEMPTS: u32 = 300;
const CONNECT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

#[async_trait]
pub trait Connect: Send + Sync + 'static {
    type Conn: Send + 'static;

    async fn connect(&self, db_uri: &str) -> Result<Self::Conn>;
}

pub struct PgConnector;

pub struct PgConn {
    pub client: Client,
}

#[async_trait]
impl Connect for PgConnector {
    type Conn = PgConn;

    async fn connect(&self, db_uri: &str) -> Result<PgConn> {
        let (client, connection) = tokio_postgres::connect(db_uri, NoTls).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!("database connection ended with error: {}", e);
            }
        });
        Ok(PgConn { client })
    }
}

struct PoolState<T> {
    conns: Vec<T>,
    size: usize,
    db_uri: String,
}

/// A fixed-capacity pool of database connections. The target size bounds
/// the idle list, not the number of live connections: `acquire` creates a
/// fresh connection instead of waiting when the pool runs dry, and
/// `release` closes anything beyond capacity.
pub struct ConnectionPool<C: Connect = PgConnector> {
    connector: C,
    state: Mutex<PoolState<C::Conn>>,
}

impl ConnectionPool<PgConnector> {
    pub fn new() -> Self {
        Self::with_connector(PgConnector)
    }
}

impl Default for ConnectionPool<PgConnector> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Connect> ConnectionPool<C> {
    pub fn with_connector(connector: C) -> Self {
        Self {
            connector,
            state: Mutex::new(PoolState {
                conns: Vec::new(),
                size: 0,
                db_uri: String::new(),
            }),
        }
    }

    /// Closes every pooled connection, waits for the database to answer
    /// and refills the pool. The lock is held for the whole bootstrap so
    /// no request is served against a database that is not ready yet.
    /// Runs at process startup and again on every reload command.
    pub async fn reload(&self, size: usize, db_uri: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.conns.clear();

        self.wait_is_ready(db_uri).await?;

        let mut conns = Vec::with_capacity(size);
        for _ in 0..size {
            conns.push(self.connector.connect(db_uri).await?);
        }
        state.conns = conns;
        state.size = size;
        state.db_uri = db_uri.to_string();
        debug!("reloaded db conn pool");
        Ok(())
    }

    async fn wait_is_ready(&self, db_uri: &str) -> Result<()> {
        for attempt in 1..=CONNECT_RETRY_ATTEMPTS {
            match self.connector.connect(db_uri).await {
                Ok(_trial) => return Ok(()),
                Err(e) => {
                    warn!("fail to connect to the database (attempt {}): {}", attempt, e)
                }
            }
            if attempt < CONNECT_RETRY_ATTEMPTS {
                tokio::time::sleep(CONNECT_RETRY_INTERVAL).await;
            }
        }
        Err(anyhow!(
            "database still unreachable after {} attempts",
            CONNECT_RETRY_ATTEMPTS
        ))
    }

    /// Never waits for an idle slot: when the pool is empty a fresh
    /// connection is created, transiently exceeding the target size.
    pub async fn acquire(&self) -> Result<C::Conn> {
        let db_uri = {
            let mut state = self.state.lock().await;
            match state.conns.pop() {
                Some(conn) => {
                    debug!("acquiring connection: got connection from pool");
                    return Ok(conn);
                }
                None => state.db_uri.clone(),
            }
        };
        // connect outside the lock, the critical section stays short
        let conn = self.connector.connect(&db_uri).await?;
        debug!("acquiring connection: pool empty, created new connection");
        Ok(conn)
    }

    pub async fn release(&self, conn: C::Conn) {
        let mut state = self.state.lock().await;
        if state.conns.len() < state.size {
            state.conns.push(conn);
            debug!("releasing connection: pool not full, refilled with connection");
        } else {
            drop(conn);
            debug!("releasing connection: pool full, connection closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeConnector {
        created: AtomicUsize,
        fail_first: usize,
    }

    impl FakeConnector {
        fn new(fail_first: usize) -> Self {
            Self {
                created: AtomicUsize::new(0),
                fail_first,
            }
        }
    }

    #[async_trait]
    impl Connect for FakeConnector {
        type Conn = usize;

        async fn connect(&self, _db_uri: &str) -> Result<usize> {
            let n = self.created.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                return Err(anyhow!("database is down"));
            }
            Ok(n)
        }
    }

    fn created(pool: &ConnectionPool<FakeConnector>) -> usize {
        pool.connector.created.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn acquire_pops_idle_connections_and_overflows_by_creation() {
        let pool = ConnectionPool::with_connector(FakeConnector::new(0));
        pool.reload(3, "postgresql://test").await.unwrap();
        // one trial connection plus three pooled ones
        assert_eq!(4, created(&pool));

        let first = pool.acquire().await.unwrap();
        let second = pool.acquire().await.unwrap();
        let third = pool.acquire().await.unwrap();
        assert_eq!(4, created(&pool));

        // beyond the pool size a new connection is created, not waited for
        let fourth = pool.acquire().await.unwrap();
        assert_eq!(5, created(&pool));

        pool.release(first).await;
        pool.release(second).await;
        pool.release(third).await;
        // the idle list is full, this one gets closed
        pool.release(fourth).await;

        let reused = pool.acquire().await.unwrap();
        assert!([first, second, third].contains(&reused));
        assert_eq!(5, created(&pool));
    }

    #[tokio::test(start_paused = true)]
    async fn reload_retries_until_the_database_answers() {
        let pool = ConnectionPool::with_connector(FakeConnector::new(3));
        pool.reload(2, "postgresql://test").await.unwrap();
        // three failures, one trial, two pooled connections
        assert_eq!(6, created(&pool));

        let conn = pool.acquire().await.unwrap();
        pool.release(conn).await;
    }

    #[tokio::test(start_paused = true)]
    async fn reload_gives_up_after_the_retry_budget() {
        let pool = ConnectionPool::with_connector(FakeConnector::new(usize::MAX));
        let result = pool.reload(2, "postgresql://test").await;
        assert!(result.is_err());
        assert_eq!(CONNECT_RETRY_ATTEMPTS as usize, created(&pool));
    }

    #[tokio::test]
    async fn release_refills_only_up_to_the_target_size() {
        let pool = ConnectionPool::with_connector(FakeConnector::new(0));
        pool.reload(1, "postgresql://test").await.unwrap();

        let first = pool.acquire().await.unwrap();
        let second = pool.acquire().await.unwrap();
        pool.release(first).await;
        pool.release(second).await;

        // only one connection was kept
        let _kept = pool.acquire().await.unwrap();
        let before = created(&pool);
        let _extra = pool.acquire().await.unwrap();
        assert_eq!(before + 1, created(&pool));
    }
}
