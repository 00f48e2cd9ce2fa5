use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use fastagi::FastAgi;
use tokio::sync::{RwLock, RwLockWriteGuard};
use tokio::time::timeout;
use tokio_postgres::Transaction;
use tracing::{debug, error};

// bounded so a stuck execution can never hang the reload path
const RELOAD_LOCK_WAIT: Duration = Duration::from_secs(5);

#[async_trait]
pub trait AgiHandler: Send + Sync {
    /// Primes handler-local state from the database, before serving
    /// begins and again on every reload.
    async fn setup(&self, _tx: &Transaction<'_>) -> Result<()> {
        Ok(())
    }

    async fn execute(
        &self,
        agi: &mut FastAgi,
        tx: &Transaction<'_>,
        args: &[String],
    ) -> Result<()>;
}

#[derive(Debug, PartialEq, Eq)]
pub enum ReloadOutcome {
    Reloaded,
    /// Exclusivity could not be obtained in time or the setup failed; the
    /// previous handler state stays in effect.
    Skipped,
}

pub struct Handler {
    name: String,
    inner: Arc<dyn AgiHandler>,
    lock: RwLock<()>,
}

impl Handler {
    fn new(name: &str, inner: Arc<dyn AgiHandler>) -> Self {
        Self {
            name: name.to_string(),
            inner,
            lock: RwLock::new(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Startup-time priming, runs before any request is accepted so no
    /// locking is needed.
    pub async fn setup(&self, tx: &Transaction<'_>) -> Result<()> {
        self.inner.setup(tx).await
    }

    /// Best effort: a reload that cannot get exclusive access gives up
    /// instead of blocking the reload path behind in-flight executions.
    pub async fn reload(&self, tx: &Transaction<'_>) -> ReloadOutcome {
        let Some(_guard) = self.write_lock_bounded().await else {
            error!(
                "could not get exclusive access to handler {:?}, reload skipped",
                self.name
            );
            return ReloadOutcome::Skipped;
        };
        match self.inner.setup(tx).await {
            Ok(()) => {
                debug!("handler {:?} reloaded", self.name);
                ReloadOutcome::Reloaded
            }
            Err(e) => {
                error!("handler {:?} reload failed: {:?}", self.name, e);
                ReloadOutcome::Skipped
            }
        }
    }

    /// Shared with other executions of the same handler, exclusive
    /// against reload.
    pub async fn execute(
        &self,
        agi: &mut FastAgi,
        tx: &Transaction<'_>,
        args: &[String],
    ) -> Result<()> {
        let _guard = self.lock.read().await;
        self.inner.execute(agi, tx, args).await
    }

    async fn write_lock_bounded(&self) -> Option<RwLockWriteGuard<'_, ()>> {
        timeout(RELOAD_LOCK_WAIT, self.lock.write()).await.ok()
    }
}

/// Name to handler mapping, populated once at startup and read-only
/// afterwards.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One-shot startup registration, a duplicate name is a bug in the
    /// registering module.
    pub fn register(&mut self, name: &str, handler: Arc<dyn AgiHandler>) -> Result<()> {
        if self.handlers.contains_key(name) {
            return Err(anyhow!("handler {:?} already registered", name));
        }
        self.handlers
            .insert(name.to_string(), Arc::new(Handler::new(name, handler)));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<Handler>> {
        self.handlers.get(name).cloned()
    }

    pub fn handlers(&self) -> impl Iterator<Item = &Arc<Handler>> {
        self.handlers.values()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(|name| name.as_str()).collect();
        names.sort_unstable();
        names
    }
}
