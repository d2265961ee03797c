//! The node: one store plus the passes that keep it in sync.
//!
//! A node owns a log store and runs sync and replication passes against
//! named targets. At most one pass per target runs at a time; passes for
//! different targets run concurrently.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use logsync_core::{Descriptor, LogEvent};
use logsync_store::LogStore;
use logsync_sync::{
    Discovery, LogEndpoint, ReplicationConfig, ReplicationReport, ReplicationTask,
    RepositoryTransport, SyncConfig, SyncReport, SyncSession, Transport,
};

use crate::error::Result;

/// Configuration for a node.
#[derive(Debug, Clone, Default)]
pub struct NodeConfig {
    /// Sync configuration used by [`LogNode::sync`].
    pub sync: SyncConfig,
    /// Replication configuration used by [`LogNode::replication_task`].
    pub replication: ReplicationConfig,
}

/// A log store with serialized per-target sync.
pub struct LogNode<S: LogStore> {
    /// The storage backend.
    store: Arc<S>,
    /// Configuration.
    config: NodeConfig,
    /// One lock per target with a pass running or waiting; a pass holds it
    /// for its whole run. Idle entries are evicted.
    targets: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl<S: LogStore + 'static> LogNode<S> {
    /// Create a new node.
    pub fn new(store: S, config: NodeConfig) -> Self {
        Self::from_arc(Arc::new(store), config)
    }

    /// Create a node over a store shared with other owners.
    pub fn from_arc(store: Arc<S>, config: NodeConfig) -> Self {
        Self {
            store,
            config,
            targets: Mutex::new(HashMap::new()),
        }
    }

    /// Get the store reference.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// A server-side endpoint answering sync requests from this node's store.
    pub fn endpoint(&self) -> LogEndpoint<Arc<S>> {
        LogEndpoint::new(Arc::clone(&self.store))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Log Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Append an event stamped with the current wall-clock time.
    pub async fn append(
        &self,
        owner_id: &str,
        log_id: i64,
        event_type: i32,
        properties: BTreeMap<String, String>,
    ) -> Result<LogEvent> {
        self.append_at(owner_id, log_id, now_millis(), event_type, properties)
            .await
    }

    /// Append an event with an explicit timestamp.
    pub async fn append_at(
        &self,
        owner_id: &str,
        log_id: i64,
        time: i64,
        event_type: i32,
        properties: BTreeMap<String, String>,
    ) -> Result<LogEvent> {
        let event = self
            .store
            .append(owner_id, log_id, time, event_type, properties)
            .await?;
        tracing::debug!(owner_id, log_id, id = event.id(), "appended event");
        Ok(event)
    }

    /// All events of one log, in id order.
    pub async fn log(&self, owner_id: &str, log_id: i64) -> Result<Vec<LogEvent>> {
        Ok(self.store.get_log(owner_id, log_id).await?)
    }

    /// Events named by a descriptor.
    pub async fn events(&self, descriptor: &Descriptor) -> Result<Vec<LogEvent>> {
        Ok(self.store.get(descriptor).await?)
    }

    /// Descriptor of one log, or `None` if it does not exist.
    pub async fn descriptor(&self, owner_id: &str, log_id: i64) -> Result<Option<Descriptor>> {
        Ok(self.store.get_descriptor(owner_id, log_id).await?)
    }

    /// Descriptors of every stored log.
    pub async fn descriptors(&self) -> Result<Vec<Descriptor>> {
        Ok(self.store.get_descriptors().await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sync Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Run one sync pass against `target` with the node's sync configuration.
    ///
    /// Waits for any pass already running against `target`.
    pub async fn sync<T: Transport>(&self, target: &str, transport: T) -> Result<SyncReport> {
        self.sync_with(target, transport, self.config.sync.clone())
            .await
    }

    /// Run one sync pass against `target` with an explicit configuration.
    pub async fn sync_with<T: Transport>(
        &self,
        target: &str,
        transport: T,
        config: SyncConfig,
    ) -> Result<SyncReport> {
        let lock = self.target_lock(target);
        let _guard = lock.lock().await;

        tracing::debug!(remote = target, mode = ?config.mode, "starting sync pass");
        let mut session = SyncSession::new(Arc::clone(&self.store), transport, config);
        Ok(session.run().await?)
    }

    /// A replication task using the node's replication configuration.
    pub fn replication_task<D, T>(&self, discovery: D, transport: T) -> ReplicationTask<D, T>
    where
        D: Discovery,
        T: RepositoryTransport,
    {
        ReplicationTask::new(discovery, transport, self.config.replication.clone())
    }

    /// Run one replication pass against `target`.
    ///
    /// Waits for any pass already running against `target`.
    pub async fn replicate<D, T>(
        &self,
        target: &str,
        task: &ReplicationTask<D, T>,
    ) -> ReplicationReport
    where
        D: Discovery,
        T: RepositoryTransport,
    {
        let lock = self.target_lock(target);
        let _guard = lock.lock().await;

        tracing::debug!(remote = target, "starting replication pass");
        task.run().await
    }

    /// Whether a pass against `target` is running right now.
    pub fn is_busy(&self, target: &str) -> bool {
        let targets = self.targets.lock().unwrap_or_else(PoisonError::into_inner);
        targets
            .get(target)
            .is_some_and(|lock| lock.try_lock().is_err())
    }

    fn target_lock(&self, target: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut targets = self.targets.lock().unwrap_or_else(PoisonError::into_inner);
        // An entry only the map references has no pass running or waiting.
        targets.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(targets.entry(target.to_string()).or_default())
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
