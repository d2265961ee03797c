//! Sync session state machine.
//!
//! One pass compares local and remote descriptors, pushes what the remote
//! lacks and pulls what the local store lacks. Passes are idempotent; a
//! failed pass is fixed by running the next one.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use logsync_core::{Descriptor, LogKey};
use logsync_store::LogStore;

use crate::apply::{apply_delta, ApplySummary};
use crate::delta::calculate_delta;
use crate::error::Result;
use crate::messages::{decode_descriptors, encode_descriptors, write_delta};
use crate::transport::{with_timeout, Transport};

/// Direction of a sync pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Send local events the remote lacks.
    Push,
    /// Fetch remote events the local store lacks.
    Pull,
    /// Push, then pull.
    #[default]
    PushPull,
    /// Do nothing.
    None,
}

impl SyncMode {
    pub fn pushes(self) -> bool {
        matches!(self, SyncMode::Push | SyncMode::PushPull)
    }

    pub fn pulls(self) -> bool {
        matches!(self, SyncMode::Pull | SyncMode::PushPull)
    }
}

/// Where a session is in its pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    FetchLocalDescriptors,
    FetchRemoteDescriptors,
    ComputeDelta,
    StreamEntries,
    ApplyToStore,
    Done,
    Failed,
}

impl SyncPhase {
    /// Whether the pass has ended.
    pub fn is_terminal(self) -> bool {
        matches!(self, SyncPhase::Done | SyncPhase::Failed)
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncPhase::Idle => "idle",
            SyncPhase::FetchLocalDescriptors => "fetch_local_descriptors",
            SyncPhase::FetchRemoteDescriptors => "fetch_remote_descriptors",
            SyncPhase::ComputeDelta => "compute_delta",
            SyncPhase::StreamEntries => "stream_entries",
            SyncPhase::ApplyToStore => "apply_to_store",
            SyncPhase::Done => "done",
            SyncPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Result of a sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Number of events sent to the remote.
    pub pushed: usize,
    /// Number of events newly stored locally.
    pub pulled: usize,
    /// Pulled events that were already stored.
    pub duplicates: usize,
    /// Pulled events rejected because a different event holds their id.
    pub conflicts: usize,
    /// Logs that sent or received at least one event.
    pub logs_synced: BTreeSet<LogKey>,
    /// Logs whose pulled group failed to apply, with the error text.
    pub failed_logs: Vec<(LogKey, String)>,
}

impl SyncReport {
    fn absorb(&mut self, applied: ApplySummary) {
        self.pulled += applied.put.inserted;
        self.duplicates += applied.put.duplicates;
        self.conflicts += applied.put.conflicts;
        self.logs_synced.extend(applied.logs);
        self.failed_logs.extend(applied.failed);
    }
}

/// Configuration for sync behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Direction of each pass.
    pub mode: SyncMode,
    /// Timeout for each transport request.
    pub request_timeout: Duration,
    /// Only sync this owner's logs (device mode). `None` syncs every log.
    pub owner_filter: Option<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            mode: SyncMode::PushPull,
            request_timeout: Duration::from_secs(30),
            owner_filter: None,
        }
    }
}

impl SyncConfig {
    pub fn with_mode(mut self, mode: SyncMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_owner_filter(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_filter = Some(owner_id.into());
        self
    }
}

/// Sync session between a local store and one remote.
pub struct SyncSession<S: LogStore, T: Transport> {
    /// The local store.
    store: S,
    /// The transport to the remote.
    transport: T,
    /// Configuration.
    config: SyncConfig,
    /// Current phase.
    phase: SyncPhase,
}

impl<S: LogStore, T: Transport> SyncSession<S, T> {
    /// Create a new sync session.
    pub fn new(store: S, transport: T, config: SyncConfig) -> Self {
        Self {
            store,
            transport,
            config,
            phase: SyncPhase::Idle,
        }
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run one sync pass.
    ///
    /// Ends in [`SyncPhase::Done`] or [`SyncPhase::Failed`]. Groups applied
    /// before a failure stay applied. Running again after a terminal phase
    /// starts a fresh pass.
    pub async fn run(&mut self) -> Result<SyncReport> {
        self.phase = SyncPhase::Idle;
        let mut report = SyncReport::default();

        match self.run_pass(&mut report).await {
            Ok(()) => {
                self.enter(SyncPhase::Done);
                tracing::info!(
                    mode = ?self.config.mode,
                    pushed = report.pushed,
                    pulled = report.pulled,
                    duplicates = report.duplicates,
                    conflicts = report.conflicts,
                    failed_logs = report.failed_logs.len(),
                    "sync pass complete"
                );
                Ok(report)
            }
            Err(e) => {
                tracing::warn!(phase = %self.phase, error = %e, "sync pass failed");
                self.enter(SyncPhase::Failed);
                Err(e)
            }
        }
    }

    async fn run_pass(&mut self, report: &mut SyncReport) -> Result<()> {
        let mode = self.config.mode;
        if mode == SyncMode::None {
            return Ok(());
        }

        // Phase 1: what we have
        self.enter(SyncPhase::FetchLocalDescriptors);
        let local = self.local_descriptors().await?;

        // Phase 2: what the remote has
        self.enter(SyncPhase::FetchRemoteDescriptors);
        let remote = self.remote_descriptors().await?;

        // Phase 3: compare
        self.enter(SyncPhase::ComputeDelta);
        let outgoing = if mode.pushes() {
            calculate_delta(&local, &remote)
        } else {
            Vec::new()
        };
        let incoming = if mode.pulls() {
            calculate_delta(&remote, &local)
        } else {
            Vec::new()
        };
        tracing::debug!(
            outgoing = outgoing.len(),
            incoming = incoming.len(),
            "computed deltas"
        );

        if outgoing.is_empty() && incoming.is_empty() {
            return Ok(());
        }

        // Phase 4: move entries both ways
        self.enter(SyncPhase::StreamEntries);
        if !outgoing.is_empty() {
            self.push(&outgoing, report).await?;
        }
        let pulled = if incoming.is_empty() {
            None
        } else {
            let request = encode_descriptors(&incoming);
            let timeout = self.config.request_timeout;
            Some(with_timeout(timeout, "get", self.transport.get(request)).await?)
        };

        // Phase 5: store what arrived
        if let Some(body) = pulled {
            self.enter(SyncPhase::ApplyToStore);
            let mut applied = ApplySummary::default();
            let result = apply_delta(&self.store, &body, &mut applied).await;
            report.absorb(applied);
            result?;
        }

        Ok(())
    }

    async fn push(&self, outgoing: &[Descriptor], report: &mut SyncReport) -> Result<()> {
        let writer = write_delta(&self.store, outgoing).await;
        report.failed_logs.extend_from_slice(writer.failed());
        if writer.is_empty() {
            return Ok(());
        }

        let sent = writer.event_count();
        let logs = writer.logs().to_vec();
        let body = writer.finish();
        with_timeout(self.config.request_timeout, "send", self.transport.send(body)).await?;

        report.pushed += sent;
        report.logs_synced.extend(logs);
        Ok(())
    }

    async fn local_descriptors(&self) -> Result<Vec<Descriptor>> {
        let descriptors = match &self.config.owner_filter {
            Some(owner) => self.store.get_descriptors_for(owner).await?,
            None => self.store.get_descriptors().await?,
        };
        Ok(descriptors)
    }

    async fn remote_descriptors(&self) -> Result<Vec<Descriptor>> {
        let owner = self.config.owner_filter.as_deref();
        let body = with_timeout(
            self.config.request_timeout,
            "query",
            self.transport.query(owner),
        )
        .await?;

        let mut descriptors = decode_descriptors(&body)?;
        if let Some(owner) = owner {
            descriptors.retain(|d| d.owner_id() == owner);
        }
        Ok(descriptors)
    }

    fn enter(&mut self, phase: SyncPhase) {
        tracing::debug!(from = %self.phase, to = %phase, "sync phase");
        self.phase = phase;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use crate::error::SyncError;

    use async_trait::async_trait;
    use bytes::Bytes;

    use logsync_core::LogEvent;
    use logsync_store::{InsertResult, MemoryStore, StoreError};

    use crate::transport::memory::LoopbackTransport;

    fn event(owner: &str, log: i64, id: i64) -> LogEvent {
        LogEvent::new(owner, log, id, 1_000 + id, 1, BTreeMap::new())
    }

    async fn store_with(events: &[(&str, i64, i64)]) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        for &(owner, log, id) in events {
            store.insert(&event(owner, log, id)).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_pushpull_converges() {
        let device = store_with(&[("dev", 1, 1), ("dev", 1, 2), ("dev", 1, 3)]).await;
        let server = store_with(&[("dev", 1, 1), ("dev", 2, 1), ("dev", 2, 2)]).await;

        let transport = LoopbackTransport::new(Arc::clone(&server));
        let mut session = SyncSession::new(Arc::clone(&device), transport, SyncConfig::default());
        let report = session.run().await.unwrap();

        assert_eq!(session.phase(), SyncPhase::Done);
        assert_eq!(report.pushed, 2);
        assert_eq!(report.pulled, 2);
        assert_eq!(report.logs_synced.len(), 2);
        assert_eq!(
            device.get_descriptors().await.unwrap(),
            server.get_descriptors().await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_second_pass_moves_nothing() {
        let device = store_with(&[("dev", 1, 1), ("dev", 1, 4)]).await;
        let server = store_with(&[("dev", 1, 2)]).await;
        let transport = LoopbackTransport::new(Arc::clone(&server));
        let mut session = SyncSession::new(device, transport, SyncConfig::default());

        session.run().await.unwrap();
        let again = session.run().await.unwrap();
        assert_eq!(again, SyncReport::default());
        assert_eq!(session.phase(), SyncPhase::Done);
    }

    #[tokio::test]
    async fn test_push_only_leaves_local_untouched() {
        let device = store_with(&[("dev", 1, 1)]).await;
        let server = store_with(&[("dev", 1, 2)]).await;
        let transport = LoopbackTransport::new(Arc::clone(&server));
        let config = SyncConfig::default().with_mode(SyncMode::Push);
        let mut session = SyncSession::new(Arc::clone(&device), transport, config);

        let report = session.run().await.unwrap();
        assert_eq!(report.pushed, 1);
        assert_eq!(report.pulled, 0);
        assert_eq!(device.get_log("dev", 1).await.unwrap().len(), 1);
        assert_eq!(server.get_log("dev", 1).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_pull_treats_absent_log_as_empty() {
        let device = Arc::new(MemoryStore::new());
        let server = store_with(&[("srv", 7, 1), ("srv", 7, 2), ("srv", 7, 10)]).await;
        let transport = LoopbackTransport::new(server);
        let config = SyncConfig::default().with_mode(SyncMode::Pull);
        let mut session = SyncSession::new(Arc::clone(&device), transport, config);

        let report = session.run().await.unwrap();
        assert_eq!(report.pulled, 3);
        let descriptor = device.get_descriptor("srv", 7).await.unwrap().unwrap();
        assert_eq!(descriptor.to_representation(), "srv,7,1-2,10");
    }

    #[tokio::test]
    async fn test_mode_none_does_nothing() {
        let device = store_with(&[("dev", 1, 1)]).await;
        let server = Arc::new(MemoryStore::new());
        let transport = LoopbackTransport::new(Arc::clone(&server));
        let config = SyncConfig::default().with_mode(SyncMode::None);
        let mut session = SyncSession::new(device, transport, config);

        assert_eq!(session.run().await.unwrap(), SyncReport::default());
        assert_eq!(session.phase(), SyncPhase::Done);
        assert!(server.get_descriptors().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_owner_filter_limits_both_directions() {
        let device = store_with(&[("dev", 1, 1), ("other", 1, 1)]).await;
        let server = store_with(&[("dev", 2, 1), ("third", 1, 1)]).await;
        let transport = LoopbackTransport::new(Arc::clone(&server));
        let config = SyncConfig::default().with_owner_filter("dev");
        let mut session = SyncSession::new(Arc::clone(&device), transport, config);

        let report = session.run().await.unwrap();
        assert_eq!(report.pushed, 1);
        assert_eq!(report.pulled, 1);
        assert!(server.get_descriptor("other", 1).await.unwrap().is_none());
        assert!(device.get_descriptor("third", 1).await.unwrap().is_none());
    }

    /// Remote that answers queries but never completes a get.
    struct StalledTransport {
        inner: LoopbackTransport<Arc<MemoryStore>>,
    }

    #[async_trait]
    impl Transport for StalledTransport {
        async fn query(&self, owner_id: Option<&str>) -> Result<Bytes> {
            self.inner.query(owner_id).await
        }

        async fn get(&self, _request: Bytes) -> Result<Bytes> {
            std::future::pending().await
        }

        async fn send(&self, stream: Bytes) -> Result<()> {
            self.inner.send(stream).await
        }
    }

    #[tokio::test]
    async fn test_stalled_remote_times_out() {
        let device = Arc::new(MemoryStore::new());
        let server = store_with(&[("srv", 1, 1)]).await;
        let transport = StalledTransport {
            inner: LoopbackTransport::new(server),
        };
        let config = SyncConfig::default().with_request_timeout(Duration::from_millis(20));
        let mut session = SyncSession::new(device, transport, config);

        let err = session.run().await.unwrap_err();
        assert!(matches!(err, SyncError::Timeout(_)));
        assert_eq!(session.phase(), SyncPhase::Failed);
    }

    /// Remote whose delta streams lose their last line.
    struct TruncatingTransport {
        inner: LoopbackTransport<Arc<MemoryStore>>,
    }

    #[async_trait]
    impl Transport for TruncatingTransport {
        async fn query(&self, owner_id: Option<&str>) -> Result<Bytes> {
            self.inner.query(owner_id).await
        }

        async fn get(&self, request: Bytes) -> Result<Bytes> {
            let body = self.inner.get(request).await?;
            let text = String::from_utf8_lossy(&body);
            let lines: Vec<&str> = text.lines().collect();
            let kept = lines[..lines.len() - 1].join("\n");
            Ok(Bytes::from(kept))
        }

        async fn send(&self, stream: Bytes) -> Result<()> {
            self.inner.send(stream).await
        }
    }

    #[tokio::test]
    async fn test_truncated_pull_fails_but_keeps_applied_events() {
        let device = Arc::new(MemoryStore::new());
        let server = store_with(&[("srv", 1, 1), ("srv", 2, 1), ("srv", 2, 2)]).await;
        let transport = TruncatingTransport {
            inner: LoopbackTransport::new(server),
        };
        let config = SyncConfig::default().with_mode(SyncMode::Pull);
        let mut session = SyncSession::new(Arc::clone(&device), transport, config);

        let err = session.run().await.unwrap_err();
        assert!(matches!(err, SyncError::Truncated { received: 1, .. }));
        assert_eq!(session.phase(), SyncPhase::Failed);

        assert_eq!(device.get_log("srv", 1).await.unwrap().len(), 1);
        assert_eq!(device.get_log("srv", 2).await.unwrap().len(), 1);

        // The next clean pass picks up the rest.
        let server = session.transport.inner.endpoint().store().clone();
        let mut retry = SyncSession::new(
            Arc::clone(&device),
            LoopbackTransport::new(server),
            SyncConfig::default().with_mode(SyncMode::Pull),
        );
        let report = retry.run().await.unwrap();
        assert_eq!(report.pulled, 1);
    }

    /// Store whose reads of one log fail.
    struct UnreadableLog {
        inner: MemoryStore,
        log_id: i64,
    }

    #[async_trait]
    impl LogStore for UnreadableLog {
        async fn insert(&self, event: &LogEvent) -> logsync_store::Result<InsertResult> {
            self.inner.insert(event).await
        }

        async fn append(
            &self,
            owner_id: &str,
            log_id: i64,
            time: i64,
            event_type: i32,
            properties: BTreeMap<String, String>,
        ) -> logsync_store::Result<LogEvent> {
            self.inner
                .append(owner_id, log_id, time, event_type, properties)
                .await
        }

        async fn get(&self, descriptor: &Descriptor) -> logsync_store::Result<Vec<LogEvent>> {
            if descriptor.log_id() == self.log_id {
                return Err(StoreError::InvalidData("disk read failed".into()));
            }
            self.inner.get(descriptor).await
        }

        async fn get_descriptor(
            &self,
            owner_id: &str,
            log_id: i64,
        ) -> logsync_store::Result<Option<Descriptor>> {
            self.inner.get_descriptor(owner_id, log_id).await
        }

        async fn get_descriptors_for(&self, owner_id: &str) -> logsync_store::Result<Vec<Descriptor>> {
            self.inner.get_descriptors_for(owner_id).await
        }

        async fn get_descriptors(&self) -> logsync_store::Result<Vec<Descriptor>> {
            self.inner.get_descriptors().await
        }
    }

    #[tokio::test]
    async fn test_unreadable_log_does_not_block_others() {
        let device = Arc::new(UnreadableLog {
            inner: MemoryStore::new(),
            log_id: 1,
        });
        device.insert(&event("dev", 1, 1)).await.unwrap();
        device.insert(&event("dev", 2, 1)).await.unwrap();
        device.insert(&event("dev", 2, 2)).await.unwrap();
        let server = store_with(&[("dev", 3, 1)]).await;

        let transport = LoopbackTransport::new(Arc::clone(&server));
        let mut session = SyncSession::new(Arc::clone(&device), transport, SyncConfig::default());
        let report = session.run().await.unwrap();

        assert_eq!(session.phase(), SyncPhase::Done);
        assert_eq!(report.pushed, 2);
        assert_eq!(report.pulled, 1);
        assert_eq!(report.failed_logs.len(), 1);
        assert_eq!(report.failed_logs[0].0, LogKey::new("dev", 1));
        assert!(report.failed_logs[0].1.contains("disk read failed"));

        // Only logs that actually moved count as synced.
        let synced: Vec<LogKey> = report.logs_synced.iter().cloned().collect();
        assert_eq!(synced, vec![LogKey::new("dev", 2), LogKey::new("dev", 3)]);

        assert!(server.get_descriptor("dev", 1).await.unwrap().is_none());
        assert_eq!(server.get_log("dev", 2).await.unwrap().len(), 2);
        assert!(device.get_descriptor("dev", 3).await.unwrap().is_some());
    }

    #[test]
    fn test_mode_serde_names() {
        assert_eq!(serde_json::to_string(&SyncMode::PushPull).unwrap(), "\"pushpull\"");
        let mode: SyncMode = serde_json::from_str("\"pull\"").unwrap();
        assert_eq!(mode, SyncMode::Pull);
        assert!(SyncMode::PushPull.pushes() && SyncMode::PushPull.pulls());
        assert!(!SyncMode::None.pushes() && !SyncMode::None.pulls());
    }
}
