//! Test fixtures and helpers.
//!
//! Common setup code for sync integration tests.

use std::sync::Arc;

use logsync_store::{LogStore, MemoryStore, PutSummary, Result};
use logsync_sync::{LoopbackTransport, SyncConfig, SyncSession};

use crate::generators::events_for;

/// Session type built by [`SyncFixture::session`].
pub type FixtureSession = SyncSession<Arc<MemoryStore>, LoopbackTransport<Arc<MemoryStore>>>;

/// A device store and a server store connected by a loopback transport.
pub struct SyncFixture {
    pub device: Arc<MemoryStore>,
    pub server: Arc<MemoryStore>,
}

impl SyncFixture {
    /// Two empty stores.
    pub fn new() -> Self {
        Self {
            device: Arc::new(MemoryStore::new()),
            server: Arc::new(MemoryStore::new()),
        }
    }

    /// Transport from the device to the server.
    pub fn transport(&self) -> LoopbackTransport<Arc<MemoryStore>> {
        LoopbackTransport::new(Arc::clone(&self.server))
    }

    /// A session syncing the device against the server.
    pub fn session(&self, config: SyncConfig) -> FixtureSession {
        SyncSession::new(Arc::clone(&self.device), self.transport(), config)
    }

    /// Store events for `ids` on the device.
    pub async fn seed_device(&self, owner_id: &str, log_id: i64, ids: &[i64]) -> Result<PutSummary> {
        self.device.put(&events_for(owner_id, log_id, ids)).await
    }

    /// Store events for `ids` on the server.
    pub async fn seed_server(&self, owner_id: &str, log_id: i64, ids: &[i64]) -> Result<PutSummary> {
        self.server.put(&events_for(owner_id, log_id, ids)).await
    }

    /// Whether both stores hold the same logs with the same ids.
    pub async fn converged(&self) -> Result<bool> {
        Ok(self.device.get_descriptors().await? == self.server.get_descriptors().await?)
    }
}

impl Default for SyncFixture {
    fn default() -> Self {
        Self::new()
    }
}
