//! # Logsync Sync
//!
//! Delta sync of sparse event logs between a device and a server, plus
//! pull-only replication of versioned repositories.
//!
//! ## Overview
//!
//! Each side summarizes every log as a descriptor: the log's key and the
//! sorted range set of ids it holds. Comparing descriptors tells each side
//! exactly which ids the other lacks; only those events cross the wire.
//!
//! ## Key Properties
//!
//! - **Idempotent**: Re-applying an event already stored is a no-op
//! - **Resumable**: Groups applied before a failure stay applied; the next
//!   pass computes the remaining delta
//! - **Ordered**: Within one log, events travel and apply in ascending id order
//! - **Gap-tolerant**: Sparse logs cost per range, not per id
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use logsync_store::MemoryStore;
//! use logsync_sync::{LoopbackTransport, SyncConfig, SyncSession};
//!
//! async fn example() {
//!     let device = Arc::new(MemoryStore::new());
//!     let server = Arc::new(MemoryStore::new());
//!
//!     let transport = LoopbackTransport::new(server);
//!     let config = SyncConfig::default().with_owner_filter("device-7");
//!     let mut session = SyncSession::new(device, transport, config);
//!
//!     let report = session.run().await.unwrap();
//!     println!("pushed {} pulled {}", report.pushed, report.pulled);
//! }
//! ```
//!
//! ## Message Flow
//!
//! ```text
//! Device                              Server
//!   |-------- query(owner) ----------->|
//!   |<------- descriptor lines --------|
//!   |-------- send(delta stream) ----->|   push: what the server lacks
//!   |-------- get(descriptor lines) -->|   pull: what the device lacks
//!   |<------- delta stream ------------|
//! ```

pub mod apply;
pub mod convergence;
pub mod delta;
pub mod endpoint;
pub mod error;
pub mod messages;
pub mod protocol;
pub mod replication;
pub mod transport;

pub use apply::{apply_delta, ApplySummary};
pub use convergence::{compute_log_state_hash, verify_all_logs, verify_convergence, ConvergenceResult};
pub use delta::calculate_delta;
pub use endpoint::LogEndpoint;
pub use error::{Result, SyncError};
pub use messages::{
    decode_descriptors, encode_descriptors, write_delta, DeltaGroup, DeltaReader, DeltaWriter,
};
pub use protocol::{SyncConfig, SyncMode, SyncPhase, SyncReport, SyncSession};
pub use replication::{
    parse_query_response, Discovery, MemoryRepository, RemoteResponse, ReplicationConfig,
    ReplicationReport, ReplicationTask, Repository, RepositoryTransport, StaticDiscovery,
};
pub use transport::{memory::LoopbackTransport, Transport};
