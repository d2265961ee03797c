//! # Logsync
//!
//! Reconciliation of sparse, append-only event logs between devices and a
//! central server.
//!
//! ## Overview
//!
//! Logsync provides:
//!
//! - **Range sets**: Compact sorted sets of integer ids with gaps
//! - **Events**: One comma-delimited line per log entry
//! - **Log stores**: Append-only storage keyed by `(owner, log, id)`
//! - **Sync**: Descriptor exchange and delta streaming in both directions
//! - **Replication**: Pull-only copying of versioned repositories
//!
//! ## Key Concepts
//!
//! - **Descriptor**: A log's key plus the range set of ids it holds
//! - **Delta**: The ids one side holds that the other lacks
//! - **Idempotence**: Applying the same event twice changes nothing
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//! use logsync::{LogNode, NodeConfig};
//! use logsync::store::{MemoryStore, SqliteStore};
//! use logsync::sync::LoopbackTransport;
//!
//! async fn example() {
//!     let device = LogNode::new(SqliteStore::open("device.db").unwrap(), NodeConfig::default());
//!     let server = LogNode::new(MemoryStore::new(), NodeConfig::default());
//!
//!     device.append("device-7", 1, 3, BTreeMap::new()).await.unwrap();
//!
//!     let transport = LoopbackTransport::from_endpoint(Arc::new(server.endpoint()));
//!     let report = device.sync("server", transport).await.unwrap();
//!     println!("pushed {} events", report.pushed);
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `logsync::core` - Ranges, range sets, codec, events, descriptors
//! - `logsync::store` - Storage abstraction, SQLite and memory stores
//! - `logsync::sync` - Delta engine, wire format, sessions, replication

pub mod error;
pub mod node;

// Re-export component crates
pub use logsync_core as core;
pub use logsync_store as store;
pub use logsync_sync as sync;

// Re-export main types for convenience
pub use error::{NodeError, Result};
pub use node::{LogNode, NodeConfig};

// Re-export commonly used types
pub use logsync_core::{Descriptor, LogEvent, LogKey, Range, SortedRangeSet, FULL_SET};
pub use logsync_store::{InsertResult, LogStore, PutSummary};
pub use logsync_sync::{SyncConfig, SyncMode, SyncPhase, SyncReport};
