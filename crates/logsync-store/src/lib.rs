//! # Logsync Store
//!
//! Storage abstraction for logsync. Provides a trait-based interface for
//! append-only per-(owner, log) event storage with SQLite and in-memory
//! implementations.
//!
//! ## Key Types
//!
//! - [`LogStore`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`InsertResult`] - Result of inserting one event
//! - [`PutSummary`] - Counts from a batch insert
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::collections::BTreeMap;
//! use logsync_store::{LogStore, SqliteStore};
//!
//! async fn example() {
//!     let store = SqliteStore::open("logs.db").unwrap();
//!
//!     // Local append assigns the next id for the log.
//!     let event = store.append("gateway-1", 1, 1_700_000_000_000, 7, BTreeMap::new()).await.unwrap();
//!     assert_eq!(event.id(), 1);
//!
//!     // Descriptors summarize which ids each log holds.
//!     let descriptors = store.get_descriptors_for("gateway-1").await.unwrap();
//!     println!("{}", descriptors[0]);
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Idempotent inserts**: Inserting the same event twice returns `AlreadyExists`
//! - **Conflict detection**: A different event under an existing id returns `Conflict`
//! - **Missing logs**: `get_descriptor` returns `None`, never a sentinel range

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{InsertResult, LogStore, PutSummary};
