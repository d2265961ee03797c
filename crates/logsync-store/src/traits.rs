//! LogStore trait: the abstract interface for log persistence.
//!
//! The sync engine only talks to this trait. Implementations include SQLite
//! (primary) and in-memory (for tests).

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use logsync_core::{Descriptor, LogEvent};

use crate::error::Result;

/// Result of inserting one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertResult {
    /// Event was stored.
    Inserted,
    /// The identical event is already stored (idempotent - not an error).
    AlreadyExists,
    /// A different event is stored under the same id. Nothing was written.
    Conflict {
        /// The id both events claim.
        id: i64,
    },
}

/// Outcome of [`LogStore::put`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutSummary {
    pub inserted: usize,
    pub duplicates: usize,
    pub conflicts: usize,
}

impl PutSummary {
    pub fn record(&mut self, result: &InsertResult) {
        match result {
            InsertResult::Inserted => self.inserted += 1,
            InsertResult::AlreadyExists => self.duplicates += 1,
            InsertResult::Conflict { .. } => self.conflicts += 1,
        }
    }

    pub fn merge(&mut self, other: &PutSummary) {
        self.inserted += other.inserted;
        self.duplicates += other.duplicates;
        self.conflicts += other.conflicts;
    }
}

/// Append-only storage of events keyed by `(owner_id, log_id, id)`.
///
/// # Design Notes
///
/// - **Ids are assigned once**: [`append`](Self::append) assigns the next id
///   for a log (highest present id + 1, starting at 1). [`insert`](Self::insert)
///   stores an event whose id was assigned elsewhere, e.g. received by sync.
/// - **Idempotent inserts**: re-inserting an identical event is `AlreadyExists`.
/// - **No overwrites**: a different event under an existing id is `Conflict`.
/// - **Per-event atomicity**: each event is stored entirely or not at all;
///   a batch may stop part way.
/// - **Missing logs**: [`get_descriptor`](Self::get_descriptor) returns `None`
///   for a log that has never been written.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Store an event with a pre-assigned id.
    async fn insert(&self, event: &LogEvent) -> Result<InsertResult>;

    /// Create a new event in a log, assigning the next id.
    ///
    /// Concurrent appends to the same log never receive the same id.
    async fn append(
        &self,
        owner_id: &str,
        log_id: i64,
        time: i64,
        event_type: i32,
        properties: BTreeMap<String, String>,
    ) -> Result<LogEvent>;

    /// Events of the descriptor's log whose id is in its range set,
    /// ascending by id. Ids that are not stored are skipped.
    async fn get(&self, descriptor: &Descriptor) -> Result<Vec<LogEvent>>;

    /// Summary of one log, or `None` if the log does not exist.
    async fn get_descriptor(&self, owner_id: &str, log_id: i64) -> Result<Option<Descriptor>>;

    /// One descriptor per log owned by `owner_id`, ordered by log id.
    async fn get_descriptors_for(&self, owner_id: &str) -> Result<Vec<Descriptor>>;

    /// One descriptor per log across all owners, ordered by `(owner, log)`.
    async fn get_descriptors(&self) -> Result<Vec<Descriptor>>;

    /// Every event of one log, ascending by id.
    async fn get_log(&self, owner_id: &str, log_id: i64) -> Result<Vec<LogEvent>> {
        match self.get_descriptor(owner_id, log_id).await? {
            Some(descriptor) => self.get(&descriptor).await,
            None => Ok(Vec::new()),
        }
    }

    /// Insert events in order.
    ///
    /// Stops at the first storage error; events before it stay stored.
    async fn put(&self, events: &[LogEvent]) -> Result<PutSummary> {
        let mut summary = PutSummary::default();
        for event in events {
            let result = self.insert(event).await?;
            if let InsertResult::Conflict { id } = result {
                tracing::warn!(
                    owner_id = event.owner_id(),
                    log_id = event.log_id(),
                    id,
                    "rejected conflicting event"
                );
            }
            summary.record(&result);
        }
        Ok(summary)
    }
}

#[async_trait]
impl<S: LogStore + ?Sized> LogStore for Arc<S> {
    async fn insert(&self, event: &LogEvent) -> Result<InsertResult> {
        (**self).insert(event).await
    }

    async fn append(
        &self,
        owner_id: &str,
        log_id: i64,
        time: i64,
        event_type: i32,
        properties: BTreeMap<String, String>,
    ) -> Result<LogEvent> {
        (**self)
            .append(owner_id, log_id, time, event_type, properties)
            .await
    }

    async fn get(&self, descriptor: &Descriptor) -> Result<Vec<LogEvent>> {
        (**self).get(descriptor).await
    }

    async fn get_descriptor(&self, owner_id: &str, log_id: i64) -> Result<Option<Descriptor>> {
        (**self).get_descriptor(owner_id, log_id).await
    }

    async fn get_descriptors_for(&self, owner_id: &str) -> Result<Vec<Descriptor>> {
        (**self).get_descriptors_for(owner_id).await
    }

    async fn get_descriptors(&self) -> Result<Vec<Descriptor>> {
        (**self).get_descriptors().await
    }

    async fn put(&self, events: &[LogEvent]) -> Result<PutSummary> {
        (**self).put(events).await
    }
}

/// Reject ids that can never be assigned by a store.
pub(crate) fn check_id(event: &LogEvent) -> Result<()> {
    if event.id() < 0 {
        return Err(crate::error::StoreError::InvalidData(format!(
            "negative id {} for {}",
            event.id(),
            event.key()
        )));
    }
    Ok(())
}
