//! In-memory implementation of the LogStore trait.
//!
//! Same semantics as SQLite but nothing is persisted. Thread-safe via RwLock;
//! appends hold the write lock while choosing the next id.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use logsync_core::{Descriptor, LogEvent, LogKey, SortedRangeSet};

use crate::error::{Result, StoreError};
use crate::traits::{check_id, InsertResult, LogStore};

type Log = BTreeMap<i64, LogEvent>;

/// In-memory store implementation.
///
/// All data is lost when the store is dropped.
pub struct MemoryStore {
    logs: RwLock<BTreeMap<LogKey, Log>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            logs: RwLock::new(BTreeMap::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<LogKey, Log>>> {
        self.logs
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<LogKey, Log>>> {
        self.logs
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn describe(key: &LogKey, log: &Log) -> Descriptor {
    let ids: Vec<i64> = log.keys().copied().collect();
    Descriptor::new(key.owner_id.clone(), key.log_id, SortedRangeSet::from_values(&ids))
}

#[async_trait]
impl LogStore for MemoryStore {
    async fn insert(&self, event: &LogEvent) -> Result<InsertResult> {
        check_id(event)?;
        let mut logs = self.write()?;
        let log = logs.entry(event.key()).or_default();

        match log.get(&event.id()) {
            Some(existing) if existing == event => Ok(InsertResult::AlreadyExists),
            Some(_) => Ok(InsertResult::Conflict { id: event.id() }),
            None => {
                log.insert(event.id(), event.clone());
                Ok(InsertResult::Inserted)
            }
        }
    }

    async fn append(
        &self,
        owner_id: &str,
        log_id: i64,
        time: i64,
        event_type: i32,
        properties: BTreeMap<String, String>,
    ) -> Result<LogEvent> {
        let mut logs = self.write()?;
        let log = logs.entry(LogKey::new(owner_id, log_id)).or_default();

        let id = match log.keys().next_back() {
            Some(&high) => high.checked_add(1).ok_or_else(|| {
                StoreError::InvalidData(format!("id space exhausted for {}#{}", owner_id, log_id))
            })?,
            None => 1,
        };

        let event = LogEvent::new(owner_id, log_id, id, time, event_type, properties);
        log.insert(id, event.clone());
        Ok(event)
    }

    async fn get(&self, descriptor: &Descriptor) -> Result<Vec<LogEvent>> {
        let logs = self.read()?;
        let Some(log) = logs.get(&descriptor.key()) else {
            return Ok(Vec::new());
        };

        let mut events = Vec::new();
        for range in descriptor.range_set().ranges() {
            events.extend(log.range(range.low()..=range.high()).map(|(_, e)| e.clone()));
        }
        Ok(events)
    }

    async fn get_descriptor(&self, owner_id: &str, log_id: i64) -> Result<Option<Descriptor>> {
        let logs = self.read()?;
        let key = LogKey::new(owner_id, log_id);
        Ok(logs
            .get(&key)
            .filter(|log| !log.is_empty())
            .map(|log| describe(&key, log)))
    }

    async fn get_descriptors_for(&self, owner_id: &str) -> Result<Vec<Descriptor>> {
        let logs = self.read()?;
        Ok(logs
            .iter()
            .filter(|(key, log)| key.owner_id == owner_id && !log.is_empty())
            .map(|(key, log)| describe(key, log))
            .collect())
    }

    async fn get_descriptors(&self) -> Result<Vec<Descriptor>> {
        let logs = self.read()?;
        Ok(logs
            .iter()
            .filter(|(_, log)| !log.is_empty())
            .map(|(key, log)| describe(key, log))
            .collect())
    }
}
