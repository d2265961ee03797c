//! SQLite implementation of the LogStore trait.
//!
//! This is the primary storage backend. It uses rusqlite with bundled SQLite,
//! wrapped in async via tokio::spawn_blocking.
//!
//! Descriptors are computed in SQL with a gaps-and-islands query: within one
//! log, `id - ROW_NUMBER()` is constant across a run of consecutive ids, so
//! grouping on it yields one row per range instead of one row per event.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use logsync_core::{Descriptor, LogEvent, Range, SortedRangeSet};

use crate::error::{Result, StoreError};
use crate::migration::{self, now_millis};
use crate::traits::{check_id, InsertResult, LogStore};

const SELECT_EVENT: &str =
    "SELECT owner_id, log_id, id, time, event_type, properties FROM events";

const SELECT_ISLANDS: &str = "
    SELECT owner_id, log_id, MIN(id) AS low, MAX(id) AS high
    FROM (
        SELECT owner_id, log_id, id,
               id - ROW_NUMBER() OVER (PARTITION BY owner_id, log_id ORDER BY id) AS grp
        FROM events
        WHERE (?1 IS NULL OR owner_id = ?1) AND (?2 IS NULL OR log_id = ?2)
    )
    GROUP BY owner_id, log_id, grp
    ORDER BY owner_id, log_id, low";

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex, which also serializes id assignment in
/// [`append`](LogStore::append).
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking closure against the connection off the async runtime.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    async fn islands(&self, owner_id: Option<String>, log_id: Option<i64>) -> Result<Vec<Descriptor>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(SELECT_ISLANDS)?;
            let rows = stmt
                .query_map(params![owner_id, log_id], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            fold_islands(rows)
        })
        .await
    }
}

/// Columns of one `events` row before the property blob is decoded.
struct RawEvent {
    owner_id: String,
    log_id: i64,
    id: i64,
    time: i64,
    event_type: i32,
    properties: Vec<u8>,
}

impl RawEvent {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            owner_id: row.get(0)?,
            log_id: row.get(1)?,
            id: row.get(2)?,
            time: row.get(3)?,
            event_type: row.get(4)?,
            properties: row.get(5)?,
        })
    }

    fn into_event(self) -> Result<LogEvent> {
        let properties: BTreeMap<String, String> = ciborium::from_reader(&self.properties[..])
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(LogEvent::new(
            self.owner_id,
            self.log_id,
            self.id,
            self.time,
            self.event_type,
            properties,
        ))
    }
}

fn encode_properties(properties: &BTreeMap<String, String>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(properties, &mut buf)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

fn insert_row(conn: &Connection, event: &LogEvent) -> Result<()> {
    conn.execute(
        "INSERT INTO events (owner_id, log_id, id, time, event_type, properties, stored_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.owner_id(),
            event.log_id(),
            event.id(),
            event.time(),
            event.event_type(),
            encode_properties(event.properties())?,
            now_millis(),
        ],
    )?;
    Ok(())
}

/// Group `(owner, log, low, high)` rows, already sorted, into descriptors.
fn fold_islands(rows: Vec<(String, i64, i64, i64)>) -> Result<Vec<Descriptor>> {
    let mut descriptors = Vec::new();
    let mut current: Option<(String, i64, Vec<Range>)> = None;

    for (owner_id, log_id, low, high) in rows {
        let range = Range::new(low, high).map_err(|e| StoreError::InvalidData(e.to_string()))?;

        let same_log = matches!(&current, Some((o, l, _)) if *o == owner_id && *l == log_id);
        if !same_log {
            if let Some(done) = current.take() {
                descriptors.push(finish_descriptor(done)?);
            }
            current = Some((owner_id, log_id, Vec::new()));
        }
        if let Some((_, _, ranges)) = current.as_mut() {
            ranges.push(range);
        }
    }

    if let Some(done) = current {
        descriptors.push(finish_descriptor(done)?);
    }
    Ok(descriptors)
}

fn finish_descriptor((owner_id, log_id, ranges): (String, i64, Vec<Range>)) -> Result<Descriptor> {
    let set = SortedRangeSet::from_ranges(ranges).map_err(|e| StoreError::InvalidData(e.to_string()))?;
    Ok(Descriptor::new(owner_id, log_id, set))
}

#[async_trait]
impl LogStore for SqliteStore {
    async fn insert(&self, event: &LogEvent) -> Result<InsertResult> {
        check_id(event)?;
        let event = event.clone();

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;

            let existing = tx
                .query_row(
                    &format!("{} WHERE owner_id = ?1 AND log_id = ?2 AND id = ?3", SELECT_EVENT),
                    params![event.owner_id(), event.log_id(), event.id()],
                    RawEvent::from_row,
                )
                .optional()?;

            if let Some(raw) = existing {
                let existing = raw.into_event()?;
                return Ok(if existing == event {
                    InsertResult::AlreadyExists
                } else {
                    InsertResult::Conflict { id: event.id() }
                });
            }

            insert_row(&tx, &event)?;
            tx.commit()?;
            Ok(InsertResult::Inserted)
        })
        .await
    }

    async fn append(
        &self,
        owner_id: &str,
        log_id: i64,
        time: i64,
        event_type: i32,
        properties: BTreeMap<String, String>,
    ) -> Result<LogEvent> {
        let owner_id = owner_id.to_string();

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;

            let high: Option<i64> = tx.query_row(
                "SELECT MAX(id) FROM events WHERE owner_id = ?1 AND log_id = ?2",
                params![owner_id, log_id],
                |row| row.get(0),
            )?;
            let id = match high {
                Some(high) => high.checked_add(1).ok_or_else(|| {
                    StoreError::InvalidData(format!("id space exhausted for {}#{}", owner_id, log_id))
                })?,
                None => 1,
            };

            let event = LogEvent::new(owner_id, log_id, id, time, event_type, properties);
            insert_row(&tx, &event)?;
            tx.commit()?;
            Ok(event)
        })
        .await
    }

    async fn get(&self, descriptor: &Descriptor) -> Result<Vec<LogEvent>> {
        let descriptor = descriptor.clone();

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "{} WHERE owner_id = ?1 AND log_id = ?2 AND id BETWEEN ?3 AND ?4 ORDER BY id",
                SELECT_EVENT
            ))?;

            let mut events = Vec::new();
            for range in descriptor.range_set().ranges() {
                let rows = stmt
                    .query_map(
                        params![descriptor.owner_id(), descriptor.log_id(), range.low(), range.high()],
                        RawEvent::from_row,
                    )?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                for raw in rows {
                    events.push(raw.into_event()?);
                }
            }
            Ok(events)
        })
        .await
    }

    async fn get_descriptor(&self, owner_id: &str, log_id: i64) -> Result<Option<Descriptor>> {
        let mut found = self.islands(Some(owner_id.to_string()), Some(log_id)).await?;
        Ok(found.pop())
    }

    async fn get_descriptors_for(&self, owner_id: &str) -> Result<Vec<Descriptor>> {
        self.islands(Some(owner_id.to_string()), None).await
    }

    async fn get_descriptors(&self) -> Result<Vec<Descriptor>> {
        self.islands(None, None).await
    }
}
