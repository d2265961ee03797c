//! Line-oriented wire format for descriptor lists and delta streams.
//!
//! A descriptor list is one descriptor line per log. A delta stream is a
//! sequence of groups:
//!
//! ```text
//! gw,1,4-5          <- descriptor: exactly the ids that follow
//! gw,1,4,1700,7,k,v
//! gw,1,5,1701,7
//! gw,2,9            <- next group
//! gw,2,9,1702,3
//! ```
//!
//! The receiver reads `range.len()` event lines after each descriptor, which
//! marks group boundaries and exposes truncated streams. Lines end in `\n`;
//! a trailing `\r` is tolerated and blank lines are skipped.

use bytes::Bytes;

use logsync_core::{Descriptor, LogEvent, LogKey, SortedRangeSet};
use logsync_store::LogStore;

use crate::error::{Result, SyncError};

/// Encode descriptors as one line each.
pub fn encode_descriptors(descriptors: &[Descriptor]) -> Bytes {
    let mut out = String::new();
    for descriptor in descriptors {
        out.push_str(&descriptor.to_representation());
        out.push('\n');
    }
    Bytes::from(out)
}

/// Decode a descriptor list. Fails on the first malformed line.
pub fn decode_descriptors(body: &[u8]) -> Result<Vec<Descriptor>> {
    let mut lines = Lines::new(body)?;
    let mut descriptors = Vec::new();
    while let Some(line) = lines.next_line() {
        descriptors.push(Descriptor::parse(line)?);
    }
    Ok(descriptors)
}

/// Builds a delta stream group by group.
#[derive(Debug, Default)]
pub struct DeltaWriter {
    buf: String,
    groups: usize,
    events: usize,
    /// Keys of the groups written, in stream order.
    logs: Vec<LogKey>,
    /// Logs whose events could not be read, with the error text.
    failed: Vec<(LogKey, String)>,
}

impl DeltaWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one group.
    ///
    /// `events` must belong to a single log and be in ascending id order,
    /// as returned by [`LogStore::get`]. An empty slice writes nothing.
    pub fn push_group(&mut self, events: &[LogEvent]) {
        let Some(first) = events.first() else {
            return;
        };
        debug_assert!(events.windows(2).all(|w| w[0].key() == w[1].key() && w[0].id() < w[1].id()));

        let ids: Vec<i64> = events.iter().map(LogEvent::id).collect();
        let header = Descriptor::new(
            first.owner_id(),
            first.log_id(),
            SortedRangeSet::from_values(&ids),
        );
        self.buf.push_str(&header.to_representation());
        self.buf.push('\n');
        for event in events {
            self.buf.push_str(&event.encode());
            self.buf.push('\n');
        }

        self.groups += 1;
        self.events += events.len();
        self.logs.push(first.key());
    }

    /// Note a log that was left out of the stream.
    pub fn record_failure(&mut self, key: LogKey, error: impl ToString) {
        self.failed.push((key, error.to_string()));
    }

    pub fn group_count(&self) -> usize {
        self.groups
    }

    pub fn event_count(&self) -> usize {
        self.events
    }

    pub fn is_empty(&self) -> bool {
        self.groups == 0
    }

    /// Logs that have a group in the stream.
    pub fn logs(&self) -> &[LogKey] {
        &self.logs
    }

    /// Logs left out because reading them failed.
    pub fn failed(&self) -> &[(LogKey, String)] {
        &self.failed
    }

    pub fn finish(self) -> Bytes {
        Bytes::from(self.buf)
    }
}

/// Fetch the events named by `delta` from `store` and write them as a
/// delta stream. Ids the store does not hold are left out.
///
/// A log whose read fails is logged, recorded in [`DeltaWriter::failed`]
/// and skipped; the remaining logs are still written.
pub async fn write_delta<S: LogStore + ?Sized>(store: &S, delta: &[Descriptor]) -> DeltaWriter {
    let mut writer = DeltaWriter::new();
    for descriptor in delta {
        let events = match store.get(descriptor).await {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!(
                    owner_id = descriptor.owner_id(),
                    log_id = descriptor.log_id(),
                    range = %descriptor.range_set(),
                    error = %e,
                    "failed to read events for delta"
                );
                writer.record_failure(descriptor.key(), e);
                continue;
            }
        };
        if events.is_empty() {
            tracing::debug!(
                owner_id = descriptor.owner_id(),
                log_id = descriptor.log_id(),
                range = %descriptor.range_set(),
                "no stored events for requested range"
            );
            continue;
        }
        writer.push_group(&events);
    }
    writer
}

/// One decoded group of a delta stream.
#[derive(Debug, Clone, PartialEq)]
pub struct DeltaGroup {
    descriptor: Descriptor,
    events: Vec<LogEvent>,
}

impl DeltaGroup {
    /// The group header as sent.
    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn events(&self) -> &[LogEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<LogEvent> {
        self.events
    }

    /// Number of events the header announced.
    pub fn expected(&self) -> u64 {
        self.descriptor.range_set().len()
    }

    /// Whether every announced event arrived.
    pub fn is_complete(&self) -> bool {
        self.events.len() as u64 == self.expected()
    }
}

/// Reads a delta stream one group at a time.
///
/// A group cut short by the end of the stream is returned with the events
/// that did arrive; check [`DeltaGroup::is_complete`].
pub struct DeltaReader<'a> {
    lines: Lines<'a>,
}

impl<'a> DeltaReader<'a> {
    pub fn new(body: &'a [u8]) -> Result<Self> {
        Ok(Self {
            lines: Lines::new(body)?,
        })
    }

    /// Read the next group, or `None` at the end of the stream.
    pub fn next_group(&mut self) -> Result<Option<DeltaGroup>> {
        let Some(header) = self.lines.next_line() else {
            return Ok(None);
        };
        let descriptor = Descriptor::parse(header)?;
        let expected = descriptor.range_set().len();

        let mut events = Vec::new();
        let mut last_id: Option<i64> = None;
        while (events.len() as u64) < expected {
            let Some(line) = self.lines.next_line() else {
                break;
            };
            let event = LogEvent::decode(line)?;

            if event.owner_id() != descriptor.owner_id() || event.log_id() != descriptor.log_id() {
                return Err(SyncError::InvalidResponse(format!(
                    "event {} in group {}",
                    event.key(),
                    descriptor.key()
                )));
            }
            if !descriptor.range_set().contains(event.id()) {
                return Err(SyncError::InvalidResponse(format!(
                    "event id {} outside announced range {} of {}",
                    event.id(),
                    descriptor.range_set(),
                    descriptor.key()
                )));
            }
            if last_id.is_some_and(|last| event.id() <= last) {
                return Err(SyncError::InvalidResponse(format!(
                    "event id {} not ascending in {}",
                    event.id(),
                    descriptor.key()
                )));
            }

            last_id = Some(event.id());
            events.push(event);
        }

        Ok(Some(DeltaGroup { descriptor, events }))
    }
}

struct Lines<'a> {
    inner: std::str::Lines<'a>,
}

impl<'a> Lines<'a> {
    fn new(body: &'a [u8]) -> Result<Self> {
        let text = std::str::from_utf8(body)
            .map_err(|e| SyncError::InvalidResponse(format!("body is not UTF-8: {}", e)))?;
        Ok(Self { inner: text.lines() })
    }

    fn next_line(&mut self) -> Option<&'a str> {
        self.inner
            .by_ref()
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .find(|line| !line.is_empty())
    }
}
