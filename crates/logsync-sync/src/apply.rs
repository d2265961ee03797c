//! Applying a received delta stream to a store.

use std::collections::BTreeSet;

use logsync_core::LogKey;
use logsync_store::{LogStore, PutSummary};

use crate::error::{Result, SyncError};
use crate::messages::DeltaReader;

/// What applying a delta stream did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplySummary {
    /// Insert counts across all groups.
    pub put: PutSummary,
    /// Logs that received at least one group.
    pub logs: BTreeSet<LogKey>,
    /// Logs whose group hit a store error, with the error text.
    pub failed: Vec<(LogKey, String)>,
}

/// Apply every group in `body` to `store`, in stream order.
///
/// Groups are independent: a store error in one group is logged and
/// recorded in `summary.failed`, and the next group is applied. A malformed
/// line stops the stream. A truncated group still applies the events that
/// arrived and then returns [`SyncError::Truncated`]. Whatever was applied
/// before an error stays applied and is reflected in `summary`.
pub async fn apply_delta<S: LogStore + ?Sized>(
    store: &S,
    body: &[u8],
    summary: &mut ApplySummary,
) -> Result<()> {
    let mut reader = DeltaReader::new(body)?;

    while let Some(group) = reader.next_group()? {
        let key = group.descriptor().key();
        let expected = group.expected();
        let complete = group.is_complete();
        let events = group.into_events();
        let received = events.len() as u64;

        match store.put(&events).await {
            Ok(put) => {
                tracing::debug!(
                    owner_id = %key.owner_id,
                    log_id = key.log_id,
                    inserted = put.inserted,
                    duplicates = put.duplicates,
                    "applied delta group"
                );
                summary.put.merge(&put);
                summary.logs.insert(key.clone());
            }
            Err(e) => {
                tracing::warn!(
                    owner_id = %key.owner_id,
                    log_id = key.log_id,
                    error = %e,
                    "failed to apply delta group"
                );
                summary.failed.push((key.clone(), e.to_string()));
            }
        }

        if !complete {
            return Err(SyncError::Truncated {
                key,
                expected,
                received,
            });
        }
    }

    Ok(())
}
