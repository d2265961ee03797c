//! Convergence verification after sync.
//!
//! Two sides can check they hold the same log by comparing descriptors, and
//! the same contents by comparing state hashes.

use logsync_core::{Descriptor, LogKey, SortedRangeSet};
use logsync_store::LogStore;

use crate::error::Result;

const STATE_HASH_DOMAIN: &[u8] = b"logsync-state-v0:";

/// Compute a deterministic state hash for one log.
///
/// Blake3 over a domain tag, the log's descriptor line and every encoded
/// event line in id order, hex-encoded. `None` if the log does not exist.
pub async fn compute_log_state_hash<S: LogStore + ?Sized>(
    store: &S,
    owner_id: &str,
    log_id: i64,
) -> Result<Option<String>> {
    let descriptor = match store.get_descriptor(owner_id, log_id).await? {
        Some(d) => d,
        None => return Ok(None),
    };
    let events = store.get(&descriptor).await?;

    let mut hasher = blake3::Hasher::new();
    hasher.update(STATE_HASH_DOMAIN);
    hasher.update(descriptor.to_representation().as_bytes());
    hasher.update(b"\n");
    for event in &events {
        hasher.update(event.encode().as_bytes());
        hasher.update(b"\n");
    }

    Ok(Some(hex::encode(hasher.finalize().as_bytes())))
}

/// Result of convergence verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvergenceResult {
    /// Both sides hold the same ids.
    Converged,
    /// The remote holds ids we lack.
    Missing { delta: SortedRangeSet },
    /// We hold ids the remote lacks.
    Ahead { delta: SortedRangeSet },
    /// Each side holds ids the other lacks.
    Diverged {
        missing: SortedRangeSet,
        ahead: SortedRangeSet,
    },
}

impl ConvergenceResult {
    /// Check if both sides have converged.
    pub fn is_converged(&self) -> bool {
        matches!(self, ConvergenceResult::Converged)
    }
}

/// Compare the local copy of a log against the remote's descriptor.
///
/// A log absent locally counts as empty.
pub async fn verify_convergence<S: LogStore + ?Sized>(
    local_store: &S,
    remote: &Descriptor,
) -> Result<ConvergenceResult> {
    let local = local_store
        .get_descriptor(remote.owner_id(), remote.log_id())
        .await?
        .map(Descriptor::into_range_set)
        .unwrap_or_default();

    let missing = remote.range_set().difference(&local);
    let ahead = local.difference(remote.range_set());

    let result = match (missing.is_empty(), ahead.is_empty()) {
        (true, true) => ConvergenceResult::Converged,
        (false, true) => ConvergenceResult::Missing { delta: missing },
        (true, false) => ConvergenceResult::Ahead { delta: ahead },
        (false, false) => ConvergenceResult::Diverged { missing, ahead },
    };
    Ok(result)
}

/// Batch verification of several remote logs.
pub async fn verify_all_logs<S: LogStore + ?Sized>(
    local_store: &S,
    remote: &[Descriptor],
) -> Result<Vec<(LogKey, ConvergenceResult)>> {
    let mut results = Vec::with_capacity(remote.len());
    for descriptor in remote {
        let result = verify_convergence(local_store, descriptor).await?;
        results.push((descriptor.key(), result));
    }
    Ok(results)
}
