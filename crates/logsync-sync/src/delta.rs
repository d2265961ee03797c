//! Delta computation between two sets of descriptors.

use std::collections::HashMap;

use logsync_core::{Descriptor, LogKey, SortedRangeSet};

/// Which ids each source log holds that the destination lacks.
///
/// For every source descriptor, the destination descriptor with the same
/// `(owner, log)` is looked up; a missing one counts as an empty range, so
/// the whole source log is missing. Only logs with at least one missing id
/// appear in the result, in source order.
pub fn calculate_delta(source: &[Descriptor], dest: &[Descriptor]) -> Vec<Descriptor> {
    let dest_by_key: HashMap<LogKey, &SortedRangeSet> =
        dest.iter().map(|d| (d.key(), d.range_set())).collect();
    let empty = SortedRangeSet::empty();

    source
        .iter()
        .filter_map(|s| {
            let present = dest_by_key.get(&s.key()).copied().unwrap_or(&empty);
            let missing = s.range_set().difference(present);
            if missing.is_empty() {
                None
            } else {
                Some(Descriptor::new(s.owner_id(), s.log_id(), missing))
            }
        })
        .collect()
}
