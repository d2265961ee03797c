//! Proptest generators for property-based testing.

use std::collections::BTreeMap;

use proptest::prelude::*;

use logsync_core::{Descriptor, LogEvent, SortedRangeSet};

/// Text that exercises every escaped character of the codec.
pub fn wire_text(max_len: usize) -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            4 => "[a-zA-Z0-9 ._-]",
            1 => Just(",".to_string()),
            1 => Just("$".to_string()),
            1 => Just("\n".to_string()),
            1 => Just("\r".to_string()),
        ],
        0..=max_len,
    )
    .prop_map(|parts| parts.concat())
}

/// Generate an owner id.
pub fn owner_id() -> impl Strategy<Value = String> {
    wire_text(16)
}

/// Generate a log id.
pub fn log_id() -> impl Strategy<Value = i64> {
    0i64..1_000
}

/// Generate an event id.
pub fn event_id() -> impl Strategy<Value = i64> {
    1i64..100_000
}

/// Generate a reasonable timestamp.
pub fn timestamp() -> impl Strategy<Value = i64> {
    0i64..=4_102_444_800_000
}

/// Generate a property map.
pub fn properties() -> impl Strategy<Value = BTreeMap<String, String>> {
    prop::collection::btree_map(wire_text(8), wire_text(24), 0..6)
}

/// Generate an event.
pub fn log_event() -> impl Strategy<Value = LogEvent> {
    (
        owner_id(),
        log_id(),
        event_id(),
        timestamp(),
        any::<i32>(),
        properties(),
    )
        .prop_map(|(owner, log, id, time, event_type, props)| {
            LogEvent::new(owner, log, id, time, event_type, props)
        })
}

/// Generate a sorted, deduplicated list of ids below `max`.
pub fn id_list(max: i64) -> impl Strategy<Value = Vec<i64>> {
    prop::collection::btree_set(0..max, 0..64).prop_map(|ids| ids.into_iter().collect())
}

/// Generate a range set over ids below `max`.
pub fn range_set(max: i64) -> impl Strategy<Value = SortedRangeSet> {
    id_list(max).prop_map(|ids| SortedRangeSet::from_values(&ids))
}

/// Generate a descriptor for one of a few owners and logs.
pub fn descriptor(max_id: i64) -> impl Strategy<Value = Descriptor> {
    (
        prop::sample::select(vec!["gw", "dev-1", "dev,2"]),
        0i64..4,
        range_set(max_id),
    )
        .prop_map(|(owner, log, set)| Descriptor::new(owner, log, set))
}

/// Events for `ids` of one log, with deterministic contents.
pub fn events_for(owner_id: &str, log_id: i64, ids: &[i64]) -> Vec<LogEvent> {
    ids.iter()
        .map(|&id| {
            let mut props = BTreeMap::new();
            props.insert("id".to_string(), id.to_string());
            LogEvent::new(owner_id, log_id, id, 1_700_000_000_000 + id, 1, props)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use logsync_sync::calculate_delta;

    proptest! {
        #[test]
        fn test_event_line_round_trip(event in log_event()) {
            let line = event.encode();
            prop_assert!(!line.contains('\n'));
            prop_assert!(!line.contains('\r'));
            prop_assert_eq!(LogEvent::decode(&line).unwrap(), event);
        }

        #[test]
        fn test_descriptor_line_round_trip(d in descriptor(500)) {
            prop_assert_eq!(Descriptor::parse(&d.to_representation()).unwrap(), d);
        }

        #[test]
        fn test_delta_fills_exactly_the_gap(
            source in prop::collection::vec(descriptor(200), 0..6),
            dest in prop::collection::vec(descriptor(200), 0..6),
        ) {
            let delta = calculate_delta(&source, &dest);
            for missing in &delta {
                prop_assert!(!missing.is_empty());
                // Later duplicates of a destination key win.
                let held: BTreeSet<i64> = dest
                    .iter()
                    .rev()
                    .find(|d| d.key() == missing.key())
                    .map(|d| d.range_set().iter().collect())
                    .unwrap_or_default();
                for id in missing.range_set().iter() {
                    prop_assert!(!held.contains(&id));
                }
            }
        }
    }
}
