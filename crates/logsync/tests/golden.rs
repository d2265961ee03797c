//! Golden wire vectors checked through the public facade.
//!
//! Every implementation of the line format must produce identical text for
//! these inputs.

use logsync::core::codec;
use logsync::{Descriptor, LogEvent, SortedRangeSet};
use logsync_testkit::vectors::{codec_vectors, descriptor_vectors, diff_vectors, event_vectors};

#[test]
fn event_lines_match_vectors() {
    for v in event_vectors() {
        assert_eq!(v.event().encode(), v.expected_line, "vector '{}'", v.name);
        assert_eq!(
            v.expected_line.parse::<LogEvent>().unwrap(),
            v.event(),
            "vector '{}'",
            v.name
        );
    }
}

#[test]
fn codec_matches_vectors() {
    for v in codec_vectors() {
        assert_eq!(codec::encode(v.value), v.expected, "vector '{}'", v.name);
    }
}

#[test]
fn diff_dest_matches_vectors() {
    for v in diff_vectors() {
        let receiver: SortedRangeSet = v.receiver.parse().unwrap();
        let other: SortedRangeSet = v.other.parse().unwrap();
        assert_eq!(
            receiver.diff_dest(&other).to_representation(),
            v.expected,
            "vector '{}'",
            v.name
        );
    }
}

#[test]
fn descriptor_lines_match_vectors() {
    for v in descriptor_vectors() {
        let descriptor = Descriptor::new(v.owner_id, v.log_id, v.range_set.parse().unwrap());
        assert_eq!(descriptor.to_string(), v.expected_line, "vector '{}'", v.name);
    }
}
