//! Golden wire vectors.
//!
//! Fixed inputs with the exact text every implementation of the line format
//! must produce.

use std::collections::BTreeMap;

use logsync_core::{codec, Descriptor, LogEvent, SortedRangeSet};

/// An event and its wire line.
#[derive(Debug, Clone)]
pub struct EventVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    pub owner_id: &'static str,
    pub log_id: i64,
    pub id: i64,
    pub time: i64,
    pub event_type: i32,
    pub properties: &'static [(&'static str, &'static str)],
    /// Expected wire line.
    pub expected_line: &'static str,
}

impl EventVector {
    pub fn event(&self) -> LogEvent {
        let properties: BTreeMap<String, String> = self
            .properties
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        LogEvent::new(
            self.owner_id,
            self.log_id,
            self.id,
            self.time,
            self.event_type,
            properties,
        )
    }
}

/// A field value and its codec encoding.
#[derive(Debug, Clone)]
pub struct CodecVector {
    pub name: &'static str,
    pub value: Option<&'static str>,
    pub expected: &'static str,
}

/// `receiver.diff_dest(other)` and its expected representation.
#[derive(Debug, Clone)]
pub struct DiffVector {
    pub name: &'static str,
    pub receiver: &'static str,
    pub other: &'static str,
    pub expected: &'static str,
}

/// A descriptor and its wire line.
#[derive(Debug, Clone)]
pub struct DescriptorVector {
    pub name: &'static str,
    pub owner_id: &'static str,
    pub log_id: i64,
    pub range_set: &'static str,
    pub expected_line: &'static str,
}

/// Get all event vectors.
pub fn event_vectors() -> Vec<EventVector> {
    vec![
        EventVector {
            name: "single property",
            owner_id: "gw-1",
            log_id: 1,
            id: 42,
            time: 1_700_000_000_000,
            event_type: 7,
            properties: &[("temp", "21.5")],
            expected_line: "gw-1,1,42,1700000000000,7,temp,21.5",
        },
        EventVector {
            name: "no properties",
            owner_id: "dev",
            log_id: 0,
            id: 1,
            time: 5,
            event_type: 0,
            properties: &[],
            expected_line: "dev,0,1,5,0",
        },
        EventVector {
            name: "escaped owner and value",
            owner_id: "a,b",
            log_id: 3,
            id: 1,
            time: 0,
            event_type: -1,
            properties: &[("note", "x$y\nz")],
            expected_line: "a$kb,3,1,0,-1,note,x$$y$nz",
        },
        EventVector {
            name: "properties in key order",
            owner_id: "gw",
            log_id: 2,
            id: 9,
            time: 100,
            event_type: 4,
            properties: &[("b", "2"), ("a", "1")],
            expected_line: "gw,2,9,100,4,a,1,b,2",
        },
        EventVector {
            name: "carriage return in key, empty value",
            owner_id: "gw",
            log_id: 2,
            id: 10,
            time: 100,
            event_type: 4,
            properties: &[("k\r", "")],
            expected_line: "gw,2,10,100,4,k$r,",
        },
    ]
}

/// Get all codec vectors.
pub fn codec_vectors() -> Vec<CodecVector> {
    vec![
        CodecVector {
            name: "plain",
            value: Some("hello"),
            expected: "hello",
        },
        CodecVector {
            name: "every escape",
            value: Some("$,\n\r"),
            expected: "$$$k$n$r",
        },
        CodecVector {
            name: "empty",
            value: Some(""),
            expected: "",
        },
        CodecVector {
            name: "null",
            value: None,
            expected: "$e",
        },
    ]
}

/// Get all range-set difference vectors.
pub fn diff_vectors() -> Vec<DiffVector> {
    vec![
        DiffVector {
            name: "overlapping spans",
            receiver: "1-20",
            other: "5-25",
            expected: "21-25",
        },
        DiffVector {
            name: "singletons against a span",
            receiver: "1,3,5,7,9",
            other: "1-10",
            expected: "2,4,6,8,10",
        },
        DiffVector {
            name: "mixed",
            receiver: "1-5,8,12",
            other: "1-5,7,9,12,20",
            expected: "7,9,20",
        },
        DiffVector {
            name: "empty receiver",
            receiver: "",
            other: "3-4",
            expected: "3-4",
        },
        DiffVector {
            name: "nothing new",
            receiver: "1-100",
            other: "2-99",
            expected: "",
        },
    ]
}

/// Get all descriptor vectors.
pub fn descriptor_vectors() -> Vec<DescriptorVector> {
    vec![
        DescriptorVector {
            name: "sparse ranges",
            owner_id: "gwid",
            log_id: 3,
            range_set: "1,2,4,9,10",
            expected_line: "gwid,3,1,2,4,9,10",
        },
        DescriptorVector {
            name: "empty log",
            owner_id: "dev",
            log_id: 1,
            range_set: "",
            expected_line: "dev,1,",
        },
        DescriptorVector {
            name: "escaped owner, full set",
            owner_id: "x,y",
            log_id: 0,
            range_set: "0-9223372036854775807",
            expected_line: "x$ky,0,0-9223372036854775807",
        },
    ]
}

/// Verify all vectors, returning `(name, matches, actual)` per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    let mut results = Vec::new();

    for v in event_vectors() {
        let line = v.event().encode();
        results.push((v.name.to_string(), line == v.expected_line, line));
    }
    for v in codec_vectors() {
        let encoded = codec::encode(v.value);
        results.push((v.name.to_string(), encoded == v.expected, encoded));
    }
    for v in diff_vectors() {
        let actual = match (SortedRangeSet::parse(v.receiver), SortedRangeSet::parse(v.other)) {
            (Ok(receiver), Ok(other)) => receiver.diff_dest(&other).to_representation(),
            (Err(e), _) | (_, Err(e)) => e.to_string(),
        };
        results.push((v.name.to_string(), actual == v.expected, actual));
    }
    for v in descriptor_vectors() {
        let actual = match SortedRangeSet::parse(v.range_set) {
            Ok(set) => Descriptor::new(v.owner_id, v.log_id, set).to_representation(),
            Err(e) => e.to_string(),
        };
        results.push((v.name.to_string(), actual == v.expected_line, actual));
    }

    results
}
