//! LogEvent: one immutable log record and its line encoding.
//!
//! ```text
//! <owner>,<log_id>,<id>,<time>,<type>[,<key>,<value>]*
//! ```
//!
//! Owner, keys and values pass through the [`codec`](crate::codec). Properties
//! are held in a `BTreeMap`, so they are written in key order and a decoded
//! event compares equal to the one that was encoded.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::codec;
use crate::error::{CoreError, Result};
use crate::types::LogKey;

/// Fixed fields before the property list.
const FIXED_FIELDS: usize = 5;

/// A log entry keyed by `(owner_id, log_id, id)`.
///
/// The `id` is assigned by the log store at append time and never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    owner_id: String,
    log_id: i64,
    id: i64,
    time: i64,
    event_type: i32,
    properties: BTreeMap<String, String>,
}

impl LogEvent {
    pub fn new(
        owner_id: impl Into<String>,
        log_id: i64,
        id: i64,
        time: i64,
        event_type: i32,
        properties: BTreeMap<String, String>,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            log_id,
            id,
            time,
            event_type,
            properties,
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn log_id(&self) -> i64 {
        self.log_id
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn time(&self) -> i64 {
        self.time
    }

    pub fn event_type(&self) -> i32 {
        self.event_type
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn key(&self) -> LogKey {
        LogKey::new(self.owner_id.clone(), self.log_id)
    }

    /// Encode as a single wire line (no trailing newline).
    pub fn encode(&self) -> String {
        let mut line = format!(
            "{},{},{},{},{}",
            codec::encode_str(&self.owner_id),
            self.log_id,
            self.id,
            self.time,
            self.event_type
        );
        for (key, value) in &self.properties {
            line.push(',');
            line.push_str(&codec::encode_str(key));
            line.push(',');
            line.push_str(&codec::encode_str(value));
        }
        line
    }

    /// Decode a wire line.
    pub fn decode(line: &str) -> Result<Self> {
        let tokens: Vec<&str> = line.split(',').collect();
        if tokens.len() < FIXED_FIELDS {
            return Err(CoreError::event(
                line,
                format!("expected at least {} fields, got {}", FIXED_FIELDS, tokens.len()),
            ));
        }
        if (tokens.len() - FIXED_FIELDS) % 2 != 0 {
            return Err(CoreError::event(line, "property key without a value"));
        }

        let owner_id = codec::decode_required(tokens[0])
            .map_err(|e| CoreError::event(line, format!("owner: {}", e)))?;
        let log_id = parse_number(line, "log id", tokens[1])?;
        let id = parse_number(line, "id", tokens[2])?;
        let time = parse_number(line, "time", tokens[3])?;
        let event_type = tokens[4]
            .parse::<i32>()
            .map_err(|e| CoreError::event(line, format!("type {:?}: {}", tokens[4], e)))?;

        let mut properties = BTreeMap::new();
        for pair in tokens[FIXED_FIELDS..].chunks_exact(2) {
            let key = codec::decode_required(pair[0])
                .map_err(|e| CoreError::event(line, format!("property key: {}", e)))?;
            let value = codec::decode_required(pair[1])
                .map_err(|e| CoreError::event(line, format!("property value: {}", e)))?;
            if properties.contains_key(&key) {
                return Err(CoreError::event(
                    line,
                    format!("duplicate property key {:?}", key),
                ));
            }
            properties.insert(key, value);
        }

        Ok(Self {
            owner_id,
            log_id,
            id,
            time,
            event_type,
            properties,
        })
    }
}

fn parse_number(line: &str, field: &str, token: &str) -> Result<i64> {
    token
        .parse::<i64>()
        .map_err(|e| CoreError::event(line, format!("{} {:?}: {}", field, token, e)))
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for LogEvent {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::decode(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn props(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_encode_layout() {
        let event = LogEvent::new("gw", 1, 7, 1000, 2001, props(&[("name", "a,b")]));
        assert_eq!(event.encode(), "gw,1,7,1000,2001,name,a$kb");
    }

    #[test]
    fn test_roundtrip_with_special_owner() {
        let event = LogEvent::new(
            "gate,way\n$1",
            42,
            3,
            1_700_000_000_000,
            -1,
            props(&[("path", "/tmp/x,y"), ("note", "line1\nline2\r"), ("cost", "$5")]),
        );
        let line = event.encode();
        assert!(!line.contains('\n'));

        let decoded = LogEvent::decode(&line).unwrap();
        assert_eq!(decoded.owner_id(), "gate,way\n$1");
        assert_eq!(decoded.log_id(), 42);
        assert_eq!(decoded.id(), 3);
        assert_eq!(decoded.time(), 1_700_000_000_000);
        assert_eq!(decoded.event_type(), -1);
        assert_eq!(decoded.properties(), event.properties());
        assert_eq!(decoded, event);
    }

    #[test]
    fn test_no_properties() {
        let line = "owner,1,2,3,4";
        let event = LogEvent::decode(line).unwrap();
        assert!(event.properties().is_empty());
        assert_eq!(event.encode(), line);
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            LogEvent::decode("garbage in, garbage out!"),
            Err(CoreError::InvalidEvent { .. })
        ));
    }

    #[test]
    fn test_bad_numbers_rejected() {
        assert!(LogEvent::decode("gw,x,1,2,3").is_err());
        assert!(LogEvent::decode("gw,1,1.5,2,3").is_err());
        assert!(LogEvent::decode("gw,1,1,2,99999999999").is_err());
    }

    #[test]
    fn test_bad_escape_rejected() {
        assert!(LogEvent::decode("g$qw,1,2,3,4").is_err());
        assert!(LogEvent::decode("gw,1,2,3,4,key,value$").is_err());
    }

    #[test]
    fn test_dangling_property_key_rejected() {
        let err = LogEvent::decode("gw,1,2,3,4,key").unwrap_err();
        assert!(err.to_string().contains("without a value"));
        assert!(LogEvent::decode("gw,1,2,3,4,k,v,k2").is_err());
    }

    #[test]
    fn test_duplicate_property_key_rejected() {
        let err = LogEvent::decode("gw,1,2,3,4,k,a,k,b").unwrap_err();
        assert!(matches!(err, CoreError::InvalidEvent { .. }));
        assert!(err.to_string().contains("duplicate property key"));
        assert!(LogEvent::decode("gw,1,2,3,4,a$k,1,a$k,2").is_err());
        assert_eq!(LogEvent::decode("gw,1,2,3,4,k,a,k2,b").unwrap().properties().len(), 2);
    }

    #[test]
    fn test_null_owner_rejected() {
        assert!(LogEvent::decode("$e,1,2,3,4").is_err());
    }

    #[test]
    fn test_serde_json() {
        let event = LogEvent::new("gw", 1, 2, 3, 4, props(&[("a", "b")]));
        let json = serde_json::to_string(&event).unwrap();
        let back: LogEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    proptest! {
        #[test]
        fn prop_event_roundtrip(
            owner in ".{0,12}",
            log_id in any::<i64>(),
            id in 0i64..i64::MAX,
            time in any::<i64>(),
            event_type in any::<i32>(),
            properties in prop::collection::btree_map(".{0,6}", ".{0,10}", 0..5),
        ) {
            let event = LogEvent::new(owner, log_id, id, time, event_type, properties);
            prop_assert_eq!(LogEvent::decode(&event.encode()).unwrap(), event);
        }
    }
}
