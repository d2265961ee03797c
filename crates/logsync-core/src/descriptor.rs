//! Descriptor: which ids one log holds.
//!
//! Wire form is `<owner>,<log_id>,<range set>`. The range set contains commas
//! itself, so only the first two fields are split off.

use std::fmt;
use std::str::FromStr;

use crate::codec;
use crate::error::{CoreError, Result};
use crate::range_set::SortedRangeSet;
use crate::types::LogKey;

/// A point-in-time summary of the ids present in one log.
///
/// Never persisted; always recomputed from a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    owner_id: String,
    log_id: i64,
    range_set: SortedRangeSet,
}

impl Descriptor {
    pub fn new(owner_id: impl Into<String>, log_id: i64, range_set: SortedRangeSet) -> Self {
        Self {
            owner_id: owner_id.into(),
            log_id,
            range_set,
        }
    }

    /// A descriptor for a log with no ids.
    pub fn empty(owner_id: impl Into<String>, log_id: i64) -> Self {
        Self::new(owner_id, log_id, SortedRangeSet::empty())
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn log_id(&self) -> i64 {
        self.log_id
    }

    pub fn range_set(&self) -> &SortedRangeSet {
        &self.range_set
    }

    pub fn into_range_set(self) -> SortedRangeSet {
        self.range_set
    }

    pub fn key(&self) -> LogKey {
        LogKey::new(self.owner_id.clone(), self.log_id)
    }

    pub fn is_empty(&self) -> bool {
        self.range_set.is_empty()
    }

    /// Parse the wire form.
    pub fn parse(line: &str) -> Result<Self> {
        let mut fields = line.splitn(3, ',');
        let (Some(owner), Some(log_id), Some(ranges)) =
            (fields.next(), fields.next(), fields.next())
        else {
            return Err(CoreError::descriptor(line, "expected owner, log id and range set"));
        };

        let owner_id = codec::decode_required(owner)
            .map_err(|e| CoreError::descriptor(line, format!("owner: {}", e)))?;
        let log_id = log_id
            .parse::<i64>()
            .map_err(|e| CoreError::descriptor(line, format!("log id {:?}: {}", log_id, e)))?;
        let range_set = SortedRangeSet::parse(ranges)
            .map_err(|e| CoreError::descriptor(line, e.to_string()))?;

        Ok(Self {
            owner_id,
            log_id,
            range_set,
        })
    }

    /// The wire representation.
    pub fn to_representation(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{}",
            codec::encode_str(&self.owner_id),
            self.log_id,
            self.range_set
        )
    }
}

impl FromStr for Descriptor {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
