//! Identifier types shared across the workspace.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of one log: the owning target plus the log number.
///
/// Descriptors and events for the same log compare equal on this key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LogKey {
    pub owner_id: String,
    pub log_id: i64,
}

impl LogKey {
    pub fn new(owner_id: impl Into<String>, log_id: i64) -> Self {
        Self {
            owner_id: owner_id.into(),
            log_id,
        }
    }
}

impl fmt::Display for LogKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.owner_id, self.log_id)
    }
}
