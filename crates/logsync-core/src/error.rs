//! Error types for logsync core.

use thiserror::Error;

/// Malformed-input errors raised by the parsers in this crate.
///
/// Every parser is all-or-nothing: on error no partially built value is
/// returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("invalid range {input:?}: {reason}")]
    InvalidRange { input: String, reason: String },

    #[error("invalid range set {input:?}: {reason}")]
    InvalidRangeSet { input: String, reason: String },

    #[error("invalid escape in {input:?}: {reason}")]
    InvalidEscape { input: String, reason: String },

    #[error("invalid event {input:?}: {reason}")]
    InvalidEvent { input: String, reason: String },

    #[error("invalid descriptor {input:?}: {reason}")]
    InvalidDescriptor { input: String, reason: String },
}

impl CoreError {
    pub(crate) fn range(input: &str, reason: impl Into<String>) -> Self {
        CoreError::InvalidRange {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn range_set(input: &str, reason: impl Into<String>) -> Self {
        CoreError::InvalidRangeSet {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn escape(input: &str, reason: impl Into<String>) -> Self {
        CoreError::InvalidEscape {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn event(input: &str, reason: impl Into<String>) -> Self {
        CoreError::InvalidEvent {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn descriptor(input: &str, reason: impl Into<String>) -> Self {
        CoreError::InvalidDescriptor {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
