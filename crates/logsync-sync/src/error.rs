//! Error types for the sync module.

use thiserror::Error;

use logsync_core::LogKey;

/// Errors that can occur during sync and replication.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] logsync_store::StoreError),

    /// A line on the wire could not be parsed.
    #[error("format error: {0}")]
    Format(#[from] logsync_core::CoreError),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(String),

    /// Timeout waiting for the remote side.
    #[error("timeout: {0}")]
    Timeout(String),

    /// A delta group ended before all announced events arrived.
    #[error("delta stream truncated in {key}: expected {expected} events, got {received}")]
    Truncated {
        key: LogKey,
        expected: u64,
        received: u64,
    },

    /// The remote answered with a non-success status.
    #[error("remote returned status {status}: {message}")]
    RemoteStatus { status: u16, message: String },

    /// The remote's answer is well-formed text but violates the protocol.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// A replication repository failed to read or store a version.
    #[error("repository error: {0}")]
    Repository(String),
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
