//! Error types for the node facade.

use logsync_core::CoreError;
use logsync_store::StoreError;
use logsync_sync::SyncError;
use thiserror::Error;

/// Errors that can occur during node operations.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Malformed range, descriptor or event text.
    #[error("format error: {0}")]
    Format(#[from] CoreError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Sync error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),
}

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, NodeError>;
