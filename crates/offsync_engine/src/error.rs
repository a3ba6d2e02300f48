//! Error types for the sync engine.

use offsync_protocol::{ConflictReason, ProtocolError};
use offsync_storage::StorageError;
use serde_json::Value;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
///
/// Executors report failures with this type; the engine uses
/// [`SyncError::is_retryable`] and [`SyncError::is_conflict`] to decide what
/// happens to the operation.
#[derive(Error, Debug, Clone)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// Server-side failure (5xx-equivalent).
    #[error("server error: {0}")]
    ServerError(String),

    /// The executor call took too long.
    #[error("operation timed out")]
    Timeout,

    /// The server rejected the request outright (4xx-equivalent).
    #[error("rejected by server: {0}")]
    Rejected(String),

    /// The executor has no handler for the action.
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// Remote state diverged from the state the operation was based on.
    #[error("conflict: {reason}")]
    Conflict {
        /// Kind of divergence.
        reason: ConflictReason,
        /// Remote snapshot, if the backend returned one.
        remote_data: Option<Value>,
    },

    /// The submitted operation is malformed.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// No record with the given ID exists.
    #[error("not found: {0}")]
    NotFound(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Codec error.
    #[error("codec error: {0}")]
    Codec(String),
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates a conflict error.
    pub fn conflict(reason: ConflictReason, remote_data: Option<Value>) -> Self {
        Self::Conflict {
            reason,
            remote_data,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Timeout => true,
            SyncError::ServerError(_) => true,
            _ => false,
        }
    }

    /// Returns true if this error reports a conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, SyncError::Conflict { .. })
    }
}

impl From<ProtocolError> for SyncError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::InvalidField { .. } => SyncError::InvalidOperation(err.to_string()),
            ProtocolError::Json(_) => SyncError::Codec(err.to_string()),
        }
    }
}

impl From<StorageError> for SyncError {
    fn from(err: StorageError) -> Self {
        SyncError::Storage(err.to_string())
    }
}
