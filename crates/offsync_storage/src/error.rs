//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The key cannot be used by this store.
    #[error("invalid storage key {key:?}: {reason}")]
    InvalidKey {
        /// The rejected key.
        key: String,
        /// Why the key was rejected.
        reason: &'static str,
    },

    /// A stored value is not valid UTF-8.
    #[error("stored value for {key:?} is not valid UTF-8")]
    NotUtf8 {
        /// The key whose value is corrupted.
        key: String,
    },

    /// The store is unavailable (closed, locked, or failing).
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}
