//! CLI command implementations.

pub mod conflicts;
pub mod dead_letters;
pub mod queue;
pub mod status;

use offsync_engine::{
    ConflictLedger, DeadLetterList, QueueStore, DEFAULT_CONFLICTS_KEY, DEFAULT_DEAD_LETTER_KEY,
    DEFAULT_QUEUE_KEY,
};
use offsync_storage::FileStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Errors reported by CLI commands.
#[derive(Error, Debug)]
pub enum CliError {
    /// The store directory does not exist.
    #[error("no store found at {0}")]
    NoStore(PathBuf),

    /// No record with the given operation ID.
    #[error("no {kind} with operation ID {id}")]
    NotFound {
        /// What was looked up.
        kind: &'static str,
        /// The operation ID.
        id: String,
    },

    /// An argument could not be parsed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// The persisted collections of one store directory.
pub struct Stores {
    /// The operation queue.
    pub queue: QueueStore<FileStore>,
    /// The conflict ledger, loaded.
    pub conflicts: ConflictLedger<FileStore>,
    /// The dead-letter list, loaded.
    pub dead_letters: DeadLetterList<FileStore>,
}

/// Opens the store at `path`. The directory must already exist.
pub fn open(path: &Path) -> Result<Stores, Box<dyn std::error::Error>> {
    if !path.is_dir() {
        return Err(CliError::NoStore(path.to_path_buf()).into());
    }

    let store = Arc::new(FileStore::open(path)?);
    let stores = Stores {
        queue: QueueStore::new(Arc::clone(&store), DEFAULT_QUEUE_KEY),
        conflicts: ConflictLedger::new(Arc::clone(&store), DEFAULT_CONFLICTS_KEY),
        dead_letters: DeadLetterList::new(store, DEFAULT_DEAD_LETTER_KEY),
    };
    stores.conflicts.load();
    stores.dead_letters.load();
    Ok(stores)
}

/// Formats a unix-millisecond timestamp as seconds with millisecond precision.
pub fn format_millis(millis: u64) -> String {
    format!("{}.{:03}", millis / 1000, millis % 1000)
}
