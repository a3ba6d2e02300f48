//! Queue repair commands.

use super::{open, CliError};
use offsync_protocol::QueuedOperation;
use std::path::Path;
use tracing::info;

/// Removes one pending operation and returns it.
pub fn cancel(path: &Path, operation_id: &str) -> Result<QueuedOperation, Box<dyn std::error::Error>> {
    let stores = open(path)?;
    let mut queue = stores.queue.load();
    let index = queue
        .iter()
        .position(|op| op.id == operation_id)
        .ok_or_else(|| CliError::NotFound {
            kind: "queued operation",
            id: operation_id.to_string(),
        })?;

    let removed = queue.remove(index);
    stores.queue.save(&queue);
    info!(operation_id, "operation cancelled");
    println!("Cancelled {} ({})", removed.id, removed.action);
    Ok(removed)
}

/// Removes every pending operation.
pub fn clear(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let stores = open(path)?;
    let dropped = stores.queue.load().len();
    stores.queue.clear();
    println!("Cleared {dropped} pending operation(s)");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use offsync_engine::QueueStore;
    use offsync_protocol::NewOperation;
    use offsync_storage::FileStore;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn cancel_and_clear() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FileStore::open(dir.path()).unwrap());
        let queue = QueueStore::new(store, "offline_queue");
        let first = NewOperation::create("favorite", "addFavorite").into_queued(1, 5);
        let second = NewOperation::delete("favorite", "removeFavorite").into_queued(2, 5);
        queue.save(&[first.clone(), second]);

        assert_eq!(cancel(dir.path(), &first.id).unwrap(), first);
        assert!(cancel(dir.path(), &first.id).is_err());
        assert_eq!(queue.load().len(), 1);

        clear(dir.path()).unwrap();
        assert!(queue.load().is_empty());
    }
}
