//! Conflict ledger and dead-letter list.
//!
//! Both are durable inboxes for decisions the engine will not make on its
//! own. Neither contains resolution logic.

use crate::store::JsonList;
use offsync_protocol::{ConflictResolution, DeadLetter, SyncConflict};
use offsync_storage::KeyValueStore;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

/// Append-only record of detected conflicts.
///
/// `record` only touches memory; the scheduler calls [`ConflictLedger::persist`]
/// once at the end of a pass. Management calls persist immediately.
pub struct ConflictLedger<S: KeyValueStore> {
    list: JsonList<SyncConflict, S>,
    conflicts: Mutex<Vec<SyncConflict>>,
}

impl<S: KeyValueStore> ConflictLedger<S> {
    /// Creates an empty ledger stored under `key`.
    pub fn new(store: Arc<S>, key: impl Into<String>) -> Self {
        Self {
            list: JsonList::new(store, key),
            conflicts: Mutex::new(Vec::new()),
        }
    }

    /// Replaces the in-memory ledger with the persisted one.
    pub fn load(&self) -> usize {
        let loaded = self.list.load();
        let count = loaded.len();
        *self.conflicts.lock() = loaded;
        count
    }

    /// Appends a conflict.
    pub fn record(&self, conflict: SyncConflict) {
        self.conflicts.lock().push(conflict);
    }

    /// Writes the ledger to storage.
    ///
    /// The lock is held across the write so an older snapshot can never
    /// land after a newer one.
    pub fn persist(&self) {
        let conflicts = self.conflicts.lock();
        self.list.save(&conflicts);
    }

    /// Returns every recorded conflict, oldest first.
    pub fn all(&self) -> Vec<SyncConflict> {
        self.conflicts.lock().clone()
    }

    /// Returns conflicts without a resolution.
    pub fn unresolved(&self) -> Vec<SyncConflict> {
        self.conflicts
            .lock()
            .iter()
            .filter(|c| !c.is_resolved())
            .cloned()
            .collect()
    }

    /// Returns the number of recorded conflicts.
    pub fn len(&self) -> usize {
        self.conflicts.lock().len()
    }

    /// Returns true if no conflicts are recorded.
    pub fn is_empty(&self) -> bool {
        self.conflicts.lock().is_empty()
    }

    /// Records a resolution on the oldest unresolved conflict of an operation.
    ///
    /// Returns false if the operation has no unresolved conflict.
    pub fn resolve(&self, operation_id: &str, resolution: ConflictResolution) -> bool {
        let resolved = {
            let mut conflicts = self.conflicts.lock();
            match conflicts
                .iter_mut()
                .find(|c| c.operation_id == operation_id && !c.is_resolved())
            {
                Some(conflict) => {
                    conflict.resolve(resolution);
                    true
                }
                None => false,
            }
        };

        if resolved {
            info!(operation_id, %resolution, "conflict resolved");
            self.persist();
        }
        resolved
    }

    /// Drops resolved conflicts and returns how many were removed.
    pub fn prune_resolved(&self) -> usize {
        let removed = {
            let mut conflicts = self.conflicts.lock();
            let before = conflicts.len();
            conflicts.retain(|c| !c.is_resolved());
            before - conflicts.len()
        };

        if removed > 0 {
            self.persist();
        }
        removed
    }
}

/// Persisted list of operations that exhausted their retries.
pub struct DeadLetterList<S: KeyValueStore> {
    list: JsonList<DeadLetter, S>,
    letters: Mutex<Vec<DeadLetter>>,
}

impl<S: KeyValueStore> DeadLetterList<S> {
    /// Creates an empty list stored under `key`.
    pub fn new(store: Arc<S>, key: impl Into<String>) -> Self {
        Self {
            list: JsonList::new(store, key),
            letters: Mutex::new(Vec::new()),
        }
    }

    /// Replaces the in-memory list with the persisted one.
    pub fn load(&self) -> usize {
        let loaded = self.list.load();
        let count = loaded.len();
        *self.letters.lock() = loaded;
        count
    }

    /// Parks an operation.
    pub fn park(&self, letter: DeadLetter) {
        self.letters.lock().push(letter);
    }

    /// Writes the list to storage, holding the lock across the write.
    pub fn persist(&self) {
        let letters = self.letters.lock();
        self.list.save(&letters);
    }

    /// Returns every parked operation, oldest first.
    pub fn all(&self) -> Vec<DeadLetter> {
        self.letters.lock().clone()
    }

    /// Returns the number of parked operations.
    pub fn len(&self) -> usize {
        self.letters.lock().len()
    }

    /// Returns true if nothing is parked.
    pub fn is_empty(&self) -> bool {
        self.letters.lock().is_empty()
    }

    /// Removes and returns the parked operation with the given ID.
    pub fn take(&self, operation_id: &str) -> Option<DeadLetter> {
        let mut letters = self.letters.lock();
        let index = letters
            .iter()
            .position(|l| l.operation_id() == operation_id)?;
        Some(letters.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use offsync_protocol::{ConflictReason, NewOperation};
    use offsync_storage::InMemoryStore;

    fn conflict(id: &str) -> SyncConflict {
        SyncConflict::new(id, ConflictReason::VersionMismatch, 1)
    }

    #[test]
    fn record_is_memory_only_until_persist() {
        let store = Arc::new(InMemoryStore::new());
        let ledger = ConflictLedger::new(Arc::clone(&store), "sync_conflicts");

        ledger.record(conflict("a"));
        assert_eq!(ledger.len(), 1);
        assert!(store.is_empty());

        ledger.persist();
        let reloaded = ConflictLedger::new(store, "sync_conflicts");
        assert_eq!(reloaded.load(), 1);
        assert_eq!(reloaded.all(), vec![conflict("a")]);
    }

    #[test]
    fn resolve_and_prune() {
        let store = Arc::new(InMemoryStore::new());
        let ledger = ConflictLedger::new(Arc::clone(&store), "sync_conflicts");
        ledger.record(conflict("a"));
        ledger.record(conflict("b"));

        assert!(ledger.resolve("a", ConflictResolution::KeepLocal));
        assert!(!ledger.resolve("a", ConflictResolution::UseRemote));
        assert!(!ledger.resolve("missing", ConflictResolution::Merge));
        assert_eq!(ledger.unresolved().len(), 1);

        assert_eq!(ledger.prune_resolved(), 1);
        assert_eq!(ledger.all(), vec![conflict("b")]);
        assert_eq!(ledger.prune_resolved(), 0);

        // Management calls persist immediately
        let reloaded = ConflictLedger::new(store, "sync_conflicts");
        reloaded.load();
        assert_eq!(reloaded.all(), vec![conflict("b")]);
    }

    #[test]
    fn dead_letters_park_and_take() {
        let store = Arc::new(InMemoryStore::new());
        let letters = DeadLetterList::new(Arc::clone(&store), "sync_dead_letters");
        let op = NewOperation::delete("goal", "deleteGoal")
            .with_resource_id("g1")
            .into_queued(5, 3);
        let id = op.id.clone();

        letters.park(DeadLetter::new(op, "HTTP 503", 9));
        letters.persist();
        assert_eq!(letters.len(), 1);

        let reloaded = DeadLetterList::new(store, "sync_dead_letters");
        assert_eq!(reloaded.load(), 1);

        let taken = reloaded.take(&id).unwrap();
        assert_eq!(taken.reason, "HTTP 503");
        assert!(reloaded.is_empty());
        assert!(reloaded.take(&id).is_none());
    }
}
