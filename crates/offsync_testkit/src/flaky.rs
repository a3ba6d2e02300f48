//! A storage wrapper with injectable failures.

use offsync_storage::{KeyValueStore, StorageError, StorageResult};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Wraps a store and fails reads or writes on demand.
///
/// Used to check that persistence failures never surface from the engine and
/// never corrupt its in-memory state.
pub struct FlakyStore<S: KeyValueStore> {
    inner: S,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    failed_reads: AtomicUsize,
    failed_writes: AtomicUsize,
}

impl<S: KeyValueStore> FlakyStore<S> {
    /// Wraps `inner` with failures disabled.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            failed_reads: AtomicUsize::new(0),
            failed_writes: AtomicUsize::new(0),
        }
    }

    /// Makes `get` fail while set.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes `set` and `remove` fail while set.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of reads that were failed.
    pub fn failed_reads(&self) -> usize {
        self.failed_reads.load(Ordering::SeqCst)
    }

    /// Returns the number of writes that were failed.
    pub fn failed_writes(&self) -> usize {
        self.failed_writes.load(Ordering::SeqCst)
    }

    /// Returns the wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn check_write(&self) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            self.failed_writes.fetch_add(1, Ordering::SeqCst);
            return Err(StorageError::Unavailable("injected write failure".into()));
        }
        Ok(())
    }
}

impl<S: KeyValueStore> KeyValueStore for FlakyStore<S> {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            self.failed_reads.fetch_add(1, Ordering::SeqCst);
            return Err(StorageError::Unavailable("injected read failure".into()));
        }
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.check_write()?;
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.check_write()?;
        self.inner.remove(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use offsync_storage::InMemoryStore;

    #[test]
    fn passes_through_when_healthy() {
        let store = FlakyStore::new(InMemoryStore::new());
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn injected_failures_are_counted() {
        let store = FlakyStore::new(InMemoryStore::new());
        store.set_fail_writes(true);
        assert!(store.set("k", "v").is_err());
        assert!(store.remove("k").is_err());
        assert_eq!(store.failed_writes(), 2);
        assert!(store.inner().is_empty());

        store.set_fail_reads(true);
        assert!(store.get("k").is_err());
        assert_eq!(store.failed_reads(), 1);
    }
}
