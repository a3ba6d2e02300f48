//! In-memory key-value store for testing.

use crate::error::StorageResult;
use crate::store::KeyValueStore;
use parking_lot::RwLock;
use std::collections::HashMap;

/// An in-memory key-value store.
///
/// This store keeps all values in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Hosts that do not need the queue to survive restarts
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use offsync_storage::{KeyValueStore, InMemoryStore};
///
/// let store = InMemoryStore::new();
/// store.set("k", "v").unwrap();
/// store.remove("k").unwrap();
/// assert!(store.get("k").unwrap().is_none());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with pre-existing entries.
    ///
    /// Useful for testing restart and corruption scenarios.
    #[must_use]
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: RwLock::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// Returns the number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if no keys are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Returns a sorted list of stored keys.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_new_is_empty() {
        let store = InMemoryStore::new();
        assert!(store.is_empty());
        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn memory_set_overwrites_value() {
        let store = InMemoryStore::new();
        store.set("queue", "[1]").unwrap();
        store.set("queue", "[1,2]").unwrap();

        assert_eq!(store.get("queue").unwrap().as_deref(), Some("[1,2]"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn memory_remove_absent_key_is_ok() {
        let store = InMemoryStore::new();
        store.remove("never-set").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn memory_with_entries() {
        let store = InMemoryStore::with_entries([("b", "2"), ("a", "1")]);
        assert_eq!(store.keys(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn memory_shared_through_arc() {
        let store = std::sync::Arc::new(InMemoryStore::new());
        let clone = std::sync::Arc::clone(&store);

        clone.set("k", "v").unwrap();
        assert_eq!(KeyValueStore::get(&store, "k").unwrap().as_deref(), Some("v"));
    }
}
