//! Key-value store trait definition.

use crate::error::StorageResult;

/// A durable string key-value store.
///
/// Stores are **opaque**. The offline queue writes JSON documents into them,
/// but a store never parses what it holds.
///
/// # Invariants
///
/// - `get` returns exactly the last value passed to `set` for that key
/// - `set` replaces the whole value; there are no partial writes
/// - `remove` of an absent key is not an error
/// - Stores must be `Send + Sync`; all methods take `&self`
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - For testing
/// - [`super::FileStore`] - For persistent storage
pub trait KeyValueStore: Send + Sync {
    /// Returns the value stored under `key`, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the value exists but cannot be read.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// After this returns successfully the value is expected to survive
    /// process termination (for durable implementations).
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Removes the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the removal fails.
    fn remove(&self, key: &str) -> StorageResult<()>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<S> {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        (**self).remove(key)
    }
}
