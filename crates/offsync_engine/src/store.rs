//! Persistent queue store.
//!
//! Every collection the engine persists is a JSON array under its own key,
//! read in full and written in full. Durability is best-effort: read failures
//! degrade to an empty collection and write failures are logged, never
//! returned. The in-memory copy stays authoritative for the process lifetime.

use offsync_protocol::{decode_list, encode_list, QueuedOperation};
use offsync_storage::KeyValueStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// A JSON array persisted under one storage key.
pub struct JsonList<T, S: KeyValueStore> {
    store: Arc<S>,
    key: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T, S> JsonList<T, S>
where
    T: Serialize + DeserializeOwned,
    S: KeyValueStore,
{
    /// Creates a list stored under `key`.
    pub fn new(store: Arc<S>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            _marker: PhantomData,
        }
    }

    /// Returns the storage key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Loads the list. Never fails: any error yields an empty list.
    pub fn load(&self) -> Vec<T> {
        let raw = match self.store.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(key = %self.key, error = %e, "failed to read persisted list");
                return Vec::new();
            }
        };

        match decode_list(&raw) {
            Ok(items) => {
                debug!(key = %self.key, count = items.len(), "loaded persisted list");
                items
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "discarding undecodable persisted list");
                Vec::new()
            }
        }
    }

    /// Overwrites the stored list. Failures are logged.
    pub fn save(&self, items: &[T]) {
        let encoded = match encode_list(items) {
            Ok(encoded) => encoded,
            Err(e) => {
                error!(key = %self.key, error = %e, "failed to encode list");
                return;
            }
        };

        if let Err(e) = self.store.set(&self.key, &encoded) {
            error!(key = %self.key, error = %e, "failed to persist list");
        }
    }

    /// Removes the stored list. Failures are logged.
    pub fn clear(&self) {
        if let Err(e) = self.store.remove(&self.key) {
            error!(key = %self.key, error = %e, "failed to remove persisted list");
        }
    }
}

/// The durable representation of the operation queue.
pub type QueueStore<S> = JsonList<QueuedOperation, S>;
