//! # offsync Storage
//!
//! Key-value storage trait and implementations for offsync.
//!
//! This crate provides the lowest-level durability abstraction used by the
//! offline queue. Stores are **opaque string stores** - they do not interpret
//! the values they hold.
//!
//! ## Design Principles
//!
//! - Stores are simple string maps (get, set, remove)
//! - No knowledge of operations, conflicts, or JSON layouts
//! - Must be `Send + Sync` for concurrent access
//! - Each `set` replaces the whole value stored under a key
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - For testing and ephemeral queues
//! - [`FileStore`] - For persistent storage, one file per key
//!
//! ## Example
//!
//! ```rust
//! use offsync_storage::{KeyValueStore, InMemoryStore};
//!
//! let store = InMemoryStore::new();
//! store.set("offline_queue", "[]").unwrap();
//! assert_eq!(store.get("offline_queue").unwrap().as_deref(), Some("[]"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod store;

pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use memory::InMemoryStore;
pub use store::KeyValueStore;
