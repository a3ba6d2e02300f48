//! File-based key-value store for persistent storage.

use crate::error::{StorageError, StorageResult};
use crate::store::KeyValueStore;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Extension used for stored values.
const VALUE_EXTENSION: &str = "json";

/// Extension used for in-progress writes.
const TEMP_EXTENSION: &str = "tmp";

/// A directory-backed key-value store.
///
/// Each key maps to one file named `<key>.json` inside the store directory.
/// Values survive process restarts.
///
/// # Durability
///
/// `set` writes the value to a temporary file, calls `File::sync_all()`, then
/// renames it over the previous file. A crash during `set` leaves either the
/// old or the new value, never a torn one.
///
/// # Thread Safety
///
/// Writes are serialized by an internal lock. Reads do not take the lock
/// because renames are atomic.
///
/// # Example
///
/// ```no_run
/// use offsync_storage::{KeyValueStore, FileStore};
/// use std::path::Path;
///
/// let store = FileStore::open(Path::new("offline-data")).unwrap();
/// store.set("offline_queue", "[]").unwrap();
/// ```
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Opens a store rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: &Path) -> StorageResult<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            write_lock: Mutex::new(()),
        })
    }

    /// Returns the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn value_path(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{key}.{VALUE_EXTENSION}")))
    }
}

/// Keys become file names, so they are restricted to a portable alphabet.
fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey {
            key: key.to_string(),
            reason: "key must not be empty",
        });
    }
    if key.starts_with('.') {
        return Err(StorageError::InvalidKey {
            key: key.to_string(),
            reason: "key must not start with '.'",
        });
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '@'))
    {
        return Err(StorageError::InvalidKey {
            key: key.to_string(),
            reason: "allowed characters are a-z, A-Z, 0-9, '_', '-', '.', '@'",
        });
    }
    Ok(())
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.value_path(key)?;
        match fs::read(&path) {
            Ok(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| StorageError::NotUtf8 {
                    key: key.to_string(),
                }),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let path = self.value_path(key)?;
        let temp = path.with_extension(TEMP_EXTENSION);

        let _guard = self.write_lock.lock();
        {
            let mut file: File = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&temp, &path)?;
        tracing::trace!(key, bytes = value.len(), "stored value");
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let path = self.value_path(key)?;
        let _guard = self.write_lock.lock();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_open_creates_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");

        let store = FileStore::open(&nested).unwrap();
        assert!(nested.is_dir());
        assert_eq!(store.path(), nested.as_path());
    }

    #[test]
    fn file_set_get_remove() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        assert!(store.get("offline_queue").unwrap().is_none());

        store.set("offline_queue", "[{\"id\":\"x\"}]").unwrap();
        assert_eq!(
            store.get("offline_queue").unwrap().as_deref(),
            Some("[{\"id\":\"x\"}]")
        );

        store.remove("offline_queue").unwrap();
        assert!(store.get("offline_queue").unwrap().is_none());

        // Removing twice is fine
        store.remove("offline_queue").unwrap();
    }

    #[test]
    fn file_values_survive_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = FileStore::open(dir.path()).unwrap();
            store.set("sync_conflicts", "[]").unwrap();
        }

        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.get("sync_conflicts").unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn file_set_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.set("k", "v").unwrap();

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["k.json".to_string()]);
    }

    #[test]
    fn file_rejects_path_like_keys() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        assert!(matches!(
            store.set("../escape", "x"),
            Err(StorageError::InvalidKey { .. })
        ));
        assert!(matches!(
            store.get("a/b"),
            Err(StorageError::InvalidKey { .. })
        ));
        assert!(matches!(store.get(""), Err(StorageError::InvalidKey { .. })));
    }

    #[test]
    fn file_rejects_non_utf8_value() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        fs::write(dir.path().join("bad.json"), [0xff, 0xfe]).unwrap();

        assert!(matches!(
            store.get("bad"),
            Err(StorageError::NotUtf8 { .. })
        ));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(32))]

            #[test]
            fn file_roundtrips_any_value(key in "[a-z][a-z0-9_]{0,15}", value in ".*") {
                let dir = tempdir().unwrap();
                let store = FileStore::open(dir.path()).unwrap();

                store.set(&key, &value).unwrap();
                prop_assert_eq!(store.get(&key).unwrap(), Some(value));
            }
        }
    }
}
