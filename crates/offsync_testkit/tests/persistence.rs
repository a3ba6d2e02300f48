//! Persistence round-trip properties.

use offsync_engine::{JsonList, QueueStore};
use offsync_protocol::SyncConflict;
use offsync_storage::{FileStore, InMemoryStore};
use offsync_testkit::prelude::*;
use proptest::prelude::*;
use std::sync::Arc;
use tempfile::TempDir;

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn queue_round_trips_in_memory(queue in queue_strategy(16)) {
        let store = QueueStore::new(Arc::new(InMemoryStore::new()), "offline_queue");
        store.save(&queue);
        prop_assert_eq!(store.load(), queue);
    }

    #[test]
    fn queue_round_trips_on_disk(queue in queue_strategy(16)) {
        let dir = TempDir::new().unwrap();
        let store = QueueStore::new(Arc::new(FileStore::open(dir.path()).unwrap()), "offline_queue");
        store.save(&queue);

        let reopened = QueueStore::new(Arc::new(FileStore::open(dir.path()).unwrap()), "offline_queue");
        prop_assert_eq!(reopened.load(), queue);
    }

    #[test]
    fn conflicts_round_trip(conflicts in prop::collection::vec(sync_conflict_strategy(), 0..8)) {
        let list: JsonList<SyncConflict, _> =
            JsonList::new(Arc::new(InMemoryStore::new()), "sync_conflicts");
        list.save(&conflicts);
        prop_assert_eq!(list.load(), conflicts);
    }
}

#[test]
fn corrupt_queue_loads_empty() {
    use offsync_storage::KeyValueStore;

    let store = Arc::new(InMemoryStore::new());
    store.set("offline_queue", "{not json").unwrap();
    let queue = QueueStore::new(store, "offline_queue");
    assert!(queue.load().is_empty());
}
