//! Operation fixtures and engine harnesses.
//!
//! Provides ready-made operations for the default actions and engines wired
//! to a [`MockExecutor`] and a [`ManualNetworkMonitor`].

use offsync_engine::{
    ManualNetworkMonitor, MockExecutor, RetryPolicy, SyncConfig, SyncEngine,
};
use offsync_protocol::{actions, NewOperation};
use offsync_storage::{FileStore, InMemoryStore, KeyValueStore};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// A favorite being added.
pub fn favorite_op(item_id: &str) -> NewOperation {
    NewOperation::create("favorite", actions::ADD_FAVORITE)
        .with_resource_id(item_id)
        .with_field("type", "university")
        .with_field("itemId", item_id)
}

/// A favorite being removed.
pub fn unfavorite_op(item_id: &str) -> NewOperation {
    NewOperation::delete("favorite", actions::REMOVE_FAVORITE)
        .with_resource_id(item_id)
        .with_field("itemId", item_id)
}

/// A goal update.
pub fn goal_op(goal_id: &str, target: i64) -> NewOperation {
    NewOperation::update("goal", actions::UPDATE_GOAL)
        .with_resource_id(goal_id)
        .with_field("goalId", goal_id)
        .with_field("target", target)
}

/// A saved calculation, which has no resource ID.
pub fn calculation_op(kind: &str) -> NewOperation {
    NewOperation::custom("calculation", actions::SAVE_CALCULATION)
        .with_field("calculationType", kind)
}

/// A config whose backoff is short enough for tests.
pub fn fast_retry_config() -> SyncConfig {
    SyncConfig::new().with_retry(
        RetryPolicy::default()
            .with_initial_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(8)),
    )
}

/// An engine driven by test doubles.
pub type MockEngine<S> = SyncEngine<Arc<MockExecutor>, Arc<S>, ManualNetworkMonitor>;

/// An engine plus handles on every collaborator.
pub struct EngineHarness<S: KeyValueStore + 'static> {
    /// The engine under test.
    pub engine: MockEngine<S>,
    /// The scripted executor.
    pub executor: Arc<MockExecutor>,
    /// The backing store.
    pub store: Arc<S>,
    /// The network monitor; flip it to trigger passes.
    pub network: ManualNetworkMonitor,
}

impl<S: KeyValueStore + 'static> EngineHarness<S> {
    /// Creates a harness over `store`. The engine is not initialized.
    pub fn new(config: SyncConfig, store: Arc<S>, online: bool) -> Self {
        let executor = Arc::new(MockExecutor::new());
        let network = ManualNetworkMonitor::new(online);
        let engine = SyncEngine::new(
            config,
            Arc::clone(&executor),
            Arc::clone(&store),
            network.clone(),
        );
        Self {
            engine,
            executor,
            store,
            network,
        }
    }

    /// Simulates a process restart: a fresh offline engine over the same
    /// store.
    pub fn restart(&self, config: SyncConfig) -> Self {
        self.engine.cleanup();
        Self::new(config, Arc::clone(&self.store), false)
    }
}

impl EngineHarness<InMemoryStore> {
    /// Creates a harness over an empty in-memory store.
    pub fn in_memory(config: SyncConfig, online: bool) -> Self {
        Self::new(config, Arc::new(InMemoryStore::new()), online)
    }
}

/// A [`FileStore`] in a temporary directory.
pub struct TempFileStore {
    /// The store.
    pub store: Arc<FileStore>,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: TempDir,
}

impl TempFileStore {
    /// Creates a store in a fresh temporary directory.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = FileStore::open(temp_dir.path()).expect("Failed to open file store");
        Self {
            store: Arc::new(store),
            _temp_dir: temp_dir,
        }
    }

    /// Returns a harness over this store.
    pub fn harness(&self, config: SyncConfig, online: bool) -> EngineHarness<FileStore> {
        EngineHarness::new(config, Arc::clone(&self.store), online)
    }
}

impl Default for TempFileStore {
    fn default() -> Self {
        Self::new()
    }
}
