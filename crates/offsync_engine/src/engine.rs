//! The sync engine.
//!
//! `SyncEngine` owns the in-memory queue and drives sync passes: it sorts the
//! dispatchable operations, runs them in concurrent batches through the
//! in-flight registry, settles every outcome against the queue, and persists
//! the result once per pass.

use crate::clock::{unix_millis, EnqueueClock};
use crate::config::{ExhaustionPolicy, SyncConfig};
use crate::error::{SyncError, SyncResult};
use crate::events::{ExhaustedDisposition, SyncEvent};
use crate::executor::RemoteExecutor;
use crate::inflight::{InFlightRegistry, Participation};
use crate::ledger::{ConflictLedger, DeadLetterList};
use crate::network::{NetworkMonitor, Subscription};
use crate::status::{QueueStatus, SyncPassReport, SyncStats};
use crate::store::QueueStore;
use futures_util::future::{join_all, FutureExt};
use offsync_protocol::{
    ConflictReason, ConflictResolution, DeadLetter, NewOperation, QueuedOperation, SyncConflict,
    SyncOutcome,
};
use offsync_storage::KeyValueStore;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once, Weak};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Where a single attempt stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttemptState {
    /// Calling the executor.
    Dispatching,
    /// Waiting out the backoff before the next call.
    Sleeping(Duration),
}

/// Handle to the offline queue and its scheduler.
///
/// Cloning is cheap; all clones drive the same engine.
///
/// # Example
///
/// ```rust,no_run
/// use offsync_engine::{ManualNetworkMonitor, MockExecutor, SyncConfig, SyncEngine};
/// use offsync_protocol::NewOperation;
/// use offsync_storage::InMemoryStore;
///
/// # async fn demo() -> offsync_engine::SyncResult<()> {
/// let engine = SyncEngine::new(
///     SyncConfig::default(),
///     MockExecutor::new(),
///     InMemoryStore::new(),
///     ManualNetworkMonitor::online(),
/// );
/// engine.initialize().await;
///
/// let id = engine.queue_operation(
///     NewOperation::create("favorite", "addFavorite").with_resource_id("U1"),
/// )?;
/// println!("queued {id}");
/// # Ok(())
/// # }
/// ```
pub struct SyncEngine<E, S, N>
where
    E: RemoteExecutor + 'static,
    S: KeyValueStore + 'static,
    N: NetworkMonitor + 'static,
{
    inner: Arc<EngineInner<E, S, N>>,
}

impl<E, S, N> Clone for SyncEngine<E, S, N>
where
    E: RemoteExecutor + 'static,
    S: KeyValueStore + 'static,
    N: NetworkMonitor + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct EngineInner<E, S, N>
where
    E: RemoteExecutor + 'static,
    S: KeyValueStore + 'static,
    N: NetworkMonitor + 'static,
{
    config: SyncConfig,
    executor: E,
    network: N,
    queue: Mutex<Vec<QueuedOperation>>,
    queue_store: QueueStore<S>,
    conflicts: ConflictLedger<S>,
    dead_letters: DeadLetterList<S>,
    inflight: InFlightRegistry,
    load_once: Once,
    online: AtomicBool,
    syncing: AtomicBool,
    rerun: AtomicBool,
    clock: Mutex<EnqueueClock>,
    stats: RwLock<SyncStats>,
    subscription: Mutex<Option<Subscription>>,
    runtime: Mutex<Option<Handle>>,
    events: broadcast::Sender<SyncEvent>,
}

impl<E, S, N> SyncEngine<E, S, N>
where
    E: RemoteExecutor + 'static,
    S: KeyValueStore + 'static,
    N: NetworkMonitor + 'static,
{
    /// Creates a new engine. Nothing is loaded until first use.
    pub fn new(config: SyncConfig, executor: E, store: S, network: N) -> Self {
        let store = Arc::new(store);
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let online = network.is_online();

        Self {
            inner: Arc::new(EngineInner {
                queue_store: QueueStore::new(Arc::clone(&store), config.queue_key.clone()),
                conflicts: ConflictLedger::new(Arc::clone(&store), config.conflicts_key.clone()),
                dead_letters: DeadLetterList::new(store, config.dead_letter_key.clone()),
                config,
                executor,
                network,
                queue: Mutex::new(Vec::new()),
                inflight: InFlightRegistry::new(),
                load_once: Once::new(),
                online: AtomicBool::new(online),
                syncing: AtomicBool::new(false),
                rerun: AtomicBool::new(false),
                clock: Mutex::new(EnqueueClock::default()),
                stats: RwLock::new(SyncStats::default()),
                subscription: Mutex::new(None),
                runtime: Mutex::new(None),
                events,
            }),
        }
    }

    /// Loads persisted state and starts watching connectivity.
    ///
    /// Must be called from within a Tokio runtime; passes triggered by
    /// network callbacks are spawned on it. Calling it again only refreshes
    /// the connectivity subscription.
    pub async fn initialize(&self) {
        let inner = &self.inner;
        inner.ensure_loaded();
        *inner.runtime.lock() = Handle::try_current().ok();

        let weak: Weak<EngineInner<E, S, N>> = Arc::downgrade(inner);
        let subscription = inner.network.subscribe(Box::new(move |online| {
            if let Some(inner) = weak.upgrade() {
                SyncEngine { inner }.handle_connectivity(online);
            }
        }));
        let previous = inner.subscription.lock().replace(subscription);
        if let Some(previous) = previous {
            previous.unsubscribe();
        }

        let online = inner.network.is_online();
        inner.online.store(online, Ordering::SeqCst);
        info!(
            pending = inner.queue.lock().len(),
            conflicts = inner.conflicts.len(),
            dead_letters = inner.dead_letters.len(),
            online,
            "sync engine initialized"
        );

        if online {
            self.spawn_pass();
        }
    }

    /// Validates and enqueues an operation, returning its ID.
    ///
    /// The queue is persisted before this returns. If the engine is online a
    /// pass is scheduled in the background.
    pub fn queue_operation(&self, operation: NewOperation) -> SyncResult<String> {
        operation.validate()?;
        let inner = &self.inner;
        inner.ensure_loaded();

        let enqueued_at = inner.clock.lock().next(unix_millis());
        let queued = operation.into_queued(enqueued_at, inner.config.retry.max_attempts);
        let id = queued.id.clone();
        info!(operation_id = %id, action = %queued.action, priority = %queued.priority, "operation queued");

        inner.queue.lock().push(queued);
        inner.persist_queue();
        inner.emit(SyncEvent::OperationQueued {
            operation_id: id.clone(),
        });

        if inner.is_online() {
            self.spawn_pass();
        }
        Ok(id)
    }

    /// Returns a snapshot of the queue and engine flags.
    pub fn status(&self) -> QueueStatus {
        let inner = &self.inner;
        inner.ensure_loaded();
        let queue = inner.queue.lock();
        QueueStatus::from_queue(&queue, inner.is_online(), inner.is_syncing())
    }

    /// Returns the operation with the given ID, if queued.
    pub fn operation(&self, operation_id: &str) -> Option<QueuedOperation> {
        self.inner.ensure_loaded();
        self.inner.find(operation_id)
    }

    /// Drops every pending operation and removes the persisted queue.
    ///
    /// Conflicts and dead letters are untouched.
    pub fn clear_queue(&self) {
        let inner = &self.inner;
        inner.ensure_loaded();
        let dropped = {
            let mut queue = inner.queue.lock();
            let dropped = queue.len();
            queue.clear();
            inner.queue_store.clear();
            dropped
        };
        info!(dropped, "queue cleared");
    }

    /// Stops watching connectivity. The queue is left as is.
    pub fn cleanup(&self) {
        let subscription = self.inner.subscription.lock().take();
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
            debug!("network subscription released");
        }
    }

    /// Runs one sync pass.
    ///
    /// Returns `None` without doing anything if the engine is offline, a pass
    /// is already running, or nothing is dispatchable. A trigger that finds a
    /// pass running is not lost: the running pass performs one follow-up pass
    /// once it finishes, and its results are folded into the returned report.
    pub async fn start_sync(&self) -> Option<SyncPassReport> {
        let inner = &self.inner;
        inner.ensure_loaded();
        let mut combined: Option<SyncPassReport> = None;

        loop {
            if !inner.is_online() {
                debug!("offline, sync pass skipped");
                break;
            }

            let Some(guard) = PassGuard::acquire(&inner.syncing) else {
                inner.rerun.store(true, Ordering::SeqCst);
                debug!("sync pass already running, trigger coalesced");
                break;
            };
            inner.rerun.store(false, Ordering::SeqCst);

            if let Some(report) = inner.run_pass().await {
                match combined.as_mut() {
                    Some(previous) => previous.absorb(report),
                    None => combined = Some(report),
                }
            }
            drop(guard);

            if !inner.rerun.load(Ordering::SeqCst) {
                break;
            }
        }

        combined
    }

    /// Attempts one queued operation now, joining an attempt already in
    /// flight for it.
    pub async fn sync_operation(&self, operation_id: &str) -> SyncResult<SyncOutcome> {
        let inner = &self.inner;
        inner.ensure_loaded();
        if inner.find(operation_id).is_none() && !inner.inflight.is_in_flight(operation_id) {
            return Err(SyncError::NotFound(operation_id.to_string()));
        }

        // The attempt may have been started by a caller that has since gone
        // away, so every caller persists what it observed.
        let (outcome, _) = inner.attempt_shared(operation_id.to_string()).await;
        inner.persist_all();
        Ok(outcome)
    }

    /// Removes one pending operation.
    pub fn cancel_operation(&self, operation_id: &str) -> SyncResult<QueuedOperation> {
        let inner = &self.inner;
        inner.ensure_loaded();
        let removed = inner
            .take(operation_id)
            .ok_or_else(|| SyncError::NotFound(operation_id.to_string()))?;
        inner.persist_queue();
        info!(operation_id, "operation cancelled");
        Ok(removed)
    }

    /// Clears the retry history of a queued operation so it is dispatched
    /// again.
    pub fn reset_attempts(&self, operation_id: &str) -> SyncResult<()> {
        let inner = &self.inner;
        inner.ensure_loaded();
        {
            let mut queue = inner.queue.lock();
            let op = queue
                .iter_mut()
                .find(|op| op.id == operation_id)
                .ok_or_else(|| SyncError::NotFound(operation_id.to_string()))?;
            op.reset_attempts();
        }
        inner.persist_queue();
        info!(operation_id, "retry budget reset");

        if inner.is_online() {
            self.spawn_pass();
        }
        Ok(())
    }

    /// Returns every recorded conflict, oldest first.
    pub fn conflicts(&self) -> Vec<SyncConflict> {
        self.inner.ensure_loaded();
        self.inner.conflicts.all()
    }

    /// Returns the conflicts awaiting a resolution.
    pub fn unresolved_conflicts(&self) -> Vec<SyncConflict> {
        self.inner.ensure_loaded();
        self.inner.conflicts.unresolved()
    }

    /// Records how a conflict was resolved.
    pub fn resolve_conflict(
        &self,
        operation_id: &str,
        resolution: ConflictResolution,
    ) -> SyncResult<()> {
        self.inner.ensure_loaded();
        if self.inner.conflicts.resolve(operation_id, resolution) {
            Ok(())
        } else {
            Err(SyncError::NotFound(operation_id.to_string()))
        }
    }

    /// Drops resolved conflicts from the ledger, returning how many.
    pub fn prune_resolved_conflicts(&self) -> usize {
        self.inner.ensure_loaded();
        self.inner.conflicts.prune_resolved()
    }

    /// Returns the dead-lettered operations.
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.inner.ensure_loaded();
        self.inner.dead_letters.all()
    }

    /// Moves a dead letter back into the queue with a fresh retry budget.
    ///
    /// The operation keeps its ID and enqueue time, so it sorts where it
    /// originally did.
    pub fn requeue_dead_letter(&self, operation_id: &str) -> SyncResult<String> {
        let inner = &self.inner;
        inner.ensure_loaded();
        let letter = inner
            .dead_letters
            .take(operation_id)
            .ok_or_else(|| SyncError::NotFound(operation_id.to_string()))?;

        let operation = letter.into_requeued();
        let id = operation.id.clone();
        inner.queue.lock().push(operation);
        inner.persist_queue();
        inner.dead_letters.persist();
        info!(operation_id = %id, "dead letter requeued");

        if inner.is_online() {
            self.spawn_pass();
        }
        Ok(id)
    }

    /// Deletes a dead letter for good.
    pub fn discard_dead_letter(&self, operation_id: &str) -> SyncResult<DeadLetter> {
        let inner = &self.inner;
        inner.ensure_loaded();
        let letter = inner
            .dead_letters
            .take(operation_id)
            .ok_or_else(|| SyncError::NotFound(operation_id.to_string()))?;
        inner.dead_letters.persist();
        info!(operation_id, "dead letter discarded");
        Ok(letter)
    }

    /// Subscribes to engine events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    /// Returns sync statistics.
    pub fn stats(&self) -> SyncStats {
        self.inner.stats.read().clone()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// Returns the last known connectivity.
    pub fn is_online(&self) -> bool {
        self.inner.is_online()
    }

    /// Returns true while a pass is running.
    pub fn is_syncing(&self) -> bool {
        self.inner.is_syncing()
    }

    fn handle_connectivity(&self, online: bool) {
        let inner = &self.inner;
        let previous = inner.online.swap(online, Ordering::SeqCst);
        if previous == online {
            return;
        }

        info!(online, "connectivity changed");
        inner.emit(SyncEvent::ConnectivityChanged { online });
        if online {
            self.spawn_pass();
        }
    }

    fn spawn_pass(&self) {
        let handle = self
            .inner
            .runtime
            .lock()
            .clone()
            .or_else(|| Handle::try_current().ok());

        match handle {
            Some(handle) => {
                let engine = self.clone();
                handle.spawn(async move {
                    engine.start_sync().await;
                });
            }
            None => {
                warn!("no tokio runtime available, sync pass deferred until the next trigger")
            }
        }
    }
}

impl<E, S, N> EngineInner<E, S, N>
where
    E: RemoteExecutor + 'static,
    S: KeyValueStore + 'static,
    N: NetworkMonitor + 'static,
{
    fn ensure_loaded(&self) {
        self.load_once.call_once(|| {
            let loaded = self.queue_store.load();
            let conflicts = self.conflicts.load();
            let dead_letters = self.dead_letters.load();

            {
                let mut clock = self.clock.lock();
                for op in &loaded {
                    clock.observe(op.enqueued_at);
                }
                for letter in self.dead_letters.all() {
                    clock.observe(letter.operation.enqueued_at);
                }
            }

            let mut queue = self.queue.lock();
            let early = std::mem::replace(&mut *queue, loaded);
            queue.extend(early);
            debug!(
                pending = queue.len(),
                conflicts,
                dead_letters,
                "persisted state loaded"
            );
        });
    }

    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::SeqCst)
    }

    fn emit(&self, event: SyncEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    fn find(&self, operation_id: &str) -> Option<QueuedOperation> {
        self.queue
            .lock()
            .iter()
            .find(|op| op.id == operation_id)
            .cloned()
    }

    fn take(&self, operation_id: &str) -> Option<QueuedOperation> {
        let mut queue = self.queue.lock();
        let index = queue.iter().position(|op| op.id == operation_id)?;
        Some(queue.remove(index))
    }

    /// Writes the queue while still holding its lock, so concurrent
    /// writers land in the same order as their mutations.
    fn persist_queue(&self) {
        let queue = self.queue.lock();
        self.queue_store.save(&queue);
    }

    fn persist_all(&self) {
        self.persist_queue();
        self.conflicts.persist();
        self.dead_letters.persist();
    }

    /// Returns the dispatchable operation IDs in dispatch order.
    fn dispatch_order(&self) -> Vec<String> {
        let queue = self.queue.lock();
        let mut ready: Vec<&QueuedOperation> =
            queue.iter().filter(|op| !op.is_exhausted()).collect();
        ready.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        ready.into_iter().map(|op| op.id.clone()).collect()
    }

    async fn run_pass(self: &Arc<Self>) -> Option<SyncPassReport> {
        let order = self.dispatch_order();
        if order.is_empty() {
            debug!("nothing to sync");
            return None;
        }

        let started = Instant::now();
        debug!(operations = order.len(), batch_size = self.config.batch_size, "sync pass started");

        let mut outcomes = Vec::with_capacity(order.len());
        let mut batches = 0;
        let mut aborted_offline = false;
        let mut chunks = order.chunks(self.config.batch_size).peekable();

        while let Some(batch) = chunks.next() {
            batches += 1;
            debug!(batch = batches, size = batch.len(), "dispatching batch");
            let attempts = batch.iter().map(|id| self.attempt_shared(id.clone()));
            outcomes.extend(join_all(attempts).await.into_iter().map(|(outcome, _)| outcome));

            if chunks.peek().is_some() && !self.is_online() {
                warn!(
                    remaining = order.len() - outcomes.len(),
                    "network lost, remaining batches abandoned"
                );
                aborted_offline = true;
                break;
            }
        }

        self.persist_all();

        let report = SyncPassReport {
            outcomes,
            batches,
            aborted_offline,
            duration: started.elapsed(),
        };
        {
            let mut stats = self.stats.write();
            stats.passes_completed += 1;
            stats.last_pass_time = Some(Instant::now());
        }
        debug!(
            attempted = report.attempted(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            conflicts = report.conflicts(),
            "sync pass completed"
        );
        self.emit(SyncEvent::PassCompleted {
            attempted: report.attempted(),
            succeeded: report.succeeded(),
            aborted_offline,
        });
        Some(report)
    }

    /// Runs the attempt for `id` through the in-flight registry.
    async fn attempt_shared(self: &Arc<Self>, id: String) -> (SyncOutcome, Participation) {
        self.inflight
            .run_or_join(&id, || Arc::clone(self).attempt(id.clone()).boxed())
            .await
    }

    /// Drives one operation until it succeeds, conflicts, or runs out of
    /// attempts. Every queue mutation for the attempt happens here, so
    /// joined callers never settle twice.
    async fn attempt(self: Arc<Self>, id: String) -> SyncOutcome {
        let mut state = AttemptState::Dispatching;
        loop {
            match state {
                AttemptState::Sleeping(delay) => {
                    tokio::time::sleep(delay).await;
                    state = AttemptState::Dispatching;
                }
                AttemptState::Dispatching => {
                    let Some(op) = self.find(&id) else {
                        debug!(operation_id = %id, "operation left the queue before dispatch");
                        return SyncOutcome::failure(id, "operation is no longer queued");
                    };
                    if op.is_exhausted() {
                        let error = op
                            .last_error
                            .unwrap_or_else(|| "retry budget exhausted".to_string());
                        return SyncOutcome::failure(id, error);
                    }

                    debug!(operation_id = %id, action = %op.action, attempts = op.attempts, "dispatching");
                    match self.dispatch(&op).await {
                        Ok(()) => return self.settle_success(&id),
                        Err(SyncError::Conflict {
                            reason,
                            remote_data,
                        }) => return self.settle_conflict(&op, reason, remote_data),
                        Err(err) => match self.settle_failure(&id, &err) {
                            Some(delay) => state = AttemptState::Sleeping(delay),
                            None => return SyncOutcome::failure(id, err.to_string()),
                        },
                    }
                }
            }
        }
    }

    async fn dispatch(&self, op: &QueuedOperation) -> SyncResult<()> {
        let call = self
            .executor
            .execute(&op.action, &op.payload, op.resource_id.as_deref());
        match self.config.request_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or(Err(SyncError::Timeout)),
            None => call.await,
        }
    }

    fn settle_success(&self, id: &str) -> SyncOutcome {
        self.take(id);
        self.stats.write().operations_synced += 1;
        info!(operation_id = %id, "operation synced");
        self.emit(SyncEvent::OperationSynced {
            operation_id: id.to_string(),
        });
        SyncOutcome::success(id)
    }

    fn settle_conflict(
        &self,
        op: &QueuedOperation,
        reason: ConflictReason,
        remote_data: Option<Value>,
    ) -> SyncOutcome {
        self.take(&op.id);
        let conflict = SyncConflict::new(op.id.clone(), reason, unix_millis())
            .with_local_data(Value::Object(op.payload.clone()))
            .with_remote_data(remote_data);
        self.conflicts.record(conflict.clone());
        self.stats.write().conflicts_recorded += 1;

        warn!(operation_id = %op.id, reason = %reason, "conflict recorded");
        self.emit(SyncEvent::ConflictRecorded(conflict.clone()));
        SyncOutcome::conflict(conflict)
    }

    /// Records a failed attempt. Returns the backoff delay if the operation
    /// should be dispatched again.
    fn settle_failure(&self, id: &str, err: &SyncError) -> Option<Duration> {
        let retry = &self.config.retry;
        let message = err.to_string();

        let updated = {
            let mut queue = self.queue.lock();
            let op = queue.iter_mut().find(|op| op.id == id)?;
            if err.is_retryable() {
                op.record_failure(message.clone());
            } else {
                op.record_permanent_failure(message.clone());
            }
            op.clone()
        };

        if err.is_retryable() && retry.should_retry(updated.attempts, updated.max_attempts) {
            let delay = retry.next_delay(updated.attempts);
            {
                let mut stats = self.stats.write();
                stats.retries += 1;
                stats.last_error = Some(message.clone());
            }
            warn!(
                operation_id = %id,
                attempts = updated.attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %message,
                "attempt failed, retrying"
            );
            self.emit(SyncEvent::OperationRetrying {
                operation_id: id.to_string(),
                attempts: updated.attempts,
                delay,
                error: message,
            });
            return Some(delay);
        }

        self.settle_exhausted(updated, message);
        None
    }

    fn settle_exhausted(&self, op: QueuedOperation, message: String) {
        let disposition = match self.config.exhaustion {
            ExhaustionPolicy::Keep => ExhaustedDisposition::Kept,
            ExhaustionPolicy::DeadLetter => {
                self.take(&op.id);
                self.dead_letters
                    .park(DeadLetter::new(op.clone(), message.clone(), unix_millis()));
                ExhaustedDisposition::DeadLettered
            }
            ExhaustionPolicy::Drop => {
                self.take(&op.id);
                ExhaustedDisposition::Dropped
            }
        };

        {
            let mut stats = self.stats.write();
            stats.operations_failed += 1;
            stats.last_error = Some(message.clone());
        }
        warn!(
            operation_id = %op.id,
            attempts = op.attempts,
            disposition = ?disposition,
            error = %message,
            "operation exhausted its retry budget"
        );
        self.emit(SyncEvent::OperationExhausted {
            operation_id: op.id,
            error: message,
            disposition,
        });
    }
}

/// Marks a pass as running until dropped.
struct PassGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> PassGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
