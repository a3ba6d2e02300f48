//! In-flight attempt registry.
//!
//! Maps an operation ID to the shared future of the attempt currently running
//! for it. A second caller asking for the same ID joins that future instead of
//! starting another attempt, so no operation is ever dispatched twice at the
//! same time.

use futures_util::future::{BoxFuture, FutureExt, Shared};
use offsync_protocol::SyncOutcome;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

type SharedOutcome = Shared<BoxFuture<'static, SyncOutcome>>;
type Entries = Arc<Mutex<HashMap<String, (u64, SharedOutcome)>>>;

/// Whether a caller started the attempt or joined a running one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Participation {
    /// This caller started the attempt.
    Leader,
    /// This caller joined an attempt already in flight.
    Joined,
}

/// Registry of attempts currently in flight.
///
/// The check-and-insert happens under one lock, so two callers can never
/// both become leader for the same ID. Each attempt runs as its own task and
/// removes its entry when it finishes, so dropping the caller that started it
/// neither cancels the attempt nor frees the ID early.
#[derive(Default)]
pub struct InFlightRegistry {
    entries: Entries,
    generations: AtomicU64,
}

impl InFlightRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the attempt built by `start`, or joins the one already running.
    ///
    /// `start` is only called when no attempt for `id` is in flight. Must be
    /// polled from within a Tokio runtime.
    pub async fn run_or_join<F>(&self, id: &str, start: F) -> (SyncOutcome, Participation)
    where
        F: FnOnce() -> BoxFuture<'static, SyncOutcome>,
    {
        let (attempt, participation) = self.claim(id, start);
        if participation == Participation::Joined {
            debug!(operation_id = id, "joining in-flight attempt");
        }
        (attempt.await, participation)
    }

    /// Returns true if an attempt for `id` is running.
    pub fn is_in_flight(&self, id: &str) -> bool {
        self.entries.lock().contains_key(id)
    }

    /// Returns the number of attempts in flight.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn claim<F>(&self, id: &str, start: F) -> (SharedOutcome, Participation)
    where
        F: FnOnce() -> BoxFuture<'static, SyncOutcome>,
    {
        // The task's release takes this same lock, so it cannot run before
        // the entry below is inserted.
        let mut entries = self.entries.lock();
        if let Some((_, running)) = entries.get(id) {
            return (running.clone(), Participation::Joined);
        }

        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let release = Release {
            entries: Arc::clone(&self.entries),
            id: id.to_string(),
            generation,
        };
        let attempt = start();
        let task = tokio::spawn(async move {
            let _release = release;
            attempt.await
        });

        let operation_id = id.to_string();
        let attempt = task
            .map(move |joined| {
                joined.unwrap_or_else(|e| {
                    SyncOutcome::failure(operation_id, format!("attempt aborted: {e}"))
                })
            })
            .boxed()
            .shared();
        entries.insert(id.to_string(), (generation, attempt.clone()));
        (attempt, Participation::Leader)
    }
}

/// Removes an attempt's entry when the attempt task ends, panics included.
struct Release {
    entries: Entries,
    id: String,
    generation: u64,
}

impl Drop for Release {
    fn drop(&mut self) {
        let mut entries = self.entries.lock();
        // A newer claim for the same ID must survive a stale release.
        if entries
            .get(&self.id)
            .is_some_and(|(g, _)| *g == self.generation)
        {
            entries.remove(&self.id);
        }
    }
}
