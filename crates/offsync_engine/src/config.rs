//! Configuration for the sync engine.

use offsync_protocol::DEFAULT_MAX_ATTEMPTS;
use std::time::Duration;

/// Default storage key of the operation queue.
pub const DEFAULT_QUEUE_KEY: &str = "offline_queue";

/// Default storage key of the conflict ledger.
pub const DEFAULT_CONFLICTS_KEY: &str = "sync_conflicts";

/// Default storage key of the dead-letter list.
pub const DEFAULT_DEAD_LETTER_KEY: &str = "sync_dead_letters";

/// What happens to an operation once its retry budget is spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExhaustionPolicy {
    /// Leave it in the queue with its last error; passes skip it.
    #[default]
    Keep,
    /// Move it to the persisted dead-letter list.
    DeadLetter,
    /// Remove it; only the emitted event records it.
    Drop,
}

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Operations dispatched concurrently per batch.
    pub batch_size: usize,
    /// Retry configuration.
    pub retry: RetryPolicy,
    /// Exhausted operation handling.
    pub exhaustion: ExhaustionPolicy,
    /// Storage key of the operation queue.
    pub queue_key: String,
    /// Storage key of the conflict ledger.
    pub conflicts_key: String,
    /// Storage key of the dead-letter list.
    pub dead_letter_key: String,
    /// Per-call executor timeout. `None` leaves timeouts to the executor.
    pub request_timeout: Option<Duration>,
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
}

impl SyncConfig {
    /// Creates a new sync configuration with default values.
    pub fn new() -> Self {
        Self {
            batch_size: 10,
            retry: RetryPolicy::default(),
            exhaustion: ExhaustionPolicy::default(),
            queue_key: DEFAULT_QUEUE_KEY.to_string(),
            conflicts_key: DEFAULT_CONFLICTS_KEY.to_string(),
            dead_letter_key: DEFAULT_DEAD_LETTER_KEY.to_string(),
            request_timeout: None,
            event_capacity: 256,
        }
    }

    /// Sets the batch size. Zero is treated as one.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the exhaustion policy.
    pub fn with_exhaustion(mut self, policy: ExhaustionPolicy) -> Self {
        self.exhaustion = policy;
        self
    }

    /// Sets the storage keys.
    pub fn with_keys(
        mut self,
        queue_key: impl Into<String>,
        conflicts_key: impl Into<String>,
        dead_letter_key: impl Into<String>,
    ) -> Self {
        self.queue_key = queue_key.into();
        self.conflicts_key = conflicts_key.into();
        self.dead_letter_key = dead_letter_key.into();
        self
    }

    /// Sets the per-call executor timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the event channel capacity. Zero is treated as one.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Exponential backoff retry policy.
///
/// The policy is stateless: every decision is a pure function of an
/// operation's attempt count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempt ceiling for operations that do not set their own.
    pub max_attempts: u32,
    /// Delay after the first failure.
    pub initial_delay: Duration,
    /// Upper bound for any delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy with the default delays.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }

    /// Creates a policy with a single attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Sets the default attempt ceiling.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Returns true if an operation with `attempts` failures may run again.
    pub fn should_retry(&self, attempts: u32, max_attempts: u32) -> bool {
        attempts < max_attempts
    }

    /// Calculates the delay after the `attempts`-th failure.
    ///
    /// `min(initial_delay * 2^(attempts - 1), max_delay)`; zero attempts
    /// means no delay.
    pub fn next_delay(&self, attempts: u32) -> Duration {
        if attempts == 0 {
            return Duration::ZERO;
        }

        2u32.checked_pow(attempts - 1)
            .and_then(|factor| self.initial_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}
