//! Wall-clock helpers.

use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current time in unix milliseconds.
pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

/// Hands out strictly increasing enqueue timestamps.
///
/// Two operations enqueued in the same millisecond would otherwise share an
/// ID and an ordering key.
#[derive(Debug, Default)]
pub(crate) struct EnqueueClock {
    last: u64,
}

impl EnqueueClock {
    /// Ensures future timestamps are greater than `seen`.
    pub(crate) fn observe(&mut self, seen: u64) {
        self.last = self.last.max(seen);
    }

    /// Returns a timestamp greater than every previous one.
    pub(crate) fn next(&mut self, now: u64) -> u64 {
        let next = now.max(self.last.saturating_add(1));
        self.last = next;
        next
    }
}
