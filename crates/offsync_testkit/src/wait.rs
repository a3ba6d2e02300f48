//! Async polling helpers.

use std::time::Duration;

/// Default timeout for [`wait_until`].
pub const DEFAULT_WAIT: Duration = Duration::from_secs(5);

/// Interval between checks.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Polls `condition` until it holds or `timeout` elapses.
///
/// Returns true if the condition held. Background passes run on the same
/// runtime, so the sleep between checks lets them make progress.
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn returns_once_condition_holds() {
        let counter = Arc::new(AtomicUsize::new(0));
        let bump = Arc::clone(&counter);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            bump.store(1, Ordering::SeqCst);
        });

        assert!(wait_until(DEFAULT_WAIT, || counter.load(Ordering::SeqCst) == 1).await);
    }

    #[tokio::test]
    async fn gives_up_after_timeout() {
        assert!(!wait_until(Duration::from_millis(20), || false).await);
    }
}
