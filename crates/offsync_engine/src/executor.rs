//! Remote executor abstraction.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use offsync_protocol::{actions, Payload};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Delivers queued operations to the backend.
///
/// This trait abstracts the concrete remote API. The engine calls it once
/// per attempt and classifies failures with [`SyncError::is_retryable`] and
/// [`SyncError::is_conflict`]. Timeouts, when the executor has them, should be
/// reported as [`SyncError::Timeout`].
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Executes `action` with its payload.
    async fn execute(
        &self,
        action: &str,
        payload: &Payload,
        resource_id: Option<&str>,
    ) -> SyncResult<()>;
}

#[async_trait]
impl<E: RemoteExecutor + ?Sized> RemoteExecutor for Arc<E> {
    async fn execute(
        &self,
        action: &str,
        payload: &Payload,
        resource_id: Option<&str>,
    ) -> SyncResult<()> {
        (**self).execute(action, payload, resource_id).await
    }
}

/// The arguments of one executor call, owned.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionCall {
    /// Remote operation name.
    pub action: String,
    /// Operation payload.
    pub payload: Payload,
    /// Target entity, if any.
    pub resource_id: Option<String>,
}

/// Handler registered for one action.
pub type ActionHandler = Arc<dyn Fn(ActionCall) -> BoxFuture<'static, SyncResult<()>> + Send + Sync>;

/// An executor that dispatches on the action name.
///
/// Unregistered actions fail with [`SyncError::UnknownAction`], which the
/// engine treats as permanent.
///
/// # Example
///
/// ```rust
/// use offsync_engine::ActionRouter;
/// use offsync_protocol::actions;
///
/// let router = ActionRouter::new()
///     .route(actions::ADD_FAVORITE, |_call| async { Ok(()) })
///     .route(actions::REMOVE_FAVORITE, |_call| async { Ok(()) });
/// assert!(router.handles("addFavorite"));
/// ```
#[derive(Clone, Default)]
pub struct ActionRouter {
    handlers: HashMap<String, ActionHandler>,
}

impl ActionRouter {
    /// Creates a router with no routes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the handler for `action`, replacing any previous one.
    pub fn route<F, Fut>(mut self, action: impl Into<String>, handler: F) -> Self
    where
        F: Fn(ActionCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = SyncResult<()>> + Send + 'static,
    {
        let handler: ActionHandler = Arc::new(move |call| handler(call).boxed());
        self.handlers.insert(action.into(), handler);
        self
    }

    /// Returns true if `action` has a handler.
    pub fn handles(&self, action: &str) -> bool {
        self.handlers.contains_key(action)
    }

    /// Returns the registered actions, sorted.
    pub fn actions(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the default actions that have no handler yet.
    pub fn missing_default_actions(&self) -> Vec<&'static str> {
        actions::DEFAULT_ACTIONS
            .iter()
            .copied()
            .filter(|action| !self.handles(action))
            .collect()
    }
}

#[async_trait]
impl RemoteExecutor for ActionRouter {
    async fn execute(
        &self,
        action: &str,
        payload: &Payload,
        resource_id: Option<&str>,
    ) -> SyncResult<()> {
        let handler = self
            .handlers
            .get(action)
            .cloned()
            .ok_or_else(|| SyncError::UnknownAction(action.to_string()))?;

        handler(ActionCall {
            action: action.to_string(),
            payload: payload.clone(),
            resource_id: resource_id.map(str::to_string),
        })
        .await
    }
}

/// A scripted executor for testing.
///
/// Records every call in order. Responses are taken from a per-action script
/// first, then from a per-action default, then `Ok(())`.
#[derive(Default)]
pub struct MockExecutor {
    calls: Mutex<Vec<ActionCall>>,
    scripted: Mutex<HashMap<String, VecDeque<SyncResult<()>>>>,
    defaults: Mutex<HashMap<String, SyncResult<()>>>,
    delay: Mutex<Option<Duration>>,
}

impl MockExecutor {
    /// Creates a mock executor that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a one-shot response for the next call to `action`.
    pub fn push_response(&self, action: impl Into<String>, response: SyncResult<()>) {
        self.scripted
            .lock()
            .entry(action.into())
            .or_default()
            .push_back(response);
    }

    /// Sets the response used for `action` once its script is empty.
    pub fn set_default_response(&self, action: impl Into<String>, response: SyncResult<()>) {
        self.defaults.lock().insert(action.into(), response);
    }

    /// Makes every call take `delay` before responding.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Returns all recorded calls, in call order.
    pub fn calls(&self) -> Vec<ActionCall> {
        self.calls.lock().clone()
    }

    /// Returns the number of recorded calls.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Returns the number of recorded calls to `action`.
    pub fn calls_for(&self, action: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.action == action)
            .count()
    }

    /// Returns the recorded resource IDs, in call order.
    pub fn resource_ids(&self) -> Vec<Option<String>> {
        self.calls
            .lock()
            .iter()
            .map(|call| call.resource_id.clone())
            .collect()
    }

    fn next_response(&self, action: &str) -> SyncResult<()> {
        if let Some(response) = self
            .scripted
            .lock()
            .get_mut(action)
            .and_then(VecDeque::pop_front)
        {
            return response;
        }
        self.defaults.lock().get(action).cloned().unwrap_or(Ok(()))
    }
}

#[async_trait]
impl RemoteExecutor for MockExecutor {
    async fn execute(
        &self,
        action: &str,
        payload: &Payload,
        resource_id: Option<&str>,
    ) -> SyncResult<()> {
        self.calls.lock().push(ActionCall {
            action: action.to_string(),
            payload: payload.clone(),
            resource_id: resource_id.map(str::to_string),
        });

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.next_response(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn payload() -> Payload {
        let mut payload = Payload::new();
        payload.insert("itemId".into(), json!("U1"));
        payload
    }

    #[tokio::test]
    async fn router_dispatches_by_action() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let router = ActionRouter::new().route(actions::ADD_FAVORITE, move |call| {
            let counter = Arc::clone(&counter);
            async move {
                assert_eq!(call.payload.get("itemId"), Some(&json!("U1")));
                assert_eq!(call.resource_id.as_deref(), Some("U1"));
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        router
            .execute(actions::ADD_FAVORITE, &payload(), Some("U1"))
            .await
            .unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn router_rejects_unknown_action() {
        let router = ActionRouter::new();
        let result = router.execute("launchRocket", &payload(), None).await;

        assert!(matches!(result, Err(SyncError::UnknownAction(ref a)) if a == "launchRocket"));
        assert!(!result.unwrap_err().is_retryable());
    }

    #[test]
    fn router_reports_missing_defaults() {
        let router = ActionRouter::new()
            .route(actions::ADD_FAVORITE, |_| async { Ok(()) })
            .route(actions::UPDATE_GOAL, |_| async { Ok(()) });

        assert_eq!(router.actions(), vec!["addFavorite", "updateGoal"]);
        assert_eq!(
            router.missing_default_actions(),
            vec!["removeFavorite", "saveCalculation", "deleteGoal"]
        );
    }

    #[tokio::test]
    async fn mock_uses_script_then_default() {
        let mock = MockExecutor::new();
        mock.push_response("updateGoal", Err(SyncError::Timeout));
        mock.set_default_response("updateGoal", Err(SyncError::ServerError("down".into())));

        let first = mock.execute("updateGoal", &Payload::new(), Some("g1")).await;
        let second = mock.execute("updateGoal", &Payload::new(), Some("g1")).await;
        let other = mock.execute("addFavorite", &Payload::new(), None).await;

        assert!(matches!(first, Err(SyncError::Timeout)));
        assert!(matches!(second, Err(SyncError::ServerError(_))));
        assert!(other.is_ok());
        assert_eq!(mock.call_count(), 3);
        assert_eq!(mock.calls_for("updateGoal"), 2);
        assert_eq!(
            mock.resource_ids(),
            vec![Some("g1".to_string()), Some("g1".to_string()), None]
        );
    }

    #[tokio::test]
    async fn arc_executor_delegates() {
        let mock = Arc::new(MockExecutor::new());
        let shared: Arc<MockExecutor> = Arc::clone(&mock);

        shared.execute("addFavorite", &Payload::new(), None).await.unwrap();
        assert_eq!(mock.call_count(), 1);
    }
}
