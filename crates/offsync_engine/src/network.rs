//! Network state monitoring.
//!
//! The engine consumes connectivity as a single boolean plus change
//! notifications. How the host detects reachability is outside the engine.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

/// Callback invoked with the new online state on every transition.
pub type NetworkListener = Box<dyn Fn(bool) + Send + Sync>;

/// A source of connectivity information.
///
/// Implementations must only notify listeners on actual transitions and must
/// not hold internal locks while calling them.
pub trait NetworkMonitor: Send + Sync {
    /// Returns the current connectivity.
    fn is_online(&self) -> bool;

    /// Registers a listener until the returned subscription is released.
    fn subscribe(&self, listener: NetworkListener) -> Subscription;
}

/// A disposable listener registration.
///
/// The listener is removed by [`Subscription::unsubscribe`] or when the
/// subscription is dropped.
#[must_use = "dropping a subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Creates a subscription that runs `cancel` when released.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Creates a subscription with nothing to release.
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    /// Removes the listener.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

type SharedListener = Arc<dyn Fn(bool) + Send + Sync>;

struct MonitorState {
    online: AtomicBool,
    listeners: RwLock<Vec<(u64, SharedListener)>>,
    next_id: AtomicU64,
}

/// A monitor whose state is pushed in by the host.
///
/// Platform glue (or a test) calls [`ManualNetworkMonitor::set_online`] when
/// reachability changes. Clones share state.
#[derive(Clone)]
pub struct ManualNetworkMonitor {
    state: Arc<MonitorState>,
}

impl ManualNetworkMonitor {
    /// Creates a monitor with the given initial state.
    pub fn new(online: bool) -> Self {
        Self {
            state: Arc::new(MonitorState {
                online: AtomicBool::new(online),
                listeners: RwLock::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Creates a monitor that starts online.
    pub fn online() -> Self {
        Self::new(true)
    }

    /// Creates a monitor that starts offline.
    pub fn offline() -> Self {
        Self::new(false)
    }

    /// Updates connectivity and notifies listeners if it changed.
    ///
    /// Returns true if this call was a transition.
    pub fn set_online(&self, online: bool) -> bool {
        let previous = self.state.online.swap(online, Ordering::SeqCst);
        if previous == online {
            return false;
        }

        debug!(online, "network state changed");
        let listeners: Vec<SharedListener> = self
            .state
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(online);
        }
        true
    }

    /// Returns the number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.state.listeners.read().len()
    }
}

impl Default for ManualNetworkMonitor {
    fn default() -> Self {
        Self::online()
    }
}

impl NetworkMonitor for ManualNetworkMonitor {
    fn is_online(&self) -> bool {
        self.state.online.load(Ordering::SeqCst)
    }

    fn subscribe(&self, listener: NetworkListener) -> Subscription {
        let id = self.state.next_id.fetch_add(1, Ordering::Relaxed);
        self.state
            .listeners
            .write()
            .push((id, Arc::from(listener)));

        let state: Weak<MonitorState> = Arc::downgrade(&self.state);
        Subscription::new(move || {
            if let Some(state) = state.upgrade() {
                state.listeners.write().retain(|(other, _)| *other != id);
            }
        })
    }
}

impl<N: NetworkMonitor + ?Sized> NetworkMonitor for Arc<N> {
    fn is_online(&self) -> bool {
        (**self).is_online()
    }

    fn subscribe(&self, listener: NetworkListener) -> Subscription {
        (**self).subscribe(listener)
    }
}
