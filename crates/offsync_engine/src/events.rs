//! Engine events.
//!
//! Callers never get a synchronous result from `queue_operation`; they poll
//! [`crate::SyncEngine::status`] or subscribe to these events.

use offsync_protocol::SyncConflict;
use std::time::Duration;

/// A notable state change inside the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// An operation was appended to the queue.
    OperationQueued {
        /// Operation ID.
        operation_id: String,
    },
    /// The backend accepted an operation; it left the queue.
    OperationSynced {
        /// Operation ID.
        operation_id: String,
    },
    /// An attempt failed and another one is scheduled.
    OperationRetrying {
        /// Operation ID.
        operation_id: String,
        /// Failed attempts so far.
        attempts: u32,
        /// Backoff before the next attempt.
        delay: Duration,
        /// Failure reason.
        error: String,
    },
    /// An operation spent its retry budget.
    OperationExhausted {
        /// Operation ID.
        operation_id: String,
        /// Final failure reason.
        error: String,
        /// What the exhaustion policy did with it.
        disposition: ExhaustedDisposition,
    },
    /// A conflict was recorded and the operation left the queue.
    ConflictRecorded(SyncConflict),
    /// Connectivity changed.
    ConnectivityChanged {
        /// New state.
        online: bool,
    },
    /// A sync pass finished.
    PassCompleted {
        /// Operations dispatched.
        attempted: usize,
        /// Operations accepted.
        succeeded: usize,
        /// Whether the pass stopped early because the network went away.
        aborted_offline: bool,
    },
}

/// Where an exhausted operation ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustedDisposition {
    /// Still in the queue, skipped by future passes.
    Kept,
    /// Moved to the dead-letter list.
    DeadLettered,
    /// Removed.
    Dropped,
}
