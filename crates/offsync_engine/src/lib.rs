//! # offsync Engine
//!
//! Offline operation queue and sync engine.
//!
//! This crate provides:
//! - A durable queue of pending mutations
//! - Sync passes with priority ordering and concurrent batches
//! - Retry with exponential backoff and a configurable exhaustion policy
//! - In-flight deduplication of attempts
//! - A conflict ledger and a dead-letter list
//! - Network state glue
//! - A remote executor abstraction with an action router
//!
//! ## Architecture
//!
//! Callers enqueue mutations and return immediately. The engine persists the
//! queue and pushes it to the backend whenever connectivity allows:
//! 1. Sort dispatchable operations by `(priority, enqueued_at)`
//! 2. Dispatch them in concurrent batches, stopping if the network goes away
//! 3. Settle each outcome (remove, retry, record conflict, or exhaust)
//! 4. Persist queue, conflicts, and dead letters once
//!
//! ## Key Invariants
//!
//! - At most one pass runs at a time
//! - An operation has at most one attempt in flight
//! - FIFO within a priority class
//! - An exhausted operation is never dispatched again
//! - A conflict is recorded exactly once and never retried

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clock;
mod config;
mod engine;
mod error;
mod events;
mod executor;
mod inflight;
mod ledger;
mod network;
mod status;
mod store;

pub use config::{
    ExhaustionPolicy, RetryPolicy, SyncConfig, DEFAULT_CONFLICTS_KEY, DEFAULT_DEAD_LETTER_KEY,
    DEFAULT_QUEUE_KEY,
};
pub use engine::SyncEngine;
pub use error::{SyncError, SyncResult};
pub use events::{ExhaustedDisposition, SyncEvent};
pub use executor::{ActionCall, ActionHandler, ActionRouter, MockExecutor, RemoteExecutor};
pub use inflight::{InFlightRegistry, Participation};
pub use ledger::{ConflictLedger, DeadLetterList};
pub use network::{ManualNetworkMonitor, NetworkListener, NetworkMonitor, Subscription};
pub use status::{OperationSummary, QueueStatus, SyncPassReport, SyncStats};
pub use store::{JsonList, QueueStore};
