//! # offsync Protocol
//!
//! Data model and JSON codec for the offsync offline queue.
//!
//! This crate provides:
//! - `QueuedOperation` for durable pending mutations
//! - `SyncConflict` for conflicts awaiting resolution
//! - `DeadLetter` for operations that exhausted their retries
//! - `SyncOutcome` for the transient result of one attempt
//! - The default remote action namespace
//! - JSON encoding/decoding of persisted collections
//!
//! This is a pure data crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod actions;
mod codec;
mod conflict;
mod dead_letter;
mod error;
mod operation;
mod outcome;

pub use codec::{decode_list, encode_list};
pub use conflict::{ConflictReason, ConflictResolution, SyncConflict};
pub use dead_letter::DeadLetter;
pub use error::{ProtocolError, ProtocolResult};
pub use operation::{
    operation_id, NewOperation, OperationType, Payload, Priority, QueuedOperation,
    DEFAULT_MAX_ATTEMPTS,
};
pub use outcome::SyncOutcome;
