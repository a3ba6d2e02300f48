//! # offsync Testkit
//!
//! Test utilities for offsync.
//!
//! This crate provides:
//! - Operation fixtures and engine harnesses
//! - Property-based test generators using proptest
//! - A storage wrapper with injectable failures
//! - Async polling helpers
//!
//! End-to-end scenarios live in this crate's `tests/` directory.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use offsync_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn syncs_after_reconnect() {
//!     let h = EngineHarness::in_memory(fast_retry_config(), false);
//!     h.engine.initialize().await;
//!     h.engine.queue_operation(favorite_op("U1")).unwrap();
//!     h.network.set_online(true);
//!     assert!(wait_until(DEFAULT_WAIT, || h.engine.status().pending_count == 0).await);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod flaky;
pub mod generators;
pub mod wait;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::flaky::*;
    pub use crate::generators::*;
    pub use crate::wait::*;
}

pub use fixtures::*;
pub use flaky::*;
pub use generators::*;
pub use wait::*;
