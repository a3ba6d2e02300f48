//! Dead-lettered operations.

use crate::operation::QueuedOperation;
use serde::{Deserialize, Serialize};

/// An operation parked after exhausting its retry budget.
///
/// Dead letters are kept apart from the live queue so they never block or
/// slow down dispatch, but can still be inspected, requeued, or discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetter {
    /// The exhausted operation, with its final attempt count and error.
    pub operation: QueuedOperation,
    /// Final failure reason.
    pub reason: String,
    /// When the operation was parked, in unix milliseconds.
    pub dead_lettered_at: u64,
}

impl DeadLetter {
    /// Parks an operation.
    pub fn new(operation: QueuedOperation, reason: impl Into<String>, dead_lettered_at: u64) -> Self {
        Self {
            operation,
            reason: reason.into(),
            dead_lettered_at,
        }
    }

    /// Returns the parked operation's ID.
    pub fn operation_id(&self) -> &str {
        &self.operation.id
    }

    /// Returns the operation with its retry history cleared.
    pub fn into_requeued(self) -> QueuedOperation {
        let mut operation = self.operation;
        operation.reset_attempts();
        operation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NewOperation;

    #[test]
    fn requeue_keeps_identity_and_order() {
        let mut op = NewOperation::delete("goal", "deleteGoal")
            .with_resource_id("g9")
            .into_queued(77, 3);
        op.record_permanent_failure("HTTP 500");

        let letter = DeadLetter::new(op.clone(), "HTTP 500", 100);
        assert_eq!(letter.operation_id(), op.id);

        let requeued = letter.into_requeued();
        assert_eq!(requeued.id, op.id);
        assert_eq!(requeued.enqueued_at, 77);
        assert_eq!(requeued.attempts, 0);
        assert!(!requeued.is_exhausted());
        assert!(requeued.last_error.is_none());
    }
}
