//! Read-only snapshots of engine state.

use offsync_protocol::{Priority, QueuedOperation, SyncOutcome};
use serde::Serialize;
use std::time::{Duration, Instant};

/// Summary of one queued operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationSummary {
    /// Operation ID.
    pub id: String,
    /// Logical entity class.
    pub resource: String,
    /// Remote operation name.
    pub action: String,
    /// Failed attempts so far.
    pub attempts: u32,
    /// Attempt ceiling.
    pub max_attempts: u32,
    /// Dispatch priority.
    pub priority: Priority,
    /// Last failure reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Whether the operation will never be dispatched again.
    pub exhausted: bool,
}

impl From<&QueuedOperation> for OperationSummary {
    fn from(op: &QueuedOperation) -> Self {
        Self {
            id: op.id.clone(),
            resource: op.resource.clone(),
            action: op.action.clone(),
            attempts: op.attempts,
            max_attempts: op.max_attempts,
            priority: op.priority,
            last_error: op.last_error.clone(),
            exhausted: op.is_exhausted(),
        }
    }
}

/// Snapshot returned by [`crate::SyncEngine::status`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    /// Operations in the queue, exhausted ones included.
    pub pending_count: usize,
    /// Current connectivity.
    pub is_online: bool,
    /// Whether a pass is running.
    pub is_syncing: bool,
    /// Queue contents in dispatch order.
    pub operations: Vec<OperationSummary>,
}

impl QueueStatus {
    /// Builds a status from a queue snapshot.
    pub fn from_queue(queue: &[QueuedOperation], is_online: bool, is_syncing: bool) -> Self {
        let mut ordered: Vec<&QueuedOperation> = queue.iter().collect();
        ordered.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        Self {
            pending_count: queue.len(),
            is_online,
            is_syncing,
            operations: ordered.into_iter().map(OperationSummary::from).collect(),
        }
    }

    /// Returns how many operations have spent their retry budget.
    pub fn exhausted_count(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| op.exhausted)
            .count()
    }
}

/// Statistics about sync passes.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Total number of passes completed.
    pub passes_completed: u64,
    /// Total number of operations accepted by the backend.
    pub operations_synced: u64,
    /// Total number of operations that ended in failure.
    pub operations_failed: u64,
    /// Total number of conflicts recorded.
    pub conflicts_recorded: u64,
    /// Total number of retries scheduled.
    pub retries: u64,
    /// Last pass completion time.
    pub last_pass_time: Option<Instant>,
    /// Last failure message.
    pub last_error: Option<String>,
}

/// Result of one sync pass.
#[derive(Debug, Clone)]
pub struct SyncPassReport {
    /// Per-operation outcomes, in dispatch order.
    pub outcomes: Vec<SyncOutcome>,
    /// Number of batches dispatched.
    pub batches: usize,
    /// Whether remaining batches were skipped because the network went away.
    pub aborted_offline: bool,
    /// Duration of the pass.
    pub duration: Duration,
}

impl SyncPassReport {
    /// Number of operations dispatched.
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    /// Number of operations accepted.
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    /// Number of conflicts detected.
    pub fn conflicts(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_conflict()).count()
    }

    /// Number of failures that were not conflicts.
    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| !o.success && !o.is_conflict())
            .count()
    }

    /// Folds a coalesced follow-up pass into this report.
    pub(crate) fn absorb(&mut self, follow_up: SyncPassReport) {
        self.outcomes.extend(follow_up.outcomes);
        self.batches += follow_up.batches;
        self.aborted_offline = follow_up.aborted_offline;
        self.duration += follow_up.duration;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use offsync_protocol::{ConflictReason, NewOperation, SyncConflict};

    #[test]
    fn status_lists_in_dispatch_order() {
        let queue = vec![
            NewOperation::update("goal", "updateGoal").into_queued(1, 5),
            NewOperation::create("favorite", "addFavorite")
                .with_priority(Priority::High)
                .into_queued(2, 5),
        ];

        let status = QueueStatus::from_queue(&queue, true, false);
        assert_eq!(status.pending_count, 2);
        assert_eq!(status.operations[0].action, "addFavorite");
        assert_eq!(status.operations[1].action, "updateGoal");
        assert_eq!(status.exhausted_count(), 0);
    }

    #[test]
    fn permanent_failure_counts_as_exhausted_after_one_attempt() {
        let mut rejected = NewOperation::delete("goal", "deleteGoal").into_queued(1, 5);
        rejected.record_permanent_failure("rejected by server: HTTP 400");

        let status = QueueStatus::from_queue(&[rejected], false, false);
        assert_eq!(status.operations[0].attempts, 1);
        assert!(status.operations[0].exhausted);
        assert_eq!(status.exhausted_count(), 1);
    }

    #[test]
    fn status_serializes_camel_case() {
        let status = QueueStatus::from_queue(&[], false, false);
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["pendingCount"], 0);
        assert_eq!(value["isOnline"], false);
        assert_eq!(value["isSyncing"], false);
    }

    #[test]
    fn report_counts() {
        let report = SyncPassReport {
            outcomes: vec![
                SyncOutcome::success("a"),
                SyncOutcome::failure("b", "HTTP 500"),
                SyncOutcome::conflict(SyncConflict::new("c", ConflictReason::DeletedRemotely, 1)),
            ],
            batches: 1,
            aborted_offline: false,
            duration: Duration::ZERO,
        };

        assert_eq!(report.attempted(), 3);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.conflicts(), 1);
    }
}
