//! Transient attempt outcomes.

use crate::conflict::SyncConflict;

/// The result of one attempt at an operation.
///
/// Outcomes are never persisted. They are returned to whoever drove the
/// attempt and shared with every caller that joined it.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome {
    /// Whether the executor accepted the operation.
    pub success: bool,
    /// The attempted operation.
    pub operation_id: String,
    /// Final error, for failures.
    pub error: Option<String>,
    /// Recorded conflict, when the executor reported one.
    pub conflict: Option<SyncConflict>,
}

impl SyncOutcome {
    /// Creates a success outcome.
    pub fn success(operation_id: impl Into<String>) -> Self {
        Self {
            success: true,
            operation_id: operation_id.into(),
            error: None,
            conflict: None,
        }
    }

    /// Creates a failure outcome.
    pub fn failure(operation_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            operation_id: operation_id.into(),
            error: Some(error.into()),
            conflict: None,
        }
    }

    /// Creates a conflict outcome.
    pub fn conflict(conflict: SyncConflict) -> Self {
        Self {
            success: false,
            operation_id: conflict.operation_id.clone(),
            error: Some(format!("conflict: {}", conflict.reason)),
            conflict: Some(conflict),
        }
    }

    /// Returns true if this outcome carries a conflict.
    pub fn is_conflict(&self) -> bool {
        self.conflict.is_some()
    }
}
