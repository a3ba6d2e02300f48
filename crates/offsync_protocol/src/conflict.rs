//! Conflict records.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Why the remote side rejected an operation as conflicting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictReason {
    /// The remote version differs from the one the change was based on.
    VersionMismatch,
    /// The target entity no longer exists remotely.
    DeletedRemotely,
    /// The target entity was changed remotely since it was read.
    ModifiedRemotely,
}

impl ConflictReason {
    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictReason::VersionMismatch => "version_mismatch",
            ConflictReason::DeletedRemotely => "deleted_remotely",
            ConflictReason::ModifiedRemotely => "modified_remotely",
        }
    }
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolution recorded for a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    /// Keep the local version.
    KeepLocal,
    /// Accept the remote version.
    UseRemote,
    /// Merge both (performed by whoever records the resolution).
    Merge,
}

impl ConflictResolution {
    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictResolution::KeepLocal => "keep_local",
            ConflictResolution::UseRemote => "use_remote",
            ConflictResolution::Merge => "merge",
        }
    }
}

impl fmt::Display for ConflictResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictResolution {
    type Err = ProtocolError;

    /// Accepts both the wire name and the kebab-case spelling.
    fn from_str(s: &str) -> ProtocolResult<Self> {
        match s {
            "keep_local" | "keep-local" => Ok(ConflictResolution::KeepLocal),
            "use_remote" | "use-remote" => Ok(ConflictResolution::UseRemote),
            "merge" => Ok(ConflictResolution::Merge),
            other => Err(ProtocolError::invalid_field(
                "resolution",
                format!("unknown resolution {other:?}"),
            )),
        }
    }
}

/// A terminal non-success outcome that needs external resolution.
///
/// `operation_id` is a weak reference: the operation has normally been removed
/// from the queue by the time the conflict is inspected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConflict {
    /// The conflicting operation.
    pub operation_id: String,
    /// Kind of divergence.
    pub reason: ConflictReason,
    /// Local snapshot (normally the operation payload).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_data: Option<Value>,
    /// Remote snapshot, if the backend returned one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_data: Option<Value>,
    /// Detection time in unix milliseconds.
    #[serde(default)]
    pub detected_at: u64,
    /// Resolution, absent while unresolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ConflictResolution>,
}

impl SyncConflict {
    /// Creates a new unresolved conflict.
    pub fn new(operation_id: impl Into<String>, reason: ConflictReason, detected_at: u64) -> Self {
        Self {
            operation_id: operation_id.into(),
            reason,
            local_data: None,
            remote_data: None,
            detected_at,
            resolution: None,
        }
    }

    /// Sets the local snapshot.
    pub fn with_local_data(mut self, data: Value) -> Self {
        self.local_data = Some(data);
        self
    }

    /// Sets the remote snapshot.
    pub fn with_remote_data(mut self, data: Option<Value>) -> Self {
        self.remote_data = data;
        self
    }

    /// Records a resolution.
    pub fn resolve(&mut self, resolution: ConflictResolution) {
        self.resolution = Some(resolution);
    }

    /// Returns true if a resolution has been recorded.
    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn conflict_starts_unresolved() {
        let conflict = SyncConflict::new("goal_g1_1", ConflictReason::VersionMismatch, 10);
        assert!(!conflict.is_resolved());
    }

    #[test]
    fn conflict_resolve() {
        let mut conflict = SyncConflict::new("goal_g1_1", ConflictReason::DeletedRemotely, 10);
        conflict.resolve(ConflictResolution::UseRemote);
        assert!(conflict.is_resolved());
        assert_eq!(conflict.resolution, Some(ConflictResolution::UseRemote));
    }

    #[test]
    fn resolution_parse() {
        assert_eq!(
            "keep-local".parse::<ConflictResolution>().unwrap(),
            ConflictResolution::KeepLocal
        );
        assert_eq!(
            "use_remote".parse::<ConflictResolution>().unwrap(),
            ConflictResolution::UseRemote
        );
        assert!("overwrite".parse::<ConflictResolution>().is_err());
    }

    #[test]
    fn wire_format() {
        let conflict = SyncConflict::new("fav_U1_3", ConflictReason::ModifiedRemotely, 3)
            .with_local_data(json!({"itemId": "U1"}))
            .with_remote_data(Some(json!({"itemId": "U1", "rev": 4})));

        let value = serde_json::to_value(&conflict).unwrap();
        assert_eq!(value["operationId"], json!("fav_U1_3"));
        assert_eq!(value["reason"], json!("modified_remotely"));
        assert_eq!(value["remoteData"]["rev"], json!(4));
        assert!(value.get("resolution").is_none());

        let decoded: SyncConflict = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, conflict);
    }
}
