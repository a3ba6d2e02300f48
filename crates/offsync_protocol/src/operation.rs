//! Queued operations.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Opaque key/value payload passed verbatim to the remote executor.
pub type Payload = serde_json::Map<String, Value>;

/// Attempt ceiling used when an operation does not specify one.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

/// Semantic classification of an operation.
///
/// The classification is informational. Dispatch is driven by
/// [`QueuedOperation::action`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    /// Creates a remote entity.
    Create,
    /// Updates a remote entity.
    Update,
    /// Deletes a remote entity.
    Delete,
    /// Anything that is not plain CRUD.
    Custom,
}

impl OperationType {
    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Create => "create",
            OperationType::Update => "update",
            OperationType::Delete => "delete",
            OperationType::Custom => "custom",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dispatch priority.
///
/// The derived ordering is `High < Normal < Low`, so sorting ascending puts
/// the most urgent operations first.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Dispatched before everything else.
    High,
    /// The default.
    #[default]
    Normal,
    /// Dispatched last.
    Low,
}

impl Priority {
    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ProtocolError;

    fn from_str(s: &str) -> ProtocolResult<Self> {
        match s {
            "high" => Ok(Priority::High),
            "normal" => Ok(Priority::Normal),
            "low" => Ok(Priority::Low),
            other => Err(ProtocolError::invalid_field(
                "priority",
                format!("unknown priority {other:?}"),
            )),
        }
    }
}

/// Builds the identifier of an operation.
///
/// The format is `{resource}_{resource_id}_{enqueued_at}`. A missing resource
/// id leaves its segment empty (`goal__7`). [`NewOperation::validate`] rejects
/// empty resource ids, so that form can only mean "absent".
pub fn operation_id(resource: &str, resource_id: Option<&str>, enqueued_at: u64) -> String {
    format!("{}_{}_{}", resource, resource_id.unwrap_or_default(), enqueued_at)
}

/// A durable unit of pending work.
///
/// # Fields
///
/// - `id`: unique key used for dedup and removal
/// - `enqueued_at`: unix milliseconds, set once, the FIFO tiebreaker
/// - `attempts` / `max_attempts`: the retry budget
/// - `priority`: dispatch class
///
/// An operation with `attempts >= max_attempts`, or one marked `permanent`,
/// is never dispatched again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedOperation {
    /// Unique operation ID.
    pub id: String,
    /// Semantic classification.
    #[serde(rename = "type")]
    pub op_type: OperationType,
    /// Logical entity class, e.g. `favorite`.
    pub resource: String,
    /// Specific entity instance, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    /// Remote operation name; the executor's dispatch key.
    pub action: String,
    /// Opaque arguments for the executor.
    #[serde(default)]
    pub payload: Payload,
    /// Enqueue time in unix milliseconds.
    pub enqueued_at: u64,
    /// Failed attempts so far.
    #[serde(default)]
    pub attempts: u32,
    /// Attempt ceiling.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Last failure reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Dispatch priority.
    #[serde(default)]
    pub priority: Priority,
    /// Set by a failure that must not be retried.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub permanent: bool,
}

impl QueuedOperation {
    /// Returns true if the operation must not be dispatched again.
    pub fn is_exhausted(&self) -> bool {
        self.permanent || self.attempts >= self.max_attempts
    }

    /// Returns how many attempts are left.
    pub fn remaining_attempts(&self) -> u32 {
        if self.permanent {
            return 0;
        }
        self.max_attempts.saturating_sub(self.attempts)
    }

    /// Returns the total dispatch ordering key.
    pub fn sort_key(&self) -> (Priority, u64, &str) {
        (self.priority, self.enqueued_at, self.id.as_str())
    }

    /// Records one failed attempt.
    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.attempts = self.attempts.saturating_add(1);
        self.last_error = Some(error.into());
    }

    /// Records a failed attempt that must not be retried.
    ///
    /// `attempts` still counts only real calls; the `permanent` mark is what
    /// keeps the operation from being dispatched again.
    pub fn record_permanent_failure(&mut self, error: impl Into<String>) {
        self.record_failure(error);
        self.permanent = true;
    }

    /// Clears the retry history so the operation becomes dispatchable.
    pub fn reset_attempts(&mut self) {
        self.attempts = 0;
        self.last_error = None;
        self.permanent = false;
    }
}

/// A mutation as submitted by a caller, before it is queued.
///
/// The queue assigns `id`, `enqueued_at`, and `attempts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOperation {
    /// Semantic classification.
    #[serde(rename = "type")]
    pub op_type: OperationType,
    /// Logical entity class.
    pub resource: String,
    /// Specific entity instance, if any.
    #[serde(default)]
    pub resource_id: Option<String>,
    /// Remote operation name.
    pub action: String,
    /// Opaque arguments for the executor.
    #[serde(default)]
    pub payload: Payload,
    /// Dispatch priority.
    #[serde(default)]
    pub priority: Priority,
    /// Per-operation attempt ceiling; the queue default applies when absent.
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl NewOperation {
    /// Creates a new operation with an empty payload and normal priority.
    pub fn new(op_type: OperationType, resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            op_type,
            resource: resource.into(),
            resource_id: None,
            action: action.into(),
            payload: Payload::new(),
            priority: Priority::Normal,
            max_attempts: None,
        }
    }

    /// Creates a `create` operation.
    pub fn create(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self::new(OperationType::Create, resource, action)
    }

    /// Creates an `update` operation.
    pub fn update(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self::new(OperationType::Update, resource, action)
    }

    /// Creates a `delete` operation.
    pub fn delete(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self::new(OperationType::Delete, resource, action)
    }

    /// Creates a `custom` operation.
    pub fn custom(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self::new(OperationType::Custom, resource, action)
    }

    /// Sets the resource ID.
    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    /// Replaces the payload.
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Adds one payload field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Sets the priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the attempt ceiling.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Checks that the operation can be queued.
    pub fn validate(&self) -> ProtocolResult<()> {
        if self.resource.trim().is_empty() {
            return Err(ProtocolError::invalid_field("resource", "must not be empty"));
        }
        if self.action.trim().is_empty() {
            return Err(ProtocolError::invalid_field("action", "must not be empty"));
        }
        if self
            .resource_id
            .as_deref()
            .is_some_and(|id| id.trim().is_empty())
        {
            return Err(ProtocolError::invalid_field("resourceId", "must not be empty"));
        }
        if self.max_attempts == Some(0) {
            return Err(ProtocolError::invalid_field(
                "maxAttempts",
                "must be at least 1",
            ));
        }
        Ok(())
    }

    /// Converts into a queued operation enqueued at `enqueued_at`.
    pub fn into_queued(self, enqueued_at: u64, default_max_attempts: u32) -> QueuedOperation {
        QueuedOperation {
            id: operation_id(&self.resource, self.resource_id.as_deref(), enqueued_at),
            op_type: self.op_type,
            resource: self.resource,
            resource_id: self.resource_id,
            action: self.action,
            payload: self.payload,
            enqueued_at,
            attempts: 0,
            max_attempts: self.max_attempts.unwrap_or(default_max_attempts),
            last_error: None,
            priority: self.priority,
            permanent: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn favorite() -> NewOperation {
        NewOperation::create("favorite", "addFavorite")
            .with_resource_id("U1")
            .with_field("type", "university")
            .with_field("itemId", "U1")
            .with_priority(Priority::High)
    }

    #[test]
    fn priority_orders_high_first() {
        let mut priorities = vec![Priority::Low, Priority::High, Priority::Normal];
        priorities.sort();
        assert_eq!(priorities, vec![Priority::High, Priority::Normal, Priority::Low]);
    }

    #[test]
    fn priority_parse() {
        assert_eq!("high".parse::<Priority>().unwrap(), Priority::High);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn id_format() {
        assert_eq!(operation_id("favorite", Some("U1"), 42), "favorite_U1_42");
        assert_eq!(operation_id("goal", None, 7), "goal__7");
        assert_ne!(operation_id("goal", None, 7), operation_id("goal", Some("none"), 7));
    }

    #[test]
    fn into_queued_assigns_bookkeeping() {
        let op = favorite().into_queued(1_700_000_000_000, DEFAULT_MAX_ATTEMPTS);

        assert_eq!(op.id, "favorite_U1_1700000000000");
        assert_eq!(op.attempts, 0);
        assert_eq!(op.max_attempts, 5);
        assert!(op.last_error.is_none());
        assert_eq!(op.payload.get("itemId"), Some(&json!("U1")));
    }

    #[test]
    fn max_attempts_override() {
        let op = favorite().with_max_attempts(2).into_queued(1, 5);
        assert_eq!(op.max_attempts, 2);
    }

    #[test]
    fn validation() {
        assert!(favorite().validate().is_ok());
        assert!(NewOperation::create("", "addFavorite").validate().is_err());
        assert!(NewOperation::create("favorite", " ").validate().is_err());
        assert!(favorite().with_max_attempts(0).validate().is_err());
        assert!(favorite().with_resource_id("").validate().is_err());
    }

    #[test]
    fn failure_bookkeeping() {
        let mut op = favorite().with_max_attempts(3).into_queued(1, 5);

        op.record_failure("timeout");
        assert_eq!(op.attempts, 1);
        assert_eq!(op.remaining_attempts(), 2);
        assert!(!op.is_exhausted());

        op.record_permanent_failure("unknown action");
        assert_eq!(op.attempts, 2);
        assert_eq!(op.remaining_attempts(), 0);
        assert!(op.is_exhausted());
        assert_eq!(op.last_error.as_deref(), Some("unknown action"));

        op.reset_attempts();
        assert_eq!(op.attempts, 0);
        assert!(!op.is_exhausted());
        assert!(op.last_error.is_none());
    }

    #[test]
    fn wire_format_uses_camel_case() {
        let op = favorite().into_queued(5, 5);
        let value = serde_json::to_value(&op).unwrap();

        assert_eq!(value["type"], json!("create"));
        assert_eq!(value["resourceId"], json!("U1"));
        assert_eq!(value["enqueuedAt"], json!(5));
        assert_eq!(value["maxAttempts"], json!(5));
        assert_eq!(value["priority"], json!("high"));
        assert!(value.get("lastError").is_none());
        assert!(value.get("permanent").is_none());
    }

    #[test]
    fn permanent_mark_survives_a_round_trip() {
        let mut op = favorite().into_queued(5, 5);
        op.record_permanent_failure("unknown action: launchRocket");

        let value = serde_json::to_value(&op).unwrap();
        assert_eq!(value["permanent"], json!(true));
        assert_eq!(value["attempts"], json!(1));

        let decoded: QueuedOperation = serde_json::from_value(value).unwrap();
        assert!(decoded.is_exhausted());
    }

    #[test]
    fn decode_fills_defaults() {
        let json = r#"{"id":"goal_g1_9","type":"update","resource":"goal","action":"updateGoal","enqueuedAt":9}"#;
        let op: QueuedOperation = serde_json::from_str(json).unwrap();

        assert_eq!(op.attempts, 0);
        assert_eq!(op.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(op.priority, Priority::Normal);
        assert!(op.payload.is_empty());
        assert!(op.resource_id.is_none());
    }

    #[test]
    fn sort_key_is_total() {
        let a = NewOperation::update("goal", "updateGoal").into_queued(10, 5);
        let b = NewOperation::update("goal", "updateGoal")
            .with_priority(Priority::High)
            .into_queued(20, 5);
        let c = NewOperation::update("goal", "updateGoal").into_queued(30, 5);

        let mut ops = vec![c.clone(), a.clone(), b.clone()];
        ops.sort_by(|x, y| x.sort_key().cmp(&y.sort_key()));
        assert_eq!(ops, vec![b, a, c]);
    }
}
