//! Property-based test generators using proptest.
//!
//! Provides strategies for generating queue contents and conflict records
//! that maintain the model's invariants: IDs are unique and derived from
//! `(resource, resource_id, enqueued_at)`, and `attempts <= max_attempts`.

use offsync_protocol::{
    operation_id, ConflictReason, ConflictResolution, OperationType, Payload, Priority,
    QueuedOperation, SyncConflict,
};
use proptest::prelude::*;
use serde_json::Value;

/// Strategy for operation types.
pub fn operation_type_strategy() -> impl Strategy<Value = OperationType> {
    prop_oneof![
        Just(OperationType::Create),
        Just(OperationType::Update),
        Just(OperationType::Delete),
        Just(OperationType::Custom),
    ]
}

/// Strategy for priorities.
pub fn priority_strategy() -> impl Strategy<Value = Priority> {
    prop_oneof![
        Just(Priority::High),
        Just(Priority::Normal),
        Just(Priority::Low),
    ]
}

/// Strategy for resource names.
pub fn resource_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z_]{0,15}").expect("Invalid regex")
}

/// Strategy for action names.
pub fn action_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-zA-Z]{0,23}").expect("Invalid regex")
}

/// Strategy for JSON leaf values. Floats are left out so values compare
/// exactly after a round trip.
pub fn json_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        ".{0,32}".prop_map(Value::from),
    ]
}

/// Strategy for operation payloads.
pub fn payload_strategy() -> impl Strategy<Value = Payload> {
    prop::collection::btree_map("[a-zA-Z]{1,12}", json_value_strategy(), 0..6)
        .prop_map(|fields| fields.into_iter().collect())
}

/// Strategy for a single queued operation enqueued at `enqueued_at`.
pub fn queued_operation_at(enqueued_at: u64) -> impl Strategy<Value = QueuedOperation> {
    (
        operation_type_strategy(),
        resource_strategy(),
        prop::option::of("[A-Za-z0-9]{1,12}"),
        action_strategy(),
        payload_strategy(),
        1u32..10,
        priority_strategy(),
        prop::option::of(".{1,40}"),
        any::<bool>(),
    )
        .prop_flat_map(
            move |(
                op_type,
                resource,
                resource_id,
                action,
                payload,
                max_attempts,
                priority,
                last_error,
                permanent,
            )| {
                (0..=max_attempts).prop_map(move |attempts| QueuedOperation {
                    id: operation_id(&resource, resource_id.as_deref(), enqueued_at),
                    op_type,
                    resource: resource.clone(),
                    resource_id: resource_id.clone(),
                    action: action.clone(),
                    payload: payload.clone(),
                    enqueued_at,
                    attempts,
                    max_attempts,
                    last_error: last_error.clone(),
                    priority,
                    permanent,
                })
            },
        )
}

/// Strategy for a single queued operation.
pub fn queued_operation_strategy() -> impl Strategy<Value = QueuedOperation> {
    (1_600_000_000_000u64..1_900_000_000_000).prop_flat_map(queued_operation_at)
}

/// Strategy for a queue of up to `max_len` operations with unique IDs.
///
/// Enqueue times strictly increase in list order, as they do in a live queue.
pub fn queue_strategy(max_len: usize) -> impl Strategy<Value = Vec<QueuedOperation>> {
    prop::collection::vec(queued_operation_strategy(), 0..=max_len).prop_map(|mut ops| {
        let base = 1_700_000_000_000u64;
        for (offset, op) in (0u64..).zip(ops.iter_mut()) {
            op.enqueued_at = base + offset;
            op.id = operation_id(&op.resource, op.resource_id.as_deref(), op.enqueued_at);
        }
        ops
    })
}

/// Strategy for conflict reasons.
pub fn conflict_reason_strategy() -> impl Strategy<Value = ConflictReason> {
    prop_oneof![
        Just(ConflictReason::VersionMismatch),
        Just(ConflictReason::DeletedRemotely),
        Just(ConflictReason::ModifiedRemotely),
    ]
}

/// Strategy for conflict resolutions.
pub fn conflict_resolution_strategy() -> impl Strategy<Value = ConflictResolution> {
    prop_oneof![
        Just(ConflictResolution::KeepLocal),
        Just(ConflictResolution::UseRemote),
        Just(ConflictResolution::Merge),
    ]
}

/// Strategy for conflict records.
pub fn sync_conflict_strategy() -> impl Strategy<Value = SyncConflict> {
    (
        queued_operation_strategy(),
        conflict_reason_strategy(),
        prop::option::of(json_value_strategy()),
        prop::option::of(conflict_resolution_strategy()),
        any::<u32>(),
    )
        .prop_map(|(op, reason, remote_data, resolution, delay)| {
            let mut conflict =
                SyncConflict::new(op.id, reason, op.enqueued_at + u64::from(delay))
                    .with_local_data(Value::Object(op.payload))
                    .with_remote_data(remote_data);
            if let Some(resolution) = resolution {
                conflict.resolve(resolution);
            }
            conflict
        })
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
