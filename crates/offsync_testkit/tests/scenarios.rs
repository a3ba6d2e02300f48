//! End-to-end engine scenarios across storage, protocol, and engine.

use offsync_engine::{ExhaustionPolicy, SyncError};
use offsync_protocol::{ConflictReason, ConflictResolution, NewOperation, Priority};
use offsync_storage::{InMemoryStore, KeyValueStore};
use offsync_testkit::prelude::*;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn favorite_added_offline_syncs_on_reconnect() {
    let h = EngineHarness::in_memory(fast_retry_config(), false);
    h.engine.initialize().await;

    h.engine.queue_operation(favorite_op("U1")).unwrap();
    let status = h.engine.status();
    assert_eq!(status.pending_count, 1);
    assert!(!status.is_online);
    assert_eq!(h.executor.call_count(), 0);

    h.network.set_online(true);
    assert!(wait_until(DEFAULT_WAIT, || h.engine.status().pending_count == 0).await);

    let calls = h.executor.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].action, "addFavorite");
    assert_eq!(calls[0].resource_id.as_deref(), Some("U1"));
    assert_eq!(calls[0].payload["type"], "university");
}

#[tokio::test]
async fn priority_order_survives_restart() {
    let temp = TempFileStore::new();
    let first = temp.harness(fast_retry_config(), false);
    first.engine.initialize().await;
    first
        .engine
        .queue_operation(NewOperation::update("goal", "A"))
        .unwrap();
    first
        .engine
        .queue_operation(NewOperation::update("goal", "B").with_priority(Priority::High))
        .unwrap();
    first
        .engine
        .queue_operation(NewOperation::update("goal", "C"))
        .unwrap();

    let second = first.restart(fast_retry_config());
    second.engine.initialize().await;
    assert_eq!(second.engine.status().pending_count, 3);

    second.network.set_online(true);
    assert!(wait_until(DEFAULT_WAIT, || second.engine.status().pending_count == 0).await);

    let order: Vec<String> = second
        .executor
        .calls()
        .into_iter()
        .map(|call| call.action)
        .collect();
    assert_eq!(order, vec!["B", "A", "C"]);
    assert_eq!(first.executor.call_count(), 0);
}

#[tokio::test]
async fn exhausted_operation_is_never_retried() {
    let h = EngineHarness::in_memory(fast_retry_config(), true);
    h.executor.set_default_response(
        "saveCalculation",
        Err(SyncError::ServerError("HTTP 503".into())),
    );
    h.engine.initialize().await;

    let id = h
        .engine
        .queue_operation(calculation_op("loan").with_max_attempts(3))
        .unwrap();
    assert!(
        wait_until(DEFAULT_WAIT, || {
            h.engine.operation(&id).is_some_and(|op| op.is_exhausted()) && !h.engine.is_syncing()
        })
        .await
    );

    for _ in 0..3 {
        h.network.set_online(false);
        h.network.set_online(true);
    }
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(h.engine.start_sync().await.is_none());

    assert_eq!(h.executor.calls_for("saveCalculation"), 3);
    let op = h.engine.operation(&id).unwrap();
    assert_eq!(op.attempts, 3);
    assert_eq!(op.last_error.as_deref(), Some("server error: HTTP 503"));
}

#[tokio::test]
async fn direct_sync_and_background_pass_share_one_call() {
    let h = EngineHarness::in_memory(fast_retry_config(), false);
    h.executor.set_delay(Duration::from_millis(40));
    h.engine.initialize().await;
    let id = h.engine.queue_operation(goal_op("G1", 1_000)).unwrap();

    h.network.set_online(true);
    let (first, second) = tokio::join!(h.engine.sync_operation(&id), h.engine.sync_operation(&id));
    assert!(first.unwrap().success);
    assert!(second.unwrap().success);

    assert!(wait_until(DEFAULT_WAIT, || !h.engine.is_syncing()).await);
    assert_eq!(h.executor.call_count(), 1);
    assert_eq!(h.engine.status().pending_count, 0);
}

#[tokio::test]
async fn write_failures_do_not_lose_operations() {
    let store = Arc::new(FlakyStore::new(InMemoryStore::new()));
    let h = EngineHarness::new(fast_retry_config(), Arc::clone(&store), false);
    h.engine.initialize().await;

    store.set_fail_writes(true);
    let id = h.engine.queue_operation(favorite_op("U9")).unwrap();
    assert!(store.failed_writes() >= 1);
    assert!(h.engine.operation(&id).is_some());

    store.set_fail_writes(false);
    h.network.set_online(true);
    assert!(wait_until(DEFAULT_WAIT, || h.engine.status().pending_count == 0).await);
    assert!(wait_until(DEFAULT_WAIT, || !h.engine.is_syncing()).await);
    assert_eq!(store.get("offline_queue").unwrap().as_deref(), Some("[]"));
}

#[tokio::test]
async fn unreadable_store_starts_empty() {
    let store = Arc::new(FlakyStore::new(InMemoryStore::new()));
    let first = EngineHarness::new(fast_retry_config(), Arc::clone(&store), false);
    first.engine.queue_operation(favorite_op("U1")).unwrap();

    store.set_fail_reads(true);
    let second = first.restart(fast_retry_config());
    second.engine.initialize().await;

    assert_eq!(second.engine.status().pending_count, 0);
    assert!(store.failed_reads() >= 1);
    second.engine.queue_operation(favorite_op("U2")).unwrap();
    assert_eq!(second.engine.status().pending_count, 1);
}

#[tokio::test]
async fn conflicts_persist_across_restart() {
    let temp = TempFileStore::new();
    let first = temp.harness(fast_retry_config(), false);
    first.executor.push_response(
        "updateGoal",
        Err(SyncError::conflict(
            ConflictReason::ModifiedRemotely,
            Some(serde_json::json!({"target": 900})),
        )),
    );
    first.engine.initialize().await;
    let id = first.engine.queue_operation(goal_op("G1", 500)).unwrap();

    first.network.set_online(true);
    assert!(wait_until(DEFAULT_WAIT, || first.engine.conflicts().len() == 1).await);
    assert!(wait_until(DEFAULT_WAIT, || !first.engine.is_syncing()).await);
    assert_eq!(first.engine.status().pending_count, 0);

    let second = first.restart(fast_retry_config());
    second.engine.initialize().await;
    let conflicts = second.engine.unresolved_conflicts();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].operation_id, id);
    assert_eq!(conflicts[0].remote_data.as_ref().unwrap()["target"], 900);
    assert_eq!(second.engine.status().pending_count, 0);

    second
        .engine
        .resolve_conflict(&id, ConflictResolution::KeepLocal)
        .unwrap();
    let third = second.restart(fast_retry_config());
    third.engine.initialize().await;
    assert!(third.engine.unresolved_conflicts().is_empty());
    assert_eq!(
        third.engine.conflicts()[0].resolution,
        Some(ConflictResolution::KeepLocal)
    );
}

#[tokio::test]
async fn dead_letters_persist_and_requeue() {
    let temp = TempFileStore::new();
    let config = fast_retry_config().with_exhaustion(ExhaustionPolicy::DeadLetter);
    let first = temp.harness(config.clone(), false);
    first.executor.push_response(
        "removeFavorite",
        Err(SyncError::Rejected("HTTP 404".into())),
    );
    first.engine.initialize().await;
    let id = first.engine.queue_operation(unfavorite_op("U3")).unwrap();

    first.network.set_online(true);
    assert!(wait_until(DEFAULT_WAIT, || first.engine.dead_letters().len() == 1).await);
    assert!(wait_until(DEFAULT_WAIT, || !first.engine.is_syncing()).await);

    let second = first.restart(config);
    second.engine.initialize().await;
    let letters = second.engine.dead_letters();
    assert_eq!(letters.len(), 1);
    assert_eq!(letters[0].reason, "rejected by server: HTTP 404");
    assert_eq!(letters[0].operation.attempts, 1);
    assert!(letters[0].operation.permanent);

    second.engine.requeue_dead_letter(&id).unwrap();
    second.network.set_online(true);
    assert!(wait_until(DEFAULT_WAIT, || second.engine.status().pending_count == 0).await);
    assert_eq!(second.executor.calls_for("removeFavorite"), 1);
    assert!(second.engine.dead_letters().is_empty());
}
