//! Offline queueing and replay against an in-process backend.

mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;

use common::{CommentBackend, Harness};
use mito_core::models::RecordId;
use mito_core::sync::SyncCoordinator;
use mito_core::Error;

#[tokio::test(start_paused = true)]
async fn offline_comment_is_queued_then_synced() {
    common::init_logging();
    let backend = CommentBackend::new(false);
    let harness = Harness::new("http://backend.test/api", backend.clone(), false);
    let task = RecordId::from("42");

    let error = harness
        .api
        .add_task_comment("token-1", &task, "written on the train")
        .await
        .unwrap_err();
    assert!(error.is_deferred(), "unexpected error: {error:?}");

    let queued = harness.action_log.list();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].retry_count, 0);
    assert!(!queued[0].headers.contains_key("Authorization"));

    backend.set_reachable(true);
    harness.connectivity.set_online(true);

    let coordinator = SyncCoordinator::new(harness.executor.clone());
    let synced = coordinator.sync_all("token-2").await.unwrap();
    assert_eq!(synced.len(), 1);
    assert!(harness.action_log.is_empty());
    assert_eq!(backend.seen_tokens(), vec![Some("Bearer token-2".to_string())]);

    let comments = harness.api.get_task_comments("token-2", &task).await.unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].content.as_deref(), Some("written on the train"));
}

#[tokio::test(start_paused = true)]
async fn offline_reads_fail_instead_of_queueing() {
    let backend = CommentBackend::new(false);
    let harness = Harness::new("http://backend.test/api", backend, false);

    let error = harness
        .api
        .get_task_comments("token-1", &RecordId::from("42"))
        .await
        .unwrap_err();
    assert!(matches!(error, Error::Network(_)));
    assert!(harness.action_log.is_empty());
}

#[tokio::test(start_paused = true)]
async fn offline_login_is_never_written_to_the_log() {
    let backend = CommentBackend::new(false);
    let harness = Harness::new("http://backend.test/api", backend, false);

    let error = harness
        .api
        .login("ada@example.com", "hunter22")
        .await
        .unwrap_err();
    assert!(matches!(error, Error::Network(_)));
    assert!(harness.action_log.is_empty());
}

#[tokio::test(start_paused = true)]
async fn online_network_failure_is_not_queued() {
    let backend = CommentBackend::new(false);
    let harness = Harness::new("http://backend.test/api", backend, true);

    let error = harness
        .api
        .add_task_comment("token-1", &RecordId::from("42"), "hello")
        .await
        .unwrap_err();
    assert!(matches!(error, Error::Network(_)));
    assert!(harness.action_log.is_empty());
}

#[tokio::test]
async fn syncing_an_empty_log_twice_is_a_no_op() {
    let backend = CommentBackend::new(true);
    let harness = Harness::new("http://backend.test/api", backend.clone(), true);
    let coordinator = SyncCoordinator::new(harness.executor.clone());

    assert!(coordinator.sync_all("t").await.unwrap().is_empty());
    assert!(coordinator.sync_all("t").await.unwrap().is_empty());
    assert!(backend.seen_tokens().is_empty());
}

#[tokio::test]
async fn rejected_replays_are_dropped_after_the_ceiling() {
    let backend = CommentBackend::new(true);
    let harness = Harness::new("http://backend.test/api", backend, true);
    let action = harness
        .action_log
        .enqueue(&mito_core::http::ApiRequest::delete(
            "http://backend.test/api/comments/99",
        ))
        .unwrap();
    let coordinator = SyncCoordinator::new(harness.executor.clone());

    for _ in 0..3 {
        coordinator.sync_all("t").await.unwrap();
        assert_eq!(harness.action_log.len(), 1);
    }
    let report = coordinator.drain("t").await.unwrap();
    assert_eq!(report.dropped.len(), 1);
    assert_eq!(report.dropped[0].id, action.id);
    assert!(harness.action_log.is_empty());
}
