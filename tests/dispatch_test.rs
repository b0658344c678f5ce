use std::sync::Arc;
use std::time::Duration;

use notihub::db::enums::{DeliveryStatus, ExecutionMode, MessageStatus, SendingStrategy};
use notihub::db::store::Store;
use notihub::dispatch::{DispatchOutcome, DispatchWorkerPool, RetryPolicy};
use notihub::services::topic_service;

mod common;
use common::{harness, permanent, transient};

#[tokio::test]
async fn topic_without_routings_reports_and_invokes_nothing() {
    let h = harness().await;
    let topic = h
        .topic("t-empty", SendingStrategy::Broadcast, ExecutionMode::Sync)
        .await;
    let message_id = h.message(topic.id).await;

    let report = h
        .service
        .dispatch_message(message_id, &RetryPolicy::none())
        .await
        .unwrap();

    assert_eq!(report.outcome, DispatchOutcome::NoRoutingsConfigured);
    assert!(report.deliveries.is_empty());
    assert!(h.sender.calls().await.is_empty());

    let message = h.store.message_by_id(message_id).await.unwrap().unwrap();
    assert_eq!(message.status, MessageStatus::Completed);
}

#[tokio::test]
async fn failover_invokes_channels_until_first_success() {
    // Scenario: A (priority 2) fails transiently, B (priority 1) succeeds.
    let h = harness().await;
    let topic = h
        .topic("t1", SendingStrategy::PriorityFailover, ExecutionMode::Sync)
        .await;
    h.route(topic.id, "chan-a", 2).await;
    let channel_b = h.route(topic.id, "chan-b", 1).await;
    h.sender.script("chan-a", vec![Err(transient())]).await;

    let message_id = h.message(topic.id).await;
    let report = h.service.dispatch_sync(message_id).await.unwrap();

    // Invocation count equals the rank of the first successful channel.
    assert_eq!(h.sender.calls().await, vec!["chan-a", "chan-b"]);
    assert_eq!(report.outcome, DispatchOutcome::Delivered);
    assert_eq!(report.deliveries.len(), 2);
    assert!(!report.deliveries[0].succeeded);
    assert!(report.deliveries[1].succeeded);
    assert_eq!(report.deliveries[1].channel_id, channel_b);

    let message = h.store.message_by_id(message_id).await.unwrap().unwrap();
    assert_eq!(message.status, MessageStatus::Completed);
}

#[tokio::test]
async fn failover_exhaustion_is_all_channels_failed() {
    let h = harness().await;
    let topic = h
        .topic("t-fo", SendingStrategy::PriorityFailover, ExecutionMode::Sync)
        .await;
    h.route(topic.id, "chan-a", 2).await;
    h.route(topic.id, "chan-b", 1).await;
    h.route(topic.id, "chan-c", 0).await;
    h.sender.script("chan-a", vec![Err(permanent())]).await;
    h.sender.script("chan-b", vec![Err(permanent())]).await;
    h.sender.script("chan-c", vec![Err(permanent())]).await;

    let message_id = h.message(topic.id).await;
    let report = h.service.dispatch_sync(message_id).await.unwrap();

    // On total failure, invocations equal the full routing-set size, and
    // every attempt's error is attached.
    assert_eq!(h.sender.calls().await.len(), 3);
    assert_eq!(report.outcome, DispatchOutcome::AllChannelsFailed);
    assert!(report.deliveries.iter().all(|d| d.error.is_some()));

    let message = h.store.message_by_id(message_id).await.unwrap().unwrap();
    assert_eq!(message.status, MessageStatus::Failed);
}

#[tokio::test]
async fn broadcast_always_invokes_every_routing() {
    let h = harness().await;
    let topic = h
        .topic("t-bc", SendingStrategy::Broadcast, ExecutionMode::Sync)
        .await;
    h.route(topic.id, "chan-a", 0).await;
    h.route(topic.id, "chan-b", 0).await;
    h.route(topic.id, "chan-c", 0).await;
    h.sender.script("chan-b", vec![Err(permanent())]).await;

    let message_id = h.message(topic.id).await;
    let report = h.service.dispatch_sync(message_id).await.unwrap();

    let mut calls = h.sender.calls().await;
    calls.sort();
    assert_eq!(calls, vec!["chan-a", "chan-b", "chan-c"]);
    assert_eq!(report.outcome, DispatchOutcome::Partial);

    let message = h.store.message_by_id(message_id).await.unwrap().unwrap();
    assert_eq!(message.status, MessageStatus::Partial);
}

#[tokio::test]
async fn transient_failures_retry_on_the_same_channel() {
    let h = harness().await;
    let topic = h
        .topic("t-retry", SendingStrategy::Broadcast, ExecutionMode::Async)
        .await;
    let channel_id = h.route(topic.id, "chan-flaky", 0).await;
    h.sender
        .script("chan-flaky", vec![Err(transient()), Err(transient())])
        .await;

    let message_id = h.message(topic.id).await;
    let retry = h.service.options().retry.clone();
    let report = h.service.dispatch_message(message_id, &retry).await.unwrap();

    assert_eq!(report.outcome, DispatchOutcome::Delivered);
    assert_eq!(report.deliveries[0].attempts, 3);
    assert_eq!(h.sender.calls().await.len(), 3);

    // Audit trail has one row per attempt.
    let records = h.store.deliveries_by_message(message_id).await.unwrap();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.channel_id == channel_id));
    assert_eq!(records[0].status, DeliveryStatus::Failed);
    assert_eq!(records[1].status, DeliveryStatus::Failed);
    assert_eq!(records[2].status, DeliveryStatus::Succeeded);
    assert_eq!(records[2].attempt, 3);
}

#[tokio::test]
async fn permanent_failures_never_retry() {
    let h = harness().await;
    let topic = h
        .topic("t-perm", SendingStrategy::Broadcast, ExecutionMode::Async)
        .await;
    h.route(topic.id, "chan-reject", 0).await;
    h.sender.script("chan-reject", vec![Err(permanent())]).await;

    let message_id = h.message(topic.id).await;
    let retry = h.service.options().retry.clone();
    let report = h.service.dispatch_message(message_id, &retry).await.unwrap();

    assert_eq!(report.outcome, DispatchOutcome::AllChannelsFailed);
    assert_eq!(h.sender.calls().await.len(), 1);
}

#[tokio::test]
async fn render_failure_is_a_failed_attempt_without_sender_invocation() {
    let h = harness().await;
    let topic = h
        .topic("t-render", SendingStrategy::Broadcast, ExecutionMode::Sync)
        .await;
    h.route_with_template(
        topic.id,
        "chan-a",
        0,
        "{{ owner }}",
        serde_json::json!({"owner": "service.owner"}),
    )
    .await;

    let message_id = h.message(topic.id).await;
    let report = h.service.dispatch_sync(message_id).await.unwrap();

    assert_eq!(report.outcome, DispatchOutcome::AllChannelsFailed);
    assert!(h.sender.calls().await.is_empty());
    assert_eq!(report.deliveries[0].attempts, 0);
    let error = report.deliveries[0].error.as_deref().unwrap();
    assert!(error.contains("owner"), "{error}");

    let records = h.store.deliveries_by_message(message_id).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, DeliveryStatus::Failed);
}

#[tokio::test]
async fn sync_dispatch_times_out_and_abandons_inflight_attempts() {
    let h = harness().await;
    let topic = h
        .topic("t-slow", SendingStrategy::Broadcast, ExecutionMode::Sync)
        .await;
    h.route(topic.id, "chan-slow", 0).await;
    // Slower than the 500ms sync deadline.
    h.sender
        .set_delay("chan-slow", Duration::from_secs(2))
        .await;

    let message_id = h.message(topic.id).await;
    let report = h.service.dispatch_sync(message_id).await.unwrap();

    assert_eq!(report.outcome, DispatchOutcome::TimedOut);
    let message = h.store.message_by_id(message_id).await.unwrap().unwrap();
    assert_eq!(message.status, MessageStatus::Failed);
}

#[tokio::test]
async fn async_broadcast_delivers_each_channel_exactly_once() {
    // Scenario: async broadcast topic with three routings; one accepted
    // event eventually reaches all three senders once each.
    let h = harness().await;
    let topic = h
        .topic("t2", SendingStrategy::Broadcast, ExecutionMode::Async)
        .await;
    h.route(topic.id, "chan-a", 0).await;
    h.route(topic.id, "chan-b", 0).await;
    h.route(topic.id, "chan-c", 0).await;

    let pool = DispatchWorkerPool::start(h.service.clone(), 2, 16);
    let message_id = h.message(topic.id).await;
    pool.try_enqueue(message_id).unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let message = h.store.message_by_id(message_id).await.unwrap().unwrap();
        if message.status == MessageStatus::Completed {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "dispatch did not finish in time (status {:?})",
            message.status
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let mut calls = h.sender.calls().await;
    calls.sort();
    assert_eq!(calls, vec!["chan-a", "chan-b", "chan-c"]);

    let records = h.store.deliveries_by_message(message_id).await.unwrap();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.status == DeliveryStatus::Succeeded));

    pool.shutdown().await;
}

#[tokio::test]
async fn worker_pool_backpressures_when_queue_is_full() {
    let h = harness().await;
    let topic = h
        .topic("t-bp", SendingStrategy::Broadcast, ExecutionMode::Async)
        .await;
    h.route(topic.id, "chan-slow", 0).await;
    h.sender
        .set_delay("chan-slow", Duration::from_secs(5))
        .await;

    let pool = DispatchWorkerPool::start(h.service.clone(), 1, 1);

    // First message occupies the single worker, second fills the queue.
    let first = h.message(topic.id).await;
    let second = h.message(topic.id).await;
    let third = h.message(topic.id).await;
    pool.try_enqueue(first).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    pool.try_enqueue(second).unwrap();
    assert!(pool.try_enqueue(third).is_err());
}

#[tokio::test]
async fn regenerated_key_invalidates_the_previous_one() {
    let h = harness().await;
    let topic = h
        .topic("gen-0", SendingStrategy::Broadcast, ExecutionMode::Async)
        .await;

    let store = h.store.as_ref();
    let rotated = topic_service::regenerate_webhook_key(store, h.user_id, topic.id)
        .await
        .unwrap();
    assert_ne!(rotated.webhook_key, "gen-0");

    // Exactly one key authenticates after rotation.
    assert!(store.topic_by_webhook_key("gen-0").await.unwrap().is_none());
    assert!(store
        .topic_by_webhook_key(&rotated.webhook_key)
        .await
        .unwrap()
        .is_some());

    // A second rotation leaves only the newest key valid; the
    // first-generation key stays dead.
    let rotated_again = topic_service::regenerate_webhook_key(store, h.user_id, topic.id)
        .await
        .unwrap();
    assert!(store.topic_by_webhook_key("gen-0").await.unwrap().is_none());
    assert!(store
        .topic_by_webhook_key(&rotated.webhook_key)
        .await
        .unwrap()
        .is_none());
    assert!(store
        .topic_by_webhook_key(&rotated_again.webhook_key)
        .await
        .unwrap()
        .is_some());
}
