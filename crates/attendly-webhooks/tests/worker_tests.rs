//! Integration tests for the worker run loop.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use serde_json::json;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer};

use attendly_db::models::WebhookDeliveryStatus;
use attendly_webhooks::models::WebhookEventType;
use attendly_webhooks::worker::DeliveryWorker;

#[tokio::test]
async fn test_run_loop_delivers_queued_jobs_and_stops_cleanly() {
    let mock_server = MockServer::start().await;
    let capture = CaptureResponder::new();
    Mock::given(method("POST"))
        .respond_with(capture.clone())
        .mount(&mock_server)
        .await;

    let harness = TestHarness::new();
    harness
        .create_endpoint(&mock_server.uri(), &["meeting.ended"])
        .await;
    harness
        .dispatcher
        .publish(ORG_A, WebhookEventType::MeetingEnded, json!({}))
        .await
        .unwrap();

    let worker = Arc::clone(&harness.worker);
    let handle = tokio::spawn(DeliveryWorker::run(worker));

    // Poll until the delivery lands rather than sleeping a fixed time
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while capture.request_count() == 0 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(capture.request_count(), 1);

    let deliveries = harness.ledger.all().await;
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].status, WebhookDeliveryStatus::Success);

    harness.worker.shutdown();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("worker did not stop after shutdown")
        .unwrap();
}

#[tokio::test]
async fn test_run_loop_executes_jobs_concurrently_within_limit() {
    let mock_server = MockServer::start().await;
    // Slow endpoint: each delivery takes 200ms
    Mock::given(method("POST"))
        .respond_with(wiremock::ResponseTemplate::new(200).set_delay(Duration::from_millis(200)))
        .mount(&mock_server)
        .await;

    let harness = TestHarness::new();
    harness
        .create_endpoint(&mock_server.uri(), &["meeting.ended"])
        .await;

    // Ten deliveries; with concurrency 10 they overlap instead of serializing
    for _ in 0..10 {
        harness
            .dispatcher
            .publish(ORG_A, WebhookEventType::MeetingEnded, json!({}))
            .await
            .unwrap();
    }

    let worker = Arc::clone(&harness.worker);
    let handle = tokio::spawn(DeliveryWorker::run(worker));

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let done = harness
            .ledger
            .all()
            .await
            .iter()
            .filter(|d| d.status == WebhookDeliveryStatus::Success)
            .count();
        if done == 10 || tokio::time::Instant::now() >= deadline {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    assert_eq!(harness.ledger.all().await.len(), 10);
    assert!(harness.queue.all().await.is_empty());

    harness.worker.shutdown();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("worker did not stop after shutdown")
        .unwrap();
}
