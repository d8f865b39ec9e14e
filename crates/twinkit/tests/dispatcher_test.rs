//! Webhook dispatch against real HTTP targets.

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use twinkit::dispatch::{
    verify_signature, AttemptOutcome, Dispatcher, DispatcherConfig, EventStatus, NoopSigner,
};
use twinkit::SimClock;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer) -> DispatcherConfig {
    DispatcherConfig::new(format!("{}/webhooks", server.uri()))
        .with_secret("whsec_test")
        .with_retry_delay(Duration::from_secs(5))
        .with_attempt_timeout(Duration::from_secs(2))
}

fn build(config: DispatcherConfig) -> Dispatcher {
    Dispatcher::builder(config)
        .clock(Arc::new(SimClock::virtual_sleep()))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_always_failing_target_without_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/webhooks"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let dispatcher = build(config(&server).with_max_retries(0));
    for i in 0..3 {
        dispatcher.enqueue("customer.created", json!({ "n": i }));
    }
    let report = dispatcher.flush().await;

    assert_eq!(report.failed, 3);
    let events = dispatcher.all_events();
    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|e| e.status == EventStatus::Failed));
    assert_eq!(dispatcher.deliveries().len(), 3);
    assert!(dispatcher.queued_events().is_empty());
    assert!(dispatcher
        .deliveries()
        .iter()
        .all(|a| a.outcome == AttemptOutcome::StatusCode(500)));
}

#[tokio::test]
async fn test_fails_twice_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dispatcher = build(config(&server).with_max_retries(3));
    let event = dispatcher.enqueue("invoice.paid", json!({"amount": 1200}));
    let report = dispatcher.flush().await;

    assert_eq!(report.delivered, 1);
    let attempts = dispatcher.deliveries_for(&event.id);
    assert_eq!(attempts.len(), 3);
    assert_eq!(
        attempts.iter().map(|a| a.outcome.status_code()).collect::<Vec<_>>(),
        vec![Some(503), Some(503), Some(200)]
    );
    let event = dispatcher.event(&event.id).unwrap();
    assert_eq!(event.status, EventStatus::Delivered);
    assert_eq!(event.attempts, 3);
    assert_eq!(dispatcher.clock().offset(), chrono::Duration::seconds(10));
}

#[tokio::test]
async fn test_auto_deliver_with_concurrent_flush_sends_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(50)))
        .expect(1)
        .mount(&server)
        .await;

    let dispatcher = build(config(&server).with_auto_deliver(true));
    let event = dispatcher.enqueue("customer.created", json!({}));
    let report = dispatcher.flush().await;

    assert_eq!(report.delivered + report.skipped, 1);
    assert_eq!(
        dispatcher.event(&event.id).unwrap().status,
        EventStatus::Delivered
    );
    assert_eq!(dispatcher.deliveries_for(&event.id).len(), 1);
}

#[tokio::test]
async fn test_outbound_request_is_signed_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/webhooks"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let dispatcher = build(config(&server));
    let event = dispatcher.enqueue("invoice.paid", json!({"id": "in_000001"}));
    assert_eq!(dispatcher.flush().await.delivered, 1);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];

    let signature = request
        .headers
        .get("x-twin-signature")
        .expect("signature header")
        .to_str()
        .unwrap();
    assert!(verify_signature(&request.body, "whsec_test", signature));

    let body: Value = serde_json::from_slice(&request.body).unwrap();
    assert_eq!(body["id"], event.id.as_str());
    assert_eq!(body["type"], "invoice.paid");
    assert_eq!(body["data"], json!({"id": "in_000001"}));
    assert_eq!(body["created"], event.created_at.timestamp());
}

#[tokio::test]
async fn test_custom_signer_replaces_default() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dispatcher = Dispatcher::builder(config(&server))
        .signer(Arc::new(NoopSigner))
        .build()
        .unwrap();
    dispatcher.enqueue("ping", json!({}));
    dispatcher.flush().await;

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("x-twin-signature").is_none());
}

#[tokio::test]
async fn test_slow_target_times_out_and_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let dispatcher = build(
        config(&server)
            .with_attempt_timeout(Duration::from_millis(100))
            .with_max_retries(2),
    );
    dispatcher.enqueue("ping", json!({}));
    let report = dispatcher.flush().await;

    assert_eq!(report.failed, 1);
    let deliveries = dispatcher.deliveries();
    assert_eq!(deliveries.len(), 2);
    assert!(deliveries
        .iter()
        .all(|a| matches!(&a.outcome, AttemptOutcome::Error(_))));
}

#[tokio::test]
async fn test_unreachable_target_records_errors() {
    // Bind and drop a listener to get a port with nothing behind it.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let dispatcher = build(
        DispatcherConfig::new(format!("http://127.0.0.1:{port}/webhooks")).with_max_retries(1),
    );
    dispatcher.enqueue("ping", json!({}));
    let report = dispatcher.flush().await;

    assert_eq!(report.failed, 1);
    assert!(matches!(
        &dispatcher.deliveries()[0].outcome,
        AttemptOutcome::Error(_)
    ));
}

#[tokio::test]
async fn test_delivery_attempt_json_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let dispatcher = build(config(&server));
    dispatcher.enqueue("ping", json!({}));
    dispatcher.flush().await;

    let attempt = serde_json::to_value(&dispatcher.deliveries()[0]).unwrap();
    assert_eq!(attempt["event_id"], "evt_000001");
    assert_eq!(attempt["attempt_number"], 1);
    assert_eq!(attempt["status_code"], 201);
    assert!(attempt["timestamp"].is_string());
    assert!(attempt.get("error").is_none());
}
