//! Integration tests for retry and backoff

use super::*;
use overdrive_reports::{InMemorySink, NetworkError, PaginationWalker, ReportsError, WalkOptions};
use std::time::Instant;

#[tokio::test]
async fn test_retry_after_honoured_in_real_time() {
    let server = setup_mock_server().await;
    mount_token(&server, "tok", 3600).await;

    Mock::given(method("GET"))
        .and(path("/v1/checkouts"))
        .respond_with(ResponseTemplate::new(202).insert_header("Retry-After", "0.1"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/checkouts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "attempt": 3})))
        .expect(1)
        .mount(&server)
        .await;

    let client = ReportsClient::new(config_for(&server, 5)).unwrap();
    let mut sink = InMemorySink::new();

    let started = Instant::now();
    let summary = PaginationWalker::new(&client, "checkouts", vec![], WalkOptions::new())
        .walk(&mut sink)
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_millis(200));
    assert_eq!(summary.pages_delivered, 1);
    assert_eq!(sink.pages()[0].status(), 200);
    assert_eq!(sink.pages()[0].body["attempt"], 3);
}

#[tokio::test]
async fn test_retryable_status_bounded_by_budget() {
    let server = setup_mock_server().await;
    mount_token(&server, "tok", 3600).await;

    Mock::given(method("GET"))
        .and(path("/v1/checkouts"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .expect(4)
        .mount(&server)
        .await;

    let t = test_client(config_for(&server, 3));
    let response = t.client.get("checkouts", &dates()).await.unwrap();

    assert_eq!(response.status, 503);
    assert_eq!(response.text(), "busy");

    let delays = t.sleeper.recorded();
    assert_eq!(delays.len(), 3);
    for (attempt, delay) in delays.iter().enumerate() {
        let floor = Duration::from_secs(1 << attempt);
        assert!(*delay >= floor);
        assert!(*delay < floor + Duration::from_millis(500));
    }
}

#[tokio::test]
async fn test_non_retryable_status_single_attempt() {
    let server = setup_mock_server().await;
    mount_token(&server, "tok", 3600).await;

    Mock::given(method("GET"))
        .and(path("/v1/checkouts"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"message": "bad dates"})))
        .expect(1)
        .mount(&server)
        .await;

    let t = test_client(config_for(&server, 5));
    let response = t.client.get("checkouts", &dates()).await.unwrap();

    assert_eq!(response.status, 400);
    assert!(t.sleeper.recorded().is_empty());
}

#[tokio::test]
async fn test_integer_retry_after_used_verbatim() {
    let server = setup_mock_server().await;
    mount_token(&server, "tok", 3600).await;

    Mock::given(method("GET"))
        .and(path("/v1/checkouts"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/checkouts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let t = test_client(config_for(&server, 5));
    let response = t.client.get("checkouts", &[]).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(t.sleeper.recorded(), vec![Duration::from_secs(7)]);
}

#[tokio::test]
async fn test_connection_failures_raise_last_transport_error() {
    let server = setup_mock_server().await;
    mount_token(&server, "tok", 3600).await;

    let closed_port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let config = reports_config()
        .client_key("key")
        .client_secret("secret")
        .token_url(format!("{}/token", server.uri()))
        .base_url(format!("http://127.0.0.1:{closed_port}/v1"))
        .max_retries(2)
        .build()
        .unwrap();

    let t = test_client(config);
    let error = t.client.get("checkouts", &[]).await.unwrap_err();

    assert!(matches!(
        error,
        ReportsError::Network(NetworkError::ConnectionFailed { .. })
    ));
    assert_eq!(t.sleeper.recorded().len(), 2);
}
