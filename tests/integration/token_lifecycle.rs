//! Integration tests for the token exchange and cache

use super::*;
use overdrive_reports::{AuthenticationError, ReportsError, TokenState};
use wiremock::matchers::{body_string, header};

#[tokio::test]
async fn test_token_exchange_and_authorized_request() {
    let server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(header("authorization", "Basic a2V5OnNlY3JldA=="))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(header("accept", "application/json"))
        .and(header("websiteId", "47"))
        .and(body_string("grant_type=client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-1",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/checkouts"))
        .and(header("authorization", "Bearer tok-1"))
        .and(header("accept", "application/json"))
        .and(header("websiteId", "47"))
        .and(header("user-agent", "reports-integration-tests/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"checkouts": []})))
        .expect(2)
        .mount(&server)
        .await;

    let t = test_client(config_for(&server, 0));
    let first = t.client.get("checkouts", &[]).await.unwrap();
    let second = t.client.get("/checkouts", &[]).await.unwrap();

    assert_eq!(first.status, 200);
    assert_eq!(second.status, 200);
    assert_eq!(t.client.token_manager().state().await, TokenState::Valid);
}

#[tokio::test]
async fn test_token_refreshed_at_margin_boundary() {
    let server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "tok-1", "expires_in": 120})),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "tok-2", "expires_in": "120"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(header("authorization", "Bearer tok-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let t = test_client(config_for(&server, 0));

    t.client.get("checkouts", &[]).await.unwrap();
    t.clock.advance(Duration::from_secs(59));
    t.client.get("checkouts", &[]).await.unwrap();

    t.clock.advance(Duration::from_secs(1));
    assert_eq!(t.client.token_manager().state().await, TokenState::Expired);
    t.client.get("checkouts", &[]).await.unwrap();
}

#[tokio::test]
async fn test_missing_access_token_prevents_resource_request() {
    let server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token_type": "Bearer"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let t = test_client(config_for(&server, 5));
    let error = t.client.get("checkouts", &[]).await.unwrap_err();

    assert!(matches!(
        error,
        ReportsError::Authentication(AuthenticationError::MissingAccessToken)
    ));
    assert!(t.sleeper.recorded().is_empty());
}

#[tokio::test]
async fn test_rejected_credentials_not_retried() {
    let server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(503).set_body_json(json!({"error": "temporarily_unavailable"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let t = test_client(config_for(&server, 5));
    let error = t.client.get("checkouts", &[]).await.unwrap_err();

    match error {
        ReportsError::Authentication(AuthenticationError::ExchangeRejected { status, body }) => {
            assert_eq!(status, 503);
            assert!(body.contains("temporarily_unavailable"));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(t.sleeper.recorded().is_empty());
}
