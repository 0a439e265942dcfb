//! Integration tests using WireMock
//!
//! These tests run the client against a mock HTTP server through the real
//! reqwest transport, covering the token exchange, retry behaviour and
//! pagination end to end.

mod pagination;
mod retry;
mod token_lifecycle;

use chrono::{DateTime, TimeZone, Utc};
use overdrive_reports::{
    reports_config, ManualClock, RecordingSleeper, ReportsClient, ReportsConfig,
    ReqwestHttpTransport,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper to create a mock server.
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// Configuration pointing both endpoints at `server`.
pub fn config_for(server: &MockServer, max_retries: u32) -> ReportsConfig {
    reports_config()
        .client_key("key")
        .client_secret("secret")
        .token_url(format!("{}/token", server.uri()))
        .base_url(format!("{}/v1", server.uri()))
        .default_header("websiteId", "47")
        .default_header("User-Agent", "reports-integration-tests/1.0")
        .timeout(Duration::from_secs(5))
        .max_retries(max_retries)
        .build()
        .unwrap()
}

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Client with a real transport but a manual clock and a recording sleeper.
pub struct TestClient {
    pub client: ReportsClient,
    pub clock: Arc<ManualClock>,
    pub sleeper: Arc<RecordingSleeper>,
}

pub fn test_client(config: ReportsConfig) -> TestClient {
    let clock = Arc::new(ManualClock::new(epoch()));
    let sleeper = Arc::new(RecordingSleeper::advancing(clock.clone()));
    let transport = Arc::new(ReqwestHttpTransport::with_timeout(config.timeout).unwrap());
    let client = ReportsClient::with_components(config, transport, sleeper.clone(), clock.clone());
    TestClient {
        client,
        clock,
        sleeper,
    }
}

/// Mount a token endpoint that always issues `access_token`.
pub async fn mount_token(server: &MockServer, access_token: &str, expires_in: u64) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": access_token,
            "token_type": "Bearer",
            "expires_in": expires_in,
        })))
        .mount(server)
        .await;
}

pub fn dates() -> Vec<(String, String)> {
    vec![
        ("startDateUtc".to_string(), "2024-01-01".to_string()),
        ("endDateUtc".to_string(), "2024-01-03".to_string()),
    ]
}
