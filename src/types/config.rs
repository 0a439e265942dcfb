//! Configuration Types
//!
//! Client configuration for the reporting API.

use base64::Engine;
use reqwest::header::HeaderMap;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use url::Url;

use crate::resilience::RetryConfig;

/// Default OAuth2 token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://oauth.overdrive.com/token";

/// Default base URL for report resources.
pub const DEFAULT_BASE_URL: &str = "https://reports.api.overdrive.com/v1/";

/// Default per-attempt transport timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Tokens are treated as expired this long before the server says so.
pub const DEFAULT_TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Reporting API client configuration.
#[derive(Clone, Debug)]
pub struct ReportsConfig {
    /// Client credentials for the token exchange.
    pub credentials: ClientCredentials,
    /// OAuth2 token endpoint.
    pub token_url: Url,
    /// Base URL that relative resource paths resolve against. Always ends in `/`.
    pub base_url: Url,
    /// Per-attempt transport timeout.
    pub timeout: Duration,
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Headers sent on every call (tenant identifier, user agent, ...).
    pub default_headers: HeaderMap,
    /// Retry classification and backoff settings.
    pub retry: RetryConfig,
    /// Safety margin subtracted from the advertised token lifetime.
    pub token_expiry_margin: Duration,
}

/// Client key and secret for the client-credentials grant.
#[derive(Clone)]
pub struct ClientCredentials {
    /// Client key.
    pub client_key: String,
    /// Client secret.
    pub client_secret: SecretString,
}

impl ClientCredentials {
    /// Create new credentials.
    pub fn new(client_key: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_key: client_key.into(),
            client_secret: SecretString::new(client_secret.into()),
        }
    }

    /// `Authorization` header value for HTTP basic authentication.
    pub fn basic_authorization(&self) -> String {
        let raw = format!("{}:{}", self.client_key, self.client_secret.expose_secret());
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(raw)
        )
    }
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_key", &self.client_key)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}
