//! Token Manager
//!
//! Acquires and caches the client-credentials token used on report requests.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};
use url::Url;

use crate::core::{Clock, HttpMethod, HttpRequest, HttpTransport};
use crate::error::{AuthenticationError, ConfigurationError, ReportsError};
use crate::types::{CachedToken, ClientCredentials, ReportsConfig, TokenResponse, TokenState};

/// Grant requested from the token endpoint.
pub const CLIENT_CREDENTIALS_GRANT: &str = "client_credentials";

/// Client-credentials token manager.
///
/// The cached token lives behind an async mutex that is held across the whole
/// check-then-refresh sequence, so callers sharing one manager trigger at most
/// one exchange per expiry.
pub struct TokenManager {
    credentials: ClientCredentials,
    token_url: Url,
    default_headers: HeaderMap,
    expiry_margin: Duration,
    timeout: Duration,
    transport: Arc<dyn HttpTransport>,
    clock: Arc<dyn Clock>,
    cache: Mutex<Option<CachedToken>>,
}

impl TokenManager {
    /// Create a token manager from client configuration.
    pub fn new(
        config: &ReportsConfig,
        transport: Arc<dyn HttpTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            credentials: config.credentials.clone(),
            token_url: config.token_url.clone(),
            default_headers: config.default_headers.clone(),
            expiry_margin: config.token_expiry_margin,
            timeout: config.timeout,
            transport,
            clock,
            cache: Mutex::new(None),
        }
    }

    /// Return a usable token, exchanging credentials first if none is cached
    /// or the cached one has expired.
    pub async fn ensure_token(&self) -> Result<CachedToken, ReportsError> {
        let mut cache = self.cache.lock().await;
        let now = self.clock.now();

        match TokenState::of(cache.as_ref(), now) {
            TokenState::Valid => {
                if let Some(token) = cache.as_ref() {
                    debug!(expires_at = %token.expires_at, "Reusing cached token");
                    return Ok(token.clone());
                }
            }
            TokenState::Expired => debug!("Cached token expired"),
            TokenState::Unset => debug!("No cached token"),
        }

        let token = self.exchange().await?;
        *cache = Some(token.clone());
        Ok(token)
    }

    /// Exchange credentials unconditionally and replace the cached token.
    pub async fn fetch_token(&self) -> Result<CachedToken, ReportsError> {
        let mut cache = self.cache.lock().await;
        let token = self.exchange().await?;
        *cache = Some(token.clone());
        Ok(token)
    }

    /// Lifecycle state of the cached token right now.
    pub async fn state(&self) -> TokenState {
        let cache = self.cache.lock().await;
        TokenState::of(cache.as_ref(), self.clock.now())
    }

    /// Drop the cached token.
    pub async fn clear(&self) {
        *self.cache.lock().await = None;
    }

    fn build_headers(&self) -> Result<HeaderMap, ReportsError> {
        let mut headers = self.default_headers.clone();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );

        let mut basic = HeaderValue::from_str(&self.credentials.basic_authorization())
            .map_err(|e| ConfigurationError::InvalidHeader {
                name: AUTHORIZATION.to_string(),
                message: e.to_string(),
            })?;
        basic.set_sensitive(true);
        headers.insert(AUTHORIZATION, basic);

        Ok(headers)
    }

    async fn exchange(&self) -> Result<CachedToken, ReportsError> {
        let form: &[(&str, &str)] = &[("grant_type", CLIENT_CREDENTIALS_GRANT)];
        let body = serde_urlencoded::to_string(form)
            .map_err(|e| AuthenticationError::ExchangeFailed {
                message: e.to_string(),
            })?;

        let request = HttpRequest {
            method: HttpMethod::Post,
            url: self.token_url.clone(),
            headers: self.build_headers()?,
            body: Some(body),
            timeout: Some(self.timeout),
        };

        debug!(token_url = %self.token_url, "Requesting client-credentials token");

        let response = self.transport.send(request).await.map_err(|e| match e {
            ReportsError::Authentication(auth) => auth,
            other => AuthenticationError::ExchangeFailed {
                message: other.to_string(),
            },
        })?;

        if !response.is_success() {
            return Err(AuthenticationError::ExchangeRejected {
                status: response.status,
                body: response.text(),
            }
            .into());
        }

        let payload: TokenResponse = serde_json::from_slice(&response.body).map_err(|e| {
            AuthenticationError::InvalidPayload {
                message: e.to_string(),
            }
        })?;

        let token = payload.into_cached(self.clock.now(), self.expiry_margin)?;
        info!(
            token_type = %token.token_type,
            expires_at = %token.expires_at,
            "Obtained access token"
        );
        Ok(token)
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("credentials", &self.credentials)
            .field("token_url", &self.token_url.as_str())
            .field("expiry_margin", &self.expiry_margin)
            .finish_non_exhaustive()
    }
}
