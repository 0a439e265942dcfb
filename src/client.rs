//! Reports Client
//!
//! Authenticated, retrying request client for the reporting API.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use crate::core::{
    Clock, HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestHttpTransport, Sleeper,
    SystemClock, TokioSleeper,
};
use crate::error::{AuthenticationError, NetworkError, ReportsError};
use crate::resilience::RetryExecutor;
use crate::token::TokenManager;
use crate::types::{CachedToken, ReportsConfig};

/// Client for the paginated reporting API.
///
/// Every call goes through the retry executor, and every attempt re-validates
/// the cached token first, so a token that expires between retries is
/// refreshed before the next attempt.
pub struct ReportsClient {
    config: ReportsConfig,
    transport: Arc<dyn HttpTransport>,
    tokens: TokenManager,
    retry: RetryExecutor,
}

impl ReportsClient {
    /// Create a client backed by reqwest, the tokio timer and the system clock.
    pub fn new(config: ReportsConfig) -> Result<Self, ReportsError> {
        let transport = Arc::new(ReqwestHttpTransport::with_timeout(config.timeout)?);
        Ok(Self::with_components(
            config,
            transport,
            Arc::new(TokioSleeper),
            Arc::new(SystemClock),
        ))
    }

    /// Create a client with custom implementations.
    pub fn with_components(
        config: ReportsConfig,
        transport: Arc<dyn HttpTransport>,
        sleeper: Arc<dyn Sleeper>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let tokens = TokenManager::new(&config, transport.clone(), clock);
        let retry = RetryExecutor::new(config.retry.clone(), sleeper);
        Self {
            config,
            transport,
            tokens,
            retry,
        }
    }

    /// Get configuration.
    pub fn config(&self) -> &ReportsConfig {
        &self.config
    }

    /// Get the token manager.
    pub fn token_manager(&self) -> &TokenManager {
        &self.tokens
    }

    /// Perform one logical request and return the final response.
    ///
    /// Non-2xx statuses are not errors here; the caller inspects the status.
    /// Errors are authentication failures, unclassified transport failures,
    /// or the last transport failure once retries run out.
    pub async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        params: &[(String, String)],
        headers: &HeaderMap,
    ) -> Result<HttpResponse, ReportsError> {
        let url = self.resolve_url(path, params)?;

        let response = self
            .retry
            .execute(
                |attempt| {
                    let url = url.clone();
                    async move {
                        let token = self.tokens.ensure_token().await?;
                        let request = HttpRequest {
                            method,
                            url,
                            headers: self.merge_headers(headers, &token)?,
                            body: None,
                            timeout: Some(self.config.timeout),
                        };
                        debug!(
                            attempt = attempt,
                            method = method.as_str(),
                            url = %request.url,
                            "Sending request"
                        );
                        self.transport.send(request).await
                    }
                },
                self.config.max_retries,
            )
            .await?;

        debug!(status = response.status, url = %response.url, "Request complete");
        Ok(response)
    }

    /// `GET` with no extra headers.
    pub async fn get(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<HttpResponse, ReportsError> {
        self.request(HttpMethod::Get, path, params, &HeaderMap::new())
            .await
    }

    /// Resolve `path` against the base URL and merge `params` into its query.
    ///
    /// `http://` and `https://` URLs are used as-is. A param replaces every
    /// existing query pair with the same name.
    pub fn resolve_url(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<Url, ReportsError> {
        let resolved = if path.starts_with("http://") || path.starts_with("https://") {
            Url::parse(path)
        } else {
            self.config.base_url.join(path.trim_start_matches('/'))
        };

        let mut url = resolved.map_err(|e| NetworkError::InvalidRequest {
            message: format!("cannot resolve {path:?}: {e}"),
        })?;

        if !params.is_empty() {
            let overridden: HashSet<&str> = params.iter().map(|(k, _)| k.as_str()).collect();
            let kept: Vec<(String, String)> = url
                .query_pairs()
                .filter(|(k, _)| !overridden.contains(k.as_ref()))
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();

            url.query_pairs_mut()
                .clear()
                .extend_pairs(kept)
                .extend_pairs(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }

        Ok(url)
    }

    /// Layer `Accept`, default headers, caller headers and `Authorization`, in
    /// increasing precedence.
    fn merge_headers(
        &self,
        headers: &HeaderMap,
        token: &CachedToken,
    ) -> Result<HeaderMap, ReportsError> {
        let mut merged = HeaderMap::new();
        merged.insert(ACCEPT, HeaderValue::from_static("application/json"));
        overlay(&mut merged, &self.config.default_headers);
        overlay(&mut merged, headers);

        let mut authorization = HeaderValue::from_str(&token.authorization_header()).map_err(
            |_| AuthenticationError::InvalidPayload {
                message: "access token is not a valid header value".to_string(),
            },
        )?;
        authorization.set_sensitive(true);
        merged.insert(AUTHORIZATION, authorization);

        Ok(merged)
    }
}

/// Create a client backed by reqwest with the given configuration.
pub fn reports_client(config: ReportsConfig) -> Result<ReportsClient, ReportsError> {
    ReportsClient::new(config)
}

fn overlay(base: &mut HeaderMap, layer: &HeaderMap) {
    for name in layer.keys() {
        base.remove(name);
    }
    for (name, value) in layer {
        base.append(name.clone(), value.clone());
    }
}

impl std::fmt::Debug for ReportsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportsClient")
            .field("base_url", &self.config.base_url.as_str())
            .field("max_retries", &self.config.max_retries)
            .finish_non_exhaustive()
    }
}
