//! Configuration Builder
//!
//! Fluent builder for reporting client configuration.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use secrecy::{ExposeSecret, SecretString};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::error::{ConfigurationError, ReportsError};
use crate::resilience::RetryConfig;
use crate::types::{
    ClientCredentials, ReportsConfig, DEFAULT_BASE_URL, DEFAULT_MAX_RETRIES,
    DEFAULT_TIMEOUT, DEFAULT_TOKEN_EXPIRY_MARGIN, DEFAULT_TOKEN_URL,
};

/// Tenant identifier sent when `WEBSITE_ID` is not set.
pub const DEFAULT_WEBSITE_ID: &str = "47";

/// Header carrying the tenant identifier.
pub const WEBSITE_ID_HEADER: &str = "websiteId";

/// User agent sent when `USER_AGENT` is not set.
pub const DEFAULT_USER_AGENT: &str =
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Reporting client configuration builder.
#[derive(Default)]
pub struct ReportsConfigBuilder {
    client_key: Option<String>,
    client_secret: Option<SecretString>,
    token_url: Option<String>,
    base_url: Option<String>,
    timeout: Option<Duration>,
    max_retries: Option<u32>,
    default_headers: Vec<(String, String)>,
    retry: Option<RetryConfig>,
    token_expiry_margin: Option<Duration>,
}

impl ReportsConfigBuilder {
    /// Create new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder populated from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `CLIENT_KEY` (required): OAuth2 client key
    /// - `CLIENT_SECRET` (required): OAuth2 client secret
    /// - `WEBSITE_ID` (optional): tenant identifier, sent as `websiteId`
    /// - `USER_AGENT` (optional): identifying user agent
    /// - `OVERDRIVE_TOKEN_URL` (optional): token endpoint override
    /// - `OVERDRIVE_BASE_URL` (optional): resource base URL override
    /// - `OVERDRIVE_TIMEOUT_SECS` (optional): per-attempt timeout in seconds
    /// - `OVERDRIVE_MAX_RETRIES` (optional): retries after the first attempt
    pub fn from_env() -> Result<Self, ReportsError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ReportsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|value| !value.is_empty())
                .ok_or_else(|| ConfigurationError::MissingRequired {
                    field: name.to_string(),
                })
        };

        let website_id = lookup("WEBSITE_ID").unwrap_or_else(|| DEFAULT_WEBSITE_ID.to_string());
        let user_agent = lookup("USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

        let mut builder = Self::new()
            .client_key(required("CLIENT_KEY")?)
            .client_secret(required("CLIENT_SECRET")?)
            .default_header(WEBSITE_ID_HEADER, website_id)
            .default_header(USER_AGENT.as_str(), user_agent);

        if let Some(token_url) = lookup("OVERDRIVE_TOKEN_URL") {
            builder = builder.token_url(token_url);
        }

        if let Some(base_url) = lookup("OVERDRIVE_BASE_URL") {
            builder = builder.base_url(base_url);
        }

        if let Some(timeout) = lookup("OVERDRIVE_TIMEOUT_SECS") {
            let secs = parse_number::<u64>("OVERDRIVE_TIMEOUT_SECS", &timeout)?;
            builder = builder.timeout(Duration::from_secs(secs));
        }

        if let Some(retries) = lookup("OVERDRIVE_MAX_RETRIES") {
            builder = builder.max_retries(parse_number("OVERDRIVE_MAX_RETRIES", &retries)?);
        }

        Ok(builder)
    }

    /// Set client key.
    pub fn client_key(mut self, client_key: impl Into<String>) -> Self {
        self.client_key = Some(client_key.into());
        self
    }

    /// Set client secret.
    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(SecretString::new(client_secret.into()));
        self
    }

    /// Set token endpoint.
    pub fn token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = Some(url.into());
        self
    }

    /// Set base URL for relative resource paths.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set retries allowed after the first attempt.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Add a header sent on every call. Later values replace earlier ones.
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Set retry classification and backoff.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Set token expiry safety margin.
    pub fn token_expiry_margin(mut self, margin: Duration) -> Self {
        self.token_expiry_margin = Some(margin);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<ReportsConfig, ReportsError> {
        let client_key = self
            .client_key
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ConfigurationError::MissingRequired {
                field: "client_key".to_string(),
            })?;

        let client_secret = self
            .client_secret
            .filter(|secret| !secret.expose_secret().is_empty())
            .ok_or_else(|| ConfigurationError::MissingRequired {
                field: "client_secret".to_string(),
            })?;

        let token_url = parse_endpoint(self.token_url.as_deref().unwrap_or(DEFAULT_TOKEN_URL))?;
        let base_url = parse_base_url(self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL))?;

        let mut default_headers = HeaderMap::new();
        for (name, value) in self.default_headers {
            let header_name =
                HeaderName::from_str(&name).map_err(|e| ConfigurationError::InvalidHeader {
                    name: name.clone(),
                    message: e.to_string(),
                })?;
            let header_value =
                HeaderValue::from_str(&value).map_err(|e| ConfigurationError::InvalidHeader {
                    name: name.clone(),
                    message: e.to_string(),
                })?;
            default_headers.insert(header_name, header_value);
        }

        Ok(ReportsConfig {
            credentials: ClientCredentials {
                client_key,
                client_secret,
            },
            token_url,
            base_url,
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            default_headers,
            retry: self.retry.unwrap_or_default(),
            token_expiry_margin: self
                .token_expiry_margin
                .unwrap_or(DEFAULT_TOKEN_EXPIRY_MARGIN),
        })
    }
}

/// Create a new reporting client configuration builder.
pub fn reports_config() -> ReportsConfigBuilder {
    ReportsConfigBuilder::new()
}

fn parse_number<T: FromStr>(field: &str, raw: &str) -> Result<T, ConfigurationError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigurationError::InvalidValue {
            field: field.to_string(),
            message: format!("expected a non-negative integer, got {raw:?}"),
        })
}

fn parse_endpoint(raw: &str) -> Result<Url, ConfigurationError> {
    let url = Url::parse(raw).map_err(|e| ConfigurationError::InvalidEndpoint {
        url: raw.to_string(),
        message: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(ConfigurationError::InvalidEndpoint {
            url: raw.to_string(),
            message: format!("unsupported scheme {scheme:?}"),
        }),
    }
}

/// Relative paths join onto the last path segment, so the base must end in `/`.
fn parse_base_url(raw: &str) -> Result<Url, ConfigurationError> {
    let normalized = format!("{}/", raw.trim_end_matches('/'));
    parse_endpoint(&normalized)
}
