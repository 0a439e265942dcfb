//! Token Types
//!
//! Token endpoint payload and the cached bearer token.

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{de, Deserialize, Deserializer};

use crate::error::AuthenticationError;

/// Token type used when the server omits one.
pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// Token lifetime assumed when the server omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Token response from the client-credentials exchange.
///
/// Every field is optional at the parsing layer so that a missing
/// `access_token` surfaces as an authentication error rather than a JSON one.
#[derive(Clone, Deserialize)]
pub struct TokenResponse {
    /// Access token.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Token type (usually "Bearer").
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime in seconds. Accepts a JSON number or a numeric string.
    #[serde(default, deserialize_with = "deserialize_expires_in")]
    pub expires_in: Option<i64>,
}

impl TokenResponse {
    /// Convert into a cached token issued at `now`.
    ///
    /// The usable lifetime is `expires_in - margin`, floored at zero. A lifetime
    /// too large to represent as an expiry instant is rejected.
    pub fn into_cached(
        self,
        now: DateTime<Utc>,
        margin: std::time::Duration,
    ) -> Result<CachedToken, AuthenticationError> {
        let access_token = self
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or(AuthenticationError::MissingAccessToken)?;

        let token_type = self
            .token_type
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_string());

        let lifetime = self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        let margin_secs = i64::try_from(margin.as_secs()).unwrap_or(i64::MAX);
        let usable_secs = lifetime.saturating_sub(margin_secs).max(0);
        let expires_at = Duration::try_seconds(usable_secs)
            .and_then(|usable| now.checked_add_signed(usable))
            .ok_or_else(|| AuthenticationError::InvalidPayload {
                message: format!("expires_in {lifetime} is out of range"),
            })?;

        Ok(CachedToken {
            value: SecretString::new(access_token),
            token_type,
            obtained_at: now,
            expires_at,
        })
    }
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

fn deserialize_expires_in<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .map(Some)
            .ok_or_else(|| de::Error::custom("expires_in out of range")),
        Some(serde_json::Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("expires_in is not an integer: {s:?}"))),
        Some(other) => Err(de::Error::custom(format!(
            "expires_in has unexpected type: {other}"
        ))),
    }
}

/// Bearer token cached by the token manager.
#[derive(Clone)]
pub struct CachedToken {
    value: SecretString,
    /// Token type used as the `Authorization` scheme.
    pub token_type: String,
    /// When the exchange completed.
    pub obtained_at: DateTime<Utc>,
    /// Instant after which the token is no longer used. Already includes the safety margin.
    pub expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// Token value.
    pub fn secret(&self) -> &str {
        self.value.expose_secret()
    }

    /// Usable strictly before `expires_at`.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Format as Authorization header value.
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.value.expose_secret())
    }
}

impl std::fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedToken")
            .field("value", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("obtained_at", &self.obtained_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Lifecycle of the cached token as seen at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenState {
    /// No exchange has happened yet.
    Unset,
    /// A usable token is cached.
    Valid,
    /// The cached token has passed its (margin-adjusted) expiry.
    Expired,
}

impl TokenState {
    /// Classify an optional cached token at `now`.
    pub fn of(token: Option<&CachedToken>, now: DateTime<Utc>) -> Self {
        match token {
            None => Self::Unset,
            Some(t) if t.is_usable_at(now) => Self::Valid,
            Some(_) => Self::Expired,
        }
    }
}
