//! Reports Error Types
//!
//! Error hierarchy for token exchange, transport, pagination and storage.
//!
//! Only authentication failures and unclassified transport failures are hard
//! errors on the request path. Any completed HTTP exchange, including client
//! errors and retry-exhausted server errors, is handed back as a response.

use std::time::Duration;
use thiserror::Error;

/// Root error type for the reports integration.
#[derive(Error, Debug)]
pub enum ReportsError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Authentication error: {0}")]
    Authentication(#[from] AuthenticationError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("HTTP error: {0}")]
    Http(#[from] TerminalHttpError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Retry budget consumed without observing a response or an error.
    #[error("Retries exhausted without a captured response or transport error")]
    RetryInvariant,
}

impl ReportsError {
    /// Get error code for telemetry.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "REPORTS_CONFIG",
            Self::Authentication(_) => "REPORTS_AUTH",
            Self::Network(_) => "REPORTS_NETWORK",
            Self::Protocol(_) => "REPORTS_PROTOCOL",
            Self::Http(_) => "REPORTS_HTTP",
            Self::Storage(_) => "REPORTS_STORAGE",
            Self::RetryInvariant => "REPORTS_RETRY_INVARIANT",
        }
    }

    /// Check if error is a transient transport failure.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Check if error came from the credential exchange.
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }
}

/// Configuration error.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Missing required field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid endpoint URL {url}: {message}")]
    InvalidEndpoint { url: String, message: String },

    #[error("Invalid header {name}: {message}")]
    InvalidHeader { name: String, message: String },

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

/// Credential exchange error. Never retried.
#[derive(Error, Debug)]
pub enum AuthenticationError {
    #[error("Token endpoint returned HTTP {status}")]
    ExchangeRejected { status: u16, body: String },

    #[error("Token response missing 'access_token'")]
    MissingAccessToken,

    #[error("Unusable token response: {message}")]
    InvalidPayload { message: String },

    #[error("Token request failed: {message}")]
    ExchangeFailed { message: String },
}

/// Network/transport error.
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Request timeout after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Connect timeout after {timeout:?}")]
    ConnectTimeout { timeout: Duration },

    #[error("Protocol failure while reading response: {message}")]
    Protocol { message: String },

    #[error("Failed to write request: {message}")]
    WriteFailed { message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Transport error: {message}")]
    Other { message: String },
}

impl NetworkError {
    /// Connection, read-timeout, protocol and write failures are transient.
    /// A connect timeout is not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. }
                | Self::Timeout { .. }
                | Self::Protocol { .. }
                | Self::WriteFailed { .. }
        )
    }
}

/// Response parsing error.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid JSON: {message}")]
    InvalidJson { message: String },

    #[error("Continuation field '{field}' is not a string")]
    InvalidCursor { field: String },
}

/// A final, non-retryable HTTP status surfaced by a caller that asked for one.
#[derive(Error, Debug)]
#[error("HTTP {status} from {url}")]
pub struct TerminalHttpError {
    pub status: u16,
    pub url: String,
    pub body: String,
}

/// Storage sink error.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Write failed for {path}: {message}")]
    WriteFailed { path: String, message: String },

    #[error("Serialization failed: {message}")]
    SerializationFailed { message: String },

    #[error("Sink rejected page {sequence}: {message}")]
    Rejected { sequence: usize, message: String },
}

/// Result type for reports operations.
pub type ReportsResult<T> = Result<T, ReportsError>;
