//! OverDrive Reports Integration
//!
//! Resilient OAuth2 client for the paginated OverDrive reporting API.
//!
//! # Features
//!
//! - Client-credentials token exchange with cached, margin-adjusted expiry
//! - Retry with `Retry-After` support and capped exponential backoff with jitter
//! - Cursor pagination that delivers each page to a storage sink in order
//! - Injectable transport, clock and sleeper for deterministic tests
//!
//! # Example
//!
//! ```rust,ignore
//! use overdrive_reports::{reports_config, FileSink, PaginationWalker, ReportsClient, WalkOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = reports_config()
//!         .client_key("my-client-key")
//!         .client_secret("my-client-secret")
//!         .default_header("websiteId", "47")
//!         .build()?;
//!
//!     let client = ReportsClient::new(config)?;
//!     let params = vec![
//!         ("startDateUtc".to_string(), "2024-01-01".to_string()),
//!         ("endDateUtc".to_string(), "2024-01-03".to_string()),
//!     ];
//!
//!     let mut sink = FileSink::new("/data/checkouts");
//!     let summary = PaginationWalker::new(&client, "checkouts", params, WalkOptions::new())
//!         .walk(&mut sink)
//!         .await?;
//!
//!     println!("Saved {} pages", summary.pages_delivered);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `types`: configuration and token data structures
//! - `error`: error hierarchy
//! - `core`: HTTP transport and time sources
//! - `resilience`: retry policy and executor
//! - `token`: token manager
//! - `client`: authenticated request client
//! - `pagination`: cursor walker and storage sinks
//! - `builders`: fluent configuration builder
//! - `telemetry`: logging setup

pub mod builders;
pub mod client;
pub mod core;
pub mod error;
pub mod pagination;
pub mod resilience;
pub mod telemetry;
pub mod token;
pub mod types;

// Re-export main client
pub use client::{reports_client, ReportsClient};

// Re-export builders
pub use builders::{reports_config, ReportsConfigBuilder};

// Re-export errors
pub use error::{
    AuthenticationError, ConfigurationError, NetworkError, ProtocolError, ReportsError,
    ReportsResult, StorageError, TerminalHttpError,
};

// Re-export types
pub use types::{
    // Config
    ClientCredentials, ReportsConfig,
    // Token
    CachedToken, TokenResponse, TokenState,
};

// Re-export core components
pub use core::{
    // Transport
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, MockHttpTransport,
    ReqwestHttpTransport,
    // Time
    Clock, ManualClock, RecordingSleeper, Sleeper, SystemClock, TokioSleeper,
};

// Re-export resilience
pub use resilience::{parse_retry_after, RetryConfig, RetryDecision, RetryExecutor, RetryPolicy};

// Re-export token management
pub use token::TokenManager;

// Re-export pagination
pub use pagination::{
    FileSink, InMemorySink, Page, PaginationWalker, StartPosition, StorageSink, WalkOptions,
    WalkState, WalkSummary,
};

// Re-export telemetry
pub use telemetry::{init_logging, LogFormat, LoggingConfig};
