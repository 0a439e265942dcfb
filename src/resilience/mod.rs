//! Resilience
//!
//! Retry classification and exponential backoff with jitter.

pub mod retry;

pub use retry::{
    parse_retry_after, RetryConfig, RetryDecision, RetryExecutor, RetryPolicy, RetryState,
    DEFAULT_MAX_BACKOFF, DEFAULT_MAX_JITTER, DEFAULT_RETRYABLE_STATUSES,
};
