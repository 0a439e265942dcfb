//! Retry Logic
//!
//! Failure classification and exponential backoff for report requests.
//!
//! The policy is a pure function of `(attempt, outcome)` and never sleeps.
//! The executor owns the attempt loop and delegates every delay to a
//! [`Sleeper`], so tests can swap in a recording sleeper instead of waiting.

use rand::Rng;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::{HttpResponse, Sleeper};
use crate::error::ReportsError;

/// Statuses treated as transient: accepted-but-not-ready, timeouts, throttling, gateway errors.
pub const DEFAULT_RETRYABLE_STATUSES: [u16; 8] = [202, 408, 425, 429, 500, 502, 503, 504];

/// Upper bound for computed backoff (not applied to `Retry-After`).
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Upper bound (exclusive) for the random jitter added to computed backoff.
pub const DEFAULT_MAX_JITTER: Duration = Duration::from_millis(500);

/// Retry configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// HTTP statuses that trigger another attempt.
    pub retryable_statuses: BTreeSet<u16>,
    /// Cap for `2^attempt` seconds.
    pub max_backoff: Duration,
    /// Jitter is drawn uniformly from `[0, max_jitter)`.
    pub max_jitter: Duration,
    /// Use a parseable `Retry-After` header verbatim instead of computed backoff.
    pub honor_retry_after: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retryable_statuses: DEFAULT_RETRYABLE_STATUSES.into_iter().collect(),
            max_backoff: DEFAULT_MAX_BACKOFF,
            max_jitter: DEFAULT_MAX_JITTER,
            honor_retry_after: true,
        }
    }
}

/// Parse a `Retry-After` value as a non-negative number of seconds.
///
/// Accepts plain digits with an optional fractional part (`"5"`, `"0.1"`).
/// Signs, exponents, HTTP dates and anything else yield `None`.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    let (whole, fraction) = match value.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (value, None),
    };

    let is_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !is_digits(whole) || !fraction.map_or(true, is_digits) {
        return None;
    }

    let seconds: f64 = value.parse().ok()?;
    Duration::try_from_secs_f64(seconds).ok()
}

/// What to do with the outcome of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Final response; hand it to the caller.
    Return,
    /// Unclassified failure; propagate it untouched.
    Propagate,
    /// Transient outcome; wait this long, then try again if budget remains.
    RetryAfter(Duration),
}

/// Classification and delay computation, independent of any transport.
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.config.retryable_statuses.contains(&status)
    }

    /// `min(max_backoff, 2^attempt s) + jitter_fraction * max_jitter`.
    ///
    /// `jitter_fraction` is expected in `[0, 1)`.
    pub fn backoff_delay(&self, attempt: u32, jitter_fraction: f64) -> Duration {
        let exponential = 1u64
            .checked_shl(attempt)
            .map(Duration::from_secs)
            .unwrap_or(self.config.max_backoff)
            .min(self.config.max_backoff);
        exponential + self.config.max_jitter.mul_f64(jitter_fraction.clamp(0.0, 1.0))
    }

    fn jittered_backoff(&self, attempt: u32) -> Duration {
        let fraction: f64 = rand::thread_rng().gen_range(0.0..1.0);
        self.backoff_delay(attempt, fraction)
    }

    /// Delay before retrying after a retryable response.
    pub fn response_delay(&self, attempt: u32, response: &HttpResponse) -> Duration {
        let hinted = if self.config.honor_retry_after {
            response.header("retry-after").and_then(parse_retry_after)
        } else {
            None
        };
        hinted.unwrap_or_else(|| self.jittered_backoff(attempt))
    }

    /// Classify the outcome of attempt number `attempt` (zero-based).
    pub fn decide(
        &self,
        attempt: u32,
        outcome: &Result<HttpResponse, ReportsError>,
    ) -> RetryDecision {
        match outcome {
            Ok(response) if !self.is_retryable_status(response.status) => RetryDecision::Return,
            Ok(response) => RetryDecision::RetryAfter(self.response_delay(attempt, response)),
            Err(error) if error.is_retryable() => {
                RetryDecision::RetryAfter(self.jittered_backoff(attempt))
            }
            Err(_) => RetryDecision::Propagate,
        }
    }
}

/// Bookkeeping for one logical request.
#[derive(Debug, Default)]
pub struct RetryState {
    /// Attempts made so far.
    pub attempts: u32,
    /// Most recent retryable response, if any.
    pub last_response: Option<HttpResponse>,
    /// Most recent retryable transport error, if any.
    pub last_error: Option<ReportsError>,
}

impl RetryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember a retryable outcome.
    pub fn record(&mut self, outcome: Result<HttpResponse, ReportsError>) {
        match outcome {
            Ok(response) => self.last_response = Some(response),
            Err(error) => self.last_error = Some(error),
        }
    }

    /// Resolve once the budget is spent: last response, else last error.
    pub fn into_exhausted(self) -> Result<HttpResponse, ReportsError> {
        match (self.last_response, self.last_error) {
            (Some(response), _) => Ok(response),
            (None, Some(error)) => Err(error),
            (None, None) => Err(ReportsError::RetryInvariant),
        }
    }
}

fn describe(outcome: &Result<HttpResponse, ReportsError>) -> String {
    match outcome {
        Ok(response) => format!("HTTP {}", response.status),
        Err(error) => error.to_string(),
    }
}

/// Runs attempts sequentially under a [`RetryPolicy`].
#[derive(Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            policy: RetryPolicy::new(config),
            sleeper,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `attempt_fn` up to `max_retries + 1` times.
    ///
    /// `attempt_fn` receives the zero-based attempt number. The first
    /// non-retryable outcome is returned as-is. Once the budget is spent the
    /// last response wins over the last transport error.
    pub async fn execute<F, Fut>(
        &self,
        mut attempt_fn: F,
        max_retries: u32,
    ) -> Result<HttpResponse, ReportsError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<HttpResponse, ReportsError>>,
    {
        let mut state = RetryState::new();

        for attempt in 0..=max_retries {
            state.attempts = attempt + 1;
            let outcome = attempt_fn(attempt).await;

            let delay = match self.policy.decide(attempt, &outcome) {
                RetryDecision::Return => {
                    if attempt > 0 {
                        debug!(attempts = state.attempts, "Request settled after retry");
                    }
                    return outcome;
                }
                RetryDecision::Propagate => return outcome,
                RetryDecision::RetryAfter(delay) => delay,
            };

            let reason = describe(&outcome);
            state.record(outcome);

            if attempt == max_retries {
                warn!(
                    attempts = state.attempts,
                    last = %reason,
                    "Retries exhausted"
                );
                break;
            }

            warn!(
                attempt = attempt,
                reason = %reason,
                delay = ?delay,
                "Transient failure, retrying"
            );
            self.sleeper.sleep(delay).await;
        }

        state.into_exhausted()
    }
}
