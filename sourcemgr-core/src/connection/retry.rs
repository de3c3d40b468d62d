//! Connect retry with exponential backoff
//!
//! Pools retry a failed connect a bounded number of times before giving up.
//! The delay before retry `n` (0-indexed) is
//! `min(initial_delay * multiplier^n, max_delay)`.

use std::future::Future;
use std::time::Duration;

/// Default number of connect attempts (initial attempt included)
pub const DEFAULT_ATTEMPTS: u32 = 3;

/// Default delay before the first retry in milliseconds
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 250;

/// Default maximum delay between retries in milliseconds
pub const DEFAULT_MAX_DELAY_MS: u64 = 5_000;

/// Default backoff multiplier (delay doubles each retry)
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Retry behaviour for connecting new sessions
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total connect attempts; values below 1 behave as 1
    pub attempts: u32,
    /// Delay before the first retry in milliseconds
    pub initial_delay_ms: u64,
    /// Upper bound on any single delay in milliseconds
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryConfig {
    /// Creates a retry configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A single attempt without retries
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            attempts: 1,
            ..Self::default()
        }
    }

    /// Sets the total number of attempts
    #[must_use]
    pub const fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Sets the delay before the first retry
    #[must_use]
    pub const fn with_initial_delay_ms(mut self, delay_ms: u64) -> Self {
        self.initial_delay_ms = delay_ms;
        self
    }

    /// Sets the maximum delay between retries
    #[must_use]
    pub const fn with_max_delay_ms(mut self, delay_ms: u64) -> Self {
        self.max_delay_ms = delay_ms;
        self
    }

    /// Sets the backoff multiplier
    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Total attempts that will be made
    #[must_use]
    pub fn total_attempts(&self) -> u32 {
        self.attempts.max(1)
    }

    /// Delay before retry `retry` (0-indexed), or `None` once attempts run out
    #[must_use]
    pub fn delay_for_retry(&self, retry: u32) -> Option<Duration> {
        if retry + 1 >= self.total_attempts() {
            return None;
        }

        let delay_ms = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(retry as i32);
        let capped_delay_ms = (delay_ms as u64).min(self.max_delay_ms);

        Some(Duration::from_millis(capped_delay_ms))
    }
}

/// Tracks attempts during one connect sequence
#[derive(Debug, Clone)]
pub struct RetryState {
    failures: u32,
    config: RetryConfig,
    last_error: Option<String>,
}

impl RetryState {
    /// Starts a new sequence
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self {
            failures: 0,
            config,
            last_error: None,
        }
    }

    /// Attempt number about to be made (1-indexed)
    #[must_use]
    pub const fn attempt_number(&self) -> u32 {
        self.failures + 1
    }

    /// Records a failure and returns the delay before the next attempt,
    /// or `None` when attempts are exhausted
    pub fn record_failure(&mut self, error: impl Into<String>) -> Option<Duration> {
        self.last_error = Some(error.into());
        let delay = self.config.delay_for_retry(self.failures);
        self.failures += 1;
        delay
    }

    /// Number of failed attempts so far
    #[must_use]
    pub const fn failures(&self) -> u32 {
        self.failures
    }

    /// Returns the last error message
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

/// Runs `operation` until it succeeds, a non-retryable error occurs or the
/// attempts run out.
///
/// # Errors
///
/// Returns the last error produced by `operation`.
pub async fn retry_with_backoff<T, E, F, Fut>(
    config: &RetryConfig,
    mut operation: F,
    is_retryable: impl Fn(&E) -> bool,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut state = RetryState::new(config.clone());
    loop {
        match operation(state.attempt_number()).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                let retryable = is_retryable(&e);
                let delay = state.record_failure(e.to_string());
                match delay {
                    Some(delay) if retryable => {
                        tracing::debug!(
                            attempt = state.failures(),
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Connect attempt failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    _ => return Err(e),
                }
            }
        }
    }
}
