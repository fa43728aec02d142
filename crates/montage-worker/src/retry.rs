//! Backoff for operations that fail while a resource is briefly held.
//!
//! Cleanup is the main user: an output can stay locked for a moment after
//! the encoder that wrote it exits.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::debug;

/// How often and how patiently to retry.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Wait before the first retry; doubled for each later one
    pub initial_delay: Duration,
    /// Upper bound for any single wait
    pub max_delay: Duration,
    /// Name used in log lines
    pub label: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            label: "retry".to_string(),
        }
    }
}

impl RetryConfig {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Wait before retry number `retry` (1-based).
    fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// The last error of an operation that never succeeded.
#[derive(Debug)]
pub struct Exhausted<E> {
    pub error: E,
    /// Attempts made, including the first
    pub attempts: u32,
}

impl<E: fmt::Display> fmt::Display for Exhausted<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (after {} attempt(s))", self.error, self.attempts)
    }
}

/// Run `operation` until it succeeds, `should_retry` rejects its error, or
/// the retries run out.
pub async fn retry_async_if<F, Fut, T, E, P>(
    config: &RetryConfig,
    operation: F,
    should_retry: P,
) -> Result<T, Exhausted<E>>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut retries = 0u32;
    loop {
        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };
        if retries >= config.max_retries || !should_retry(&error) {
            return Err(Exhausted {
                error,
                attempts: retries + 1,
            });
        }
        retries += 1;
        let wait = config.backoff(retries);
        debug!(label = %config.label, retries, ?wait, "Retrying after error: {}", error);
        tokio::time::sleep(wait).await;
    }
}

/// [`retry_async_if`] retrying every error.
pub async fn retry_async<F, Fut, T, E>(config: &RetryConfig, operation: F) -> Result<T, Exhausted<E>>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    retry_async_if(config, operation, |_| true).await
}
