//! Retry policy for fallible async operations.
//!
//! Semantics:
//! - `max_attempts` counts total attempts (initial try + retries); default 3.
//! - Every failure is retried by default. The `retry_if` predicate can
//!   exclude errors that will never succeed on retry (input validation and the
//!   like), but the default is deliberately to retry everything.
//! - After the final failed attempt the last error propagates unchanged, with
//!   no wrapper type. The caller's classification layer is responsible for
//!   final shaping.
//! - `on_retry` fires after each failed non-final attempt, before the delay,
//!   so observers see the error and the attempt number that produced it.
//! - The delay between attempts comes from [`Backoff`] (optionally randomized
//!   by [`Jitter`]) and is applied through a [`Sleeper`], so tests run retry
//!   schedules instantly.
//!
//! ```rust
//! use std::time::Duration;
//! use guardrail::{Backoff, RetryPolicy};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let policy = RetryPolicy::<std::io::Error>::builder()
//!     .max_attempts(3)
//!     .backoff(Backoff::exponential(Duration::from_millis(50)))
//!     .build()
//!     .unwrap();
//!
//! let value = policy.execute(|| async { Ok::<_, std::io::Error>(7) }).await.unwrap();
//! assert_eq!(value, 7);
//! # });
//! ```

use crate::time::{Sleeper, TokioSleeper};
use crate::{Backoff, Jitter};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Observer invoked after each failed non-final attempt.
pub type RetryObserver<E> = Arc<dyn Fn(&E, usize) + Send + Sync>;

/// Retry policy combining attempt budget, backoff, jitter, and predicate.
#[derive(Clone)]
pub struct RetryPolicy<E> {
    max_attempts: usize,
    backoff: Backoff,
    jitter: Jitter,
    retry_if: Arc<dyn Fn(&E) -> bool + Send + Sync>,
    on_retry: Option<RetryObserver<E>>,
    sleeper: Arc<dyn Sleeper>,
}

impl<E> std::fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .field("jitter", &self.jitter)
            .field("retry_if", &"<predicate>")
            .field("on_retry", &self.on_retry.as_ref().map(|_| "<observer>"))
            .field("sleeper", &"<sleeper>")
            .finish()
    }
}

impl<E> RetryPolicy<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    pub fn builder() -> RetryPolicyBuilder<E> {
        RetryPolicyBuilder::new()
    }

    /// Execute an async operation with retry semantics.
    ///
    /// Returns the first success, or the error from the final attempt.
    pub async fn execute<T, Fut, Op>(&self, mut operation: Op) -> Result<T, E>
    where
        T: Send,
        Fut: Future<Output = Result<T, E>> + Send,
        Op: FnMut() -> Fut + Send,
    {
        for attempt in 1..=self.max_attempts {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if attempt == self.max_attempts || !(self.retry_if)(&error) {
                        return Err(error);
                    }
                    if let Some(observer) = &self.on_retry {
                        observer(&error, attempt);
                    }
                    let delay = self.jitter.apply(self.backoff.delay(attempt));
                    tracing::debug!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "attempt failed; backing off before retry"
                    );
                    self.sleeper.sleep(delay).await;
                }
            }
        }

        // The loop always returns on the final attempt; max_attempts >= 1 is
        // enforced at build time.
        debug_assert!(false, "retry loop exited without returning");
        unreachable!()
    }
}

/// Errors produced while building a retry policy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("max_attempts must be > 0 (got {0})")]
    InvalidMaxAttempts(usize),
}

/// Builder for [`RetryPolicy`].
pub struct RetryPolicyBuilder<E> {
    max_attempts: usize,
    backoff: Backoff,
    jitter: Jitter,
    retry_if: Arc<dyn Fn(&E) -> bool + Send + Sync>,
    on_retry: Option<RetryObserver<E>>,
    sleeper: Arc<dyn Sleeper>,
}

impl<E> RetryPolicyBuilder<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::exponential(Duration::from_secs(1)),
            jitter: Jitter::None,
            retry_if: Arc::new(|_| true),
            on_retry: None,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Total attempts (initial + retries). Must be > 0.
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    /// Predicate deciding whether an error is worth retrying.
    pub fn retry_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.retry_if = Arc::new(predicate);
        self
    }

    /// Observer called with the error and attempt number before each retry.
    pub fn on_retry<F>(mut self, observer: F) -> Self
    where
        F: Fn(&E, usize) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(observer));
        self
    }

    pub fn with_sleeper<S>(mut self, sleeper: S) -> Self
    where
        S: Sleeper + 'static,
    {
        self.sleeper = Arc::new(sleeper);
        self
    }

    pub fn build(self) -> Result<RetryPolicy<E>, BuildError> {
        if self.max_attempts == 0 {
            return Err(BuildError::InvalidMaxAttempts(0));
        }
        Ok(RetryPolicy {
            max_attempts: self.max_attempts,
            backoff: self.backoff,
            jitter: self.jitter,
            retry_if: self.retry_if,
            on_retry: self.on_retry,
            sleeper: self.sleeper,
        })
    }
}

impl<E> Default for RetryPolicyBuilder<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
