use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Attempts made before giving up on a retryable failure.
pub const MAX_ATTEMPTS: u32 = 3;

/// An idempotent operation paired with the predicate deciding which of its
/// failures are worth another attempt.
pub struct RetryableOperation<F, C> {
    operation: F,
    classifier: C,
}

impl<F, C> RetryableOperation<F, C> {
    pub const fn new(operation: F, classifier: C) -> Self {
        Self {
            operation,
            classifier,
        }
    }
}

#[derive(Debug, Error)]
pub enum RetryError<E> {
    #[error("max retries exceeded after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },

    #[error("{0}")]
    Permanent(E),

    #[error("operation cancelled")]
    Cancelled,
}

impl<E> RetryError<E> {
    /// The underlying failure, if one was observed.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Exhausted { last, .. } => Some(last),
            Self::Permanent(e) => Some(e),
            Self::Cancelled => None,
        }
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Retry executor with exponential backoff.
///
/// Sleeps `base_delay * 2^n` after the n-th failure (counted from zero),
/// never longer than `max_delay`. When a cancellation token is attached the
/// executor stops at the next attempt boundary or mid-backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    base_delay: Duration,
    max_delay: Duration,
    cancel: Option<CancellationToken>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(10))
    }
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            cancel: None,
        }
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        MAX_ATTEMPTS
    }

    /// Backoff applied after the failure numbered `attempt` (zero based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2_u32.saturating_pow(attempt))
            .min(self.max_delay)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    /// Returns `false` if the wait was interrupted by cancellation.
    async fn backoff(&self, delay: Duration) -> bool {
        match &self.cancel {
            Some(token) => tokio::select! {
                () = token.cancelled() => false,
                () = sleep(delay) => true,
            },
            None => {
                sleep(delay).await;
                true
            }
        }
    }

    /// Run `op` until it succeeds, fails permanently, or runs out of attempts.
    pub async fn execute<T, E, F, Fut, C>(
        &self,
        op: RetryableOperation<F, C>,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> bool,
        E: Display,
    {
        let RetryableOperation {
            mut operation,
            classifier,
        } = op;
        let mut attempt = 0;

        loop {
            if self.is_cancelled() {
                return Err(RetryError::Cancelled);
            }
            attempt += 1;

            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if !classifier(&e) => {
                    debug!("Request failed with non-retryable error: {e}");
                    return Err(RetryError::Permanent(e));
                }
                Err(e) if attempt >= MAX_ATTEMPTS => {
                    warn!("Request failed (attempt {attempt}/{MAX_ATTEMPTS}): {e}. Giving up");
                    return Err(RetryError::Exhausted { attempts: attempt, last: e });
                }
                Err(e) => {
                    let delay = self.delay_for(attempt - 1);
                    warn!(
                        "Request failed (attempt {attempt}/{MAX_ATTEMPTS}): {e}. Retrying after {}ms...",
                        delay.as_millis()
                    );
                    if !self.backoff(delay).await {
                        return Err(RetryError::Cancelled);
                    }
                }
            }
        }
    }
}
