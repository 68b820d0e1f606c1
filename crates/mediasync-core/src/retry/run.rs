//! Retry loop: run an attempt until success or the policy says stop.

use std::future::Future;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::classify::classify;
use super::error::FetchError;
use super::policy::{RetryDecision, RetryPolicy};

/// Successful value plus the number of attempts it took.
#[derive(Debug)]
pub struct Retried<T> {
    pub value: T,
    pub attempts: u32,
}

/// Terminal failure of the retry loop.
#[derive(Debug, Error)]
pub enum RetryError {
    /// Every allowed attempt failed with a transient error.
    #[error("gave up after {attempts} attempt(s): {last}")]
    Exhausted { attempts: u32, last: FetchError },
    /// An attempt failed with an error retrying cannot fix.
    #[error("attempt {attempts} failed permanently: {error}")]
    Permanent { attempts: u32, error: FetchError },
    /// Cancellation was requested while waiting to retry.
    #[error("cancelled after {attempts} attempt(s); last error: {last}")]
    Cancelled { attempts: u32, last: FetchError },
}

impl RetryError {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. }
            | RetryError::Permanent { attempts, .. }
            | RetryError::Cancelled { attempts, .. } => *attempts,
        }
    }

    /// The error from the final attempt.
    pub fn last_error(&self) -> &FetchError {
        match self {
            RetryError::Exhausted { last, .. } | RetryError::Cancelled { last, .. } => last,
            RetryError::Permanent { error, .. } => error,
        }
    }
}

/// Runs `attempt_fn` (given the 1-based attempt number) until it succeeds or
/// the policy says to stop. Between attempts sleeps `retry_wait`; the sleep
/// ends early when `cancel` fires, in which case no further attempt is made.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut attempt_fn: F,
) -> Result<Retried<T>, RetryError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 1u32;
    loop {
        let e = match attempt_fn(attempt).await {
            Ok(value) => {
                return Ok(Retried {
                    value,
                    attempts: attempt,
                })
            }
            Err(e) => e,
        };
        let class = classify(&e);
        match policy.decide(attempt, class) {
            RetryDecision::NoRetry if class.is_transient() => {
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: e,
                });
            }
            RetryDecision::NoRetry => {
                return Err(RetryError::Permanent {
                    attempts: attempt,
                    error: e,
                });
            }
            RetryDecision::RetryAfter(wait) => {
                tracing::warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "attempt failed, retrying in {:?}",
                    wait
                );
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = cancel.cancelled() => {
                        return Err(RetryError::Cancelled { attempts: attempt, last: e });
                    }
                }
                attempt += 1;
            }
        }
    }
}
