use std::time::Duration;

/// High-level classification of an attempt failure for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Operation timed out (connect/read/low-speed).
    Timeout,
    /// Server asked us to slow down (429, 503).
    Throttled,
    /// Network-level failure (connection reset, DNS, short body).
    Connection,
    /// Retryable server error that is not throttling (5xx).
    Http5xx(u16),
    /// Anything retrying cannot fix: other 4xx, storage, malformed URL.
    Permanent,
}

impl ErrorClass {
    pub fn is_transient(self) -> bool {
        !matches!(self, ErrorClass::Permanent)
    }
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Fixed-wait retry policy. Time lost to a failing job is bounded by
/// `max_attempts * retry_wait`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Wait between a transient failure and the next attempt.
    pub retry_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_wait: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, retry_wait: Duration) -> Self {
        Self {
            max_attempts,
            retry_wait,
        }
    }

    /// Decide what to do after attempt number `attempt` (1-based) failed with `class`.
    pub fn decide(&self, attempt: u32, class: ErrorClass) -> RetryDecision {
        if !class.is_transient() || attempt >= self.max_attempts {
            return RetryDecision::NoRetry;
        }
        RetryDecision::RetryAfter(self.retry_wait)
    }

    /// Upper bound on time spent waiting between attempts for one job.
    pub fn worst_case_wait(&self) -> Duration {
        self.retry_wait
            .saturating_mul(self.max_attempts.saturating_sub(1))
    }
}
