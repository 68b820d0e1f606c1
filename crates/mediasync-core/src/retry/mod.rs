//! Retry policy for single download attempts.
//!
//! Classifies attempt failures (curl errors, HTTP status, short bodies,
//! storage) into transient or permanent classes and drives the fixed-wait
//! retry loop, so the engine and fetcher share one notion of "retryable".

mod classify;
mod error;
mod policy;
mod run;

pub use classify::{classify, classify_curl_error, classify_http_status};
pub use error::FetchError;
pub use policy::{ErrorClass, RetryDecision, RetryPolicy};
pub use run::{run_with_retry, RetryError, Retried};
