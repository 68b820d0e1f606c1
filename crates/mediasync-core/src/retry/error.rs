//! Error type for one fetch attempt, used for retry classification.

use thiserror::Error;

/// Error returned by a single fetch attempt (curl failure, HTTP error, short
/// body, or storage failure). Kept separate from `ErrorKind` so the retry
/// loop can classify it before the pipeline maps it to a job error.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Curl reported an error (timeout, connection, etc.).
    #[error("{0}")]
    Curl(#[from] curl::Error),
    /// HTTP response had a non-2xx status.
    #[error("HTTP {0}")]
    Http(u32),
    /// Transfer ended but fewer (or more) bytes arrived than Content-Length
    /// announced (e.g. server closed early).
    #[error("partial transfer: expected {expected} bytes, got {received}")]
    PartialTransfer { expected: u64, received: u64 },
    /// Disk/storage write failed (e.g. disk full, permission denied). Not retried.
    #[error("storage: {0}")]
    Storage(#[source] std::io::Error),
    /// The attempt never reported back (its task was torn down). Not retried.
    #[error("attempt aborted: {0}")]
    Aborted(String),
}

impl FetchError {
    pub fn is_storage(&self) -> bool {
        matches!(self, FetchError::Storage(_))
    }
}
