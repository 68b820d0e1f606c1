//! Single-attempt HTTP fetch into a part file.
//!
//! The engine only depends on the `Fetcher` trait; `CurlFetcher` is the
//! libcurl-backed implementation used in production. A fetch never retries
//! and never touches the destination path.

mod headers;
mod http;

use std::path::PathBuf;

pub use crate::retry::FetchError;
pub use headers::{parse_content_disposition_filename, ResponseHeaders};
pub use http::{CurlFetcher, CurlOptions};

/// One attempt's inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    /// Job-unique part file; created (truncated) by the fetcher.
    pub part_path: PathBuf,
    /// Length of a local file about to be replaced. When the response's
    /// Content-Length equals it, the transfer is abandoned before any body
    /// byte is written.
    pub skip_if_length: Option<u64>,
}

/// Successful attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The full body is in the part file, synced to disk.
    Completed {
        bytes_written: u64,
        /// Filename announced by Content-Disposition, if any.
        filename: Option<String>,
    },
    /// The server announced exactly `skip_if_length` bytes; nothing was kept.
    MatchesExisting { remote_len: u64 },
}

/// Performs exactly one download attempt. Implementations must delete the
/// part file before returning an error.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome, FetchError>;
}
