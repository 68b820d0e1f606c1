//! libcurl-backed fetcher: one plain GET, body streamed into the part file.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::io;
use std::time::Duration;

use super::headers::ResponseHeaders;
use super::{FetchError, FetchOutcome, FetchRequest, Fetcher};
use crate::storage::{discard_path, PartFile};

/// Transfer tuning shared by every request of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurlOptions {
    pub connect_timeout: Duration,
    /// Abort if throughput stays below this many bytes/s for `low_speed_time`.
    pub low_speed_limit: u32,
    pub low_speed_time: Duration,
    /// Wall-clock cap per attempt; none by default, the low-speed limit
    /// catches stalled transfers.
    pub timeout: Option<Duration>,
    pub user_agent: Option<String>,
    /// Extra request headers, e.g. a session `Cookie`.
    pub headers: BTreeMap<String, String>,
    /// Receive speed cap in bytes/s.
    pub max_recv_speed: Option<u64>,
}

impl Default for CurlOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            low_speed_limit: 1024,
            low_speed_time: Duration::from_secs(60),
            timeout: None,
            user_agent: None,
            headers: BTreeMap::new(),
            max_recv_speed: None,
        }
    }
}

/// Production fetcher. Cheap to share; each attempt builds its own handle.
#[derive(Debug, Clone, Default)]
pub struct CurlFetcher {
    options: CurlOptions,
}

enum Streamed {
    Complete(ResponseHeaders),
    MatchesExisting(u64),
}

impl CurlFetcher {
    pub fn new(options: CurlOptions) -> Self {
        Self { options }
    }

    fn easy(&self, url: &str) -> Result<curl::easy::Easy, curl::Error> {
        let o = &self.options;
        let mut easy = curl::easy::Easy::new();
        easy.url(url)?;
        easy.get(true)?;
        easy.follow_location(true)?;
        easy.max_redirections(10)?;
        easy.connect_timeout(o.connect_timeout)?;
        easy.low_speed_limit(o.low_speed_limit)?;
        easy.low_speed_time(o.low_speed_time)?;
        if let Some(timeout) = o.timeout {
            easy.timeout(timeout)?;
        }
        if let Some(ua) = &o.user_agent {
            easy.useragent(ua)?;
        }
        if let Some(speed) = o.max_recv_speed {
            easy.max_recv_speed(speed)?;
        }
        if !o.headers.is_empty() {
            let mut list = curl::easy::List::new();
            for (k, v) in &o.headers {
                list.append(&format!("{}: {}", k.trim(), v.trim()))?;
            }
            easy.http_headers(list)?;
        }
        Ok(easy)
    }

    fn stream_into(
        &self,
        request: &FetchRequest,
        part: &mut PartFile,
    ) -> Result<Streamed, FetchError> {
        let headers = RefCell::new(ResponseHeaders::default());
        let storage_error: Cell<Option<io::Error>> = Cell::new(None);
        let matched_existing = Cell::new(false);

        let mut easy = self.easy(&request.url)?;
        {
            let mut transfer = easy.transfer();
            transfer.header_function(|data| {
                if let Ok(line) = std::str::from_utf8(data) {
                    headers.borrow_mut().feed(line);
                }
                true
            })?;
            transfer.write_function(|data| {
                let h = headers.borrow();
                if !h.is_success() {
                    // Error page body: swallow, the status is checked below.
                    return Ok(data.len());
                }
                if part.written() == 0
                    && request.skip_if_length.is_some()
                    && h.content_length == request.skip_if_length
                {
                    matched_existing.set(true);
                    return Ok(0);
                }
                match part.write_chunk(data) {
                    Ok(()) => Ok(data.len()),
                    Err(e) => {
                        storage_error.set(Some(e));
                        Ok(0) // abort transfer
                    }
                }
            })?;
            if let Err(e) = transfer.perform() {
                if e.is_write_error() {
                    if matched_existing.get() {
                        if let Some(len) = request.skip_if_length {
                            return Ok(Streamed::MatchesExisting(len));
                        }
                    }
                    if let Some(io_err) = storage_error.take() {
                        return Err(FetchError::Storage(io_err));
                    }
                }
                return Err(FetchError::Curl(e));
            }
        }

        let code = easy.response_code()?;
        if !(200..300).contains(&code) {
            return Err(FetchError::Http(code));
        }
        let headers = headers.into_inner();
        if let Some(expected) = headers.content_length {
            // An empty 200 never reaches write_function, so the skip check runs here too.
            if part.written() == 0 && request.skip_if_length == Some(expected) {
                return Ok(Streamed::MatchesExisting(expected));
            }
            let received = part.written();
            if received != expected {
                return Err(FetchError::PartialTransfer { expected, received });
            }
        }
        Ok(Streamed::Complete(headers))
    }
}

impl Fetcher for CurlFetcher {
    fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome, FetchError> {
        let mut part = PartFile::create(&request.part_path).map_err(FetchError::Storage)?;
        match self.stream_into(request, &mut part) {
            Ok(Streamed::Complete(headers)) => match part.finish() {
                Ok(bytes_written) => {
                    tracing::debug!(
                        url = %request.url,
                        bytes = bytes_written,
                        "transfer complete"
                    );
                    Ok(FetchOutcome::Completed {
                        bytes_written,
                        filename: headers.filename(),
                    })
                }
                Err(e) => {
                    discard_path(&request.part_path);
                    Err(FetchError::Storage(e))
                }
            },
            Ok(Streamed::MatchesExisting(remote_len)) => {
                part.discard();
                Ok(FetchOutcome::MatchesExisting { remote_len })
            }
            Err(e) => {
                part.discard();
                Err(e)
            }
        }
    }
}
