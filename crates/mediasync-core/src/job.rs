//! Download items, jobs and per-job results.
//!
//! A `DownloadItem` is what the catalog hands us; a `Job` wraps one item with
//! its resolved destination and tracks state while the engine owns it; a
//! `JobResult` is the immutable record produced when the job reaches a
//! terminal state.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::ErrorKind;

/// One downloadable item from the remote catalog, already resolved to a
/// concrete URL for the chosen encoding format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadItem {
    pub artist: String,
    pub title: String,
    pub item_id: String,
    pub url: String,
    /// Byte length advertised by the catalog. `None` disables the size-based skip.
    #[serde(default)]
    pub expected_size: Option<u64>,
    /// True when the served file is a zip container (full albums).
    #[serde(default)]
    pub is_archive: bool,
}

/// Job identifier: dense index assigned when the batch is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub usize);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Downloading,
    Verifying,
    Extracting,
    Succeeded,
    Skipped,
    Failed,
    Cancelled,
    /// Dry run: the file would have been left alone.
    WouldSkip,
    /// Dry run: the file would have been (re)downloaded.
    WouldDownload,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Downloading => "downloading",
            JobState::Verifying => "verifying",
            JobState::Extracting => "extracting",
            JobState::Succeeded => "succeeded",
            JobState::Skipped => "skipped",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
            JobState::WouldSkip => "would-skip",
            JobState::WouldDownload => "would-download",
        }
    }

    pub fn is_terminal(self) -> bool {
        self.rank() == u8::MAX
    }

    /// Position in the forward-only lifecycle; terminal states share the top rank.
    fn rank(self) -> u8 {
        match self {
            JobState::Pending => 0,
            JobState::Downloading => 1,
            JobState::Verifying => 2,
            JobState::Extracting => 3,
            JobState::Succeeded
            | JobState::Skipped
            | JobState::Failed
            | JobState::Cancelled
            | JobState::WouldSkip
            | JobState::WouldDownload => u8::MAX,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit of work: one item plus its destination and mutable run state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: JobId,
    pub item: DownloadItem,
    pub destination: PathBuf,
    pub attempt_count: u32,
    state: JobState,
}

impl Job {
    pub fn new(id: JobId, item: DownloadItem, destination: PathBuf) -> Self {
        Self {
            id,
            item,
            destination,
            attempt_count: 0,
            state: JobState::Pending,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Move the job forward. Backward moves and moves out of a terminal state
    /// are rejected and leave the state unchanged.
    pub fn advance(&mut self, next: JobState) -> bool {
        if self.state.is_terminal() || next.rank() <= self.state.rank() {
            tracing::warn!(
                job = %self.id,
                from = %self.state,
                to = %next,
                "rejected backward job state transition"
            );
            return false;
        }
        tracing::trace!(job = %self.id, from = %self.state, to = %next, "job state");
        self.state = next;
        true
    }

    /// Short human label, e.g. `Artist - Title`.
    pub fn label(&self) -> String {
        format!("{} - {}", self.item.artist, self.item.title)
    }
}

/// Builds one job per `(item, destination)` pair with dense ids.
pub fn build_jobs<I>(pairs: I) -> Vec<Job>
where
    I: IntoIterator<Item = (DownloadItem, PathBuf)>,
{
    pairs
        .into_iter()
        .enumerate()
        .map(|(i, (item, destination))| Job::new(JobId(i), item, destination))
        .collect()
}

/// Final record for one job. Produced exactly once per submitted job.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub job: Job,
    pub bytes_written: u64,
    pub error: Option<ErrorKind>,
    /// Directory the archive was extracted into, when post-processing ran.
    pub extracted_to: Option<PathBuf>,
}

impl JobResult {
    pub(crate) fn finish(mut job: Job, state: JobState) -> Self {
        job.advance(state);
        Self {
            job,
            bytes_written: 0,
            error: None,
            extracted_to: None,
        }
    }

    pub(crate) fn failed(mut job: Job, error: ErrorKind) -> Self {
        job.advance(JobState::Failed);
        Self {
            job,
            bytes_written: 0,
            error: Some(error),
            extracted_to: None,
        }
    }

    pub fn state(&self) -> JobState {
        self.job.state()
    }

    pub fn destination(&self) -> &Path {
        &self.job.destination
    }
}
