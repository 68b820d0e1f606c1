//! Aggregated run results and per-job progress events.

use crate::error::ErrorKind;
use crate::job::{JobResult, JobState};

/// Sent after every finished job when a progress channel is attached.
#[derive(Debug, Clone)]
pub struct JobProgress {
    pub label: String,
    pub state: JobState,
    pub bytes_written: u64,
    pub attempts: u32,
    pub error: Option<ErrorKind>,
    /// Jobs finished so far, including this one.
    pub completed: usize,
    pub total: usize,
}

impl JobProgress {
    pub(crate) fn from_result(result: &JobResult, completed: usize, total: usize) -> Self {
        Self {
            label: result.job.label(),
            state: result.state(),
            bytes_written: result.bytes_written,
            attempts: result.job.attempt_count,
            error: result.error.clone(),
            completed,
            total,
        }
    }
}

/// Per-state totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateCounts {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub would_skip: usize,
    pub would_download: usize,
}

/// Every submitted job's result, in completion order.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    results: Vec<JobResult>,
}

impl RunReport {
    pub(crate) fn new(results: Vec<JobResult>) -> Self {
        Self { results }
    }

    pub fn results(&self) -> &[JobResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    fn in_state(&self, state: JobState) -> impl Iterator<Item = &JobResult> {
        self.results.iter().filter(move |r| r.state() == state)
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &JobResult> {
        self.in_state(JobState::Succeeded)
    }

    pub fn skipped(&self) -> impl Iterator<Item = &JobResult> {
        self.in_state(JobState::Skipped)
    }

    pub fn failed(&self) -> impl Iterator<Item = &JobResult> {
        self.in_state(JobState::Failed)
    }

    pub fn cancelled(&self) -> impl Iterator<Item = &JobResult> {
        self.in_state(JobState::Cancelled)
    }

    pub fn counts(&self) -> StateCounts {
        let mut c = StateCounts::default();
        for r in &self.results {
            match r.state() {
                JobState::Succeeded => c.succeeded += 1,
                JobState::Skipped => c.skipped += 1,
                JobState::Failed => c.failed += 1,
                JobState::Cancelled => c.cancelled += 1,
                JobState::WouldSkip => c.would_skip += 1,
                JobState::WouldDownload => c.would_download += 1,
                // Not reachable for a finished job.
                JobState::Pending
                | JobState::Downloading
                | JobState::Verifying
                | JobState::Extracting => {}
            }
        }
        c
    }

    pub fn has_failures(&self) -> bool {
        self.failed().next().is_some()
    }

    /// Sum of bytes written across all jobs.
    pub fn bytes_written(&self) -> u64 {
        self.results.iter().map(|r| r.bytes_written).sum()
    }
}
