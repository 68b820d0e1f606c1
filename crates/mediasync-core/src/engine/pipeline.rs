//! Per-job pipeline: check -> download (with retries) -> verify -> install ->
//! extract.

use std::io;
use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::error::ErrorKind;
use crate::extract::extract_archive;
use crate::fetcher::{FetchOutcome, FetchRequest, Fetcher};
use crate::idempotency::{check_existing, Decision};
use crate::job::{Job, JobResult, JobState};
use crate::retry::{classify, run_with_retry, FetchError, RetryError, RetryPolicy};
use crate::storage::{discard_path, install, part_path, sweep_stale_parts};

/// Shared, read-only state for every job of a run.
pub(crate) struct PipelineContext {
    pub config: EngineConfig,
    pub policy: RetryPolicy,
    pub fetcher: Arc<dyn Fetcher>,
    pub cancel: CancellationToken,
}

/// A finished job plus whether it made any request (drives pacing).
pub(crate) struct Processed {
    pub result: JobResult,
    pub touched_network: bool,
}

impl Processed {
    fn offline(result: JobResult) -> Self {
        Self {
            result,
            touched_network: false,
        }
    }

    fn online(result: JobResult) -> Self {
        Self {
            result,
            touched_network: true,
        }
    }
}

/// Map a fetch failure to the job error reported to the caller.
pub(crate) fn fetch_error_kind(e: &FetchError) -> ErrorKind {
    match e {
        FetchError::Storage(io) => ErrorKind::filesystem("writing part file", io),
        other => ErrorKind::Network {
            transient: classify(other).is_transient(),
            message: other.to_string(),
        },
    }
}

/// Await a blocking task, re-raising its panic in the current task.
async fn join_blocking<T>(handle: tokio::task::JoinHandle<T>) -> Result<T, String> {
    match handle.await {
        Ok(v) => Ok(v),
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => Err(e.to_string()),
    }
}

pub(crate) async fn process_job(ctx: Arc<PipelineContext>, mut job: Job) -> Processed {
    let cfg = &ctx.config;

    let check = match check_existing(&job.destination, job.item.expected_size) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(job = %job.id, path = %job.destination.display(), error = %e, "destination check failed");
            return Processed::offline(JobResult::failed(
                job,
                ErrorKind::filesystem("checking destination", &e),
            ));
        }
    };
    let decision = check.decide(cfg.force_overwrite, cfg.skip_unverified);
    tracing::debug!(job = %job.id, ?check, ?decision, "idempotency check");

    if cfg.dry_run {
        let state = match decision {
            Decision::Skip => JobState::WouldSkip,
            Decision::Download { .. } => JobState::WouldDownload,
        };
        return Processed::offline(JobResult::finish(job, state));
    }

    let existing_len = match decision {
        Decision::Skip => {
            tracing::debug!(job = %job.id, path = %job.destination.display(), "already present, skipping");
            return Processed::offline(JobResult::finish(job, JobState::Skipped));
        }
        Decision::Download { existing_len } => existing_len,
    };

    if let Some(parent) = job.destination.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            let kind = ErrorKind::filesystem(&format!("creating {}", parent.display()), &e);
            return Processed::offline(JobResult::failed(job, kind));
        }
    }
    sweep_stale_parts(&job.destination);

    job.advance(JobState::Downloading);
    let request = FetchRequest {
        url: job.item.url.clone(),
        part_path: part_path(&job.destination, job.id),
        skip_if_length: existing_len,
    };

    let fetched = run_with_retry(&ctx.policy, &ctx.cancel, |attempt| {
        let fetcher = Arc::clone(&ctx.fetcher);
        let request = request.clone();
        let id = job.id;
        async move {
            tracing::debug!(job = %id, attempt, url = %request.url, "fetching");
            let handle = tokio::task::spawn_blocking(move || fetcher.fetch(&request));
            join_blocking(handle).await.unwrap_or_else(|e| Err(FetchError::Aborted(e)))
        }
    })
    .await;

    let (outcome, attempts) = match fetched {
        Ok(r) => (r.value, r.attempts),
        Err(RetryError::Cancelled { attempts, last }) => {
            job.attempt_count = attempts;
            tracing::info!(job = %job.id, attempts, last_error = %last, "cancelled while waiting to retry");
            return Processed::online(JobResult::finish(job, JobState::Cancelled));
        }
        Err(e) => {
            job.attempt_count = e.attempts();
            tracing::warn!(job = %job.id, label = %job.label(), error = %e, "download failed");
            let kind = fetch_error_kind(e.last_error());
            return Processed::online(JobResult::failed(job, kind));
        }
    };
    job.attempt_count = attempts;

    let bytes_written = match outcome {
        FetchOutcome::MatchesExisting { remote_len } => {
            tracing::debug!(job = %job.id, remote_len, "remote length matches local file, skipping");
            return Processed::online(JobResult::finish(job, JobState::Skipped));
        }
        FetchOutcome::Completed {
            bytes_written,
            filename,
        } => {
            if let Some(served) = filename {
                if !same_extension(&served, &job.destination) {
                    tracing::warn!(
                        job = %job.id,
                        served = %served,
                        path = %job.destination.display(),
                        "served file type differs from destination extension"
                    );
                }
            }
            bytes_written
        }
    };

    job.advance(JobState::Verifying);
    if let Err(kind) = verify_part(&request.part_path, bytes_written) {
        discard_path(&request.part_path);
        return Processed::online(JobResult::failed(job, kind));
    }
    if let Some(expected) = job.item.expected_size {
        if expected != bytes_written {
            tracing::warn!(
                job = %job.id,
                expected,
                received = bytes_written,
                "catalog size differs from served size"
            );
        }
    }

    if let Err(e) = install(&request.part_path, &job.destination) {
        discard_path(&request.part_path);
        let kind = ErrorKind::filesystem(&format!("installing {}", job.destination.display()), &e);
        return Processed::online(JobResult::failed(job, kind));
    }
    tracing::info!(
        job = %job.id,
        path = %job.destination.display(),
        bytes = bytes_written,
        attempts,
        "installed"
    );

    let mut extracted_to = None;
    if cfg.extract_enabled && job.item.is_archive {
        job.advance(JobState::Extracting);
        let archive = job.destination.clone();
        let item = job.item.clone();
        let handle = tokio::task::spawn_blocking(move || extract_archive(&archive, &item, true));
        match join_blocking(handle).await {
            Ok(Ok(dir)) => extracted_to = dir,
            Ok(Err(e)) => {
                let mut result = JobResult::failed(job, ErrorKind::Extraction(e.to_string()));
                result.bytes_written = bytes_written;
                return Processed::online(result);
            }
            Err(e) => {
                let mut result = JobResult::failed(job, ErrorKind::Internal(e));
                result.bytes_written = bytes_written;
                return Processed::online(result);
            }
        }
    }

    let mut result = JobResult::finish(job, JobState::Succeeded);
    result.bytes_written = bytes_written;
    result.extracted_to = extracted_to;
    Processed::online(result)
}

fn verify_part(path: &Path, bytes_written: u64) -> Result<(), ErrorKind> {
    let len = std::fs::metadata(path)
        .map_err(|e| ErrorKind::filesystem("reading part file", &e))?
        .len();
    if len != bytes_written {
        let e = io::Error::new(
            io::ErrorKind::InvalidData,
            format!("part file holds {} bytes, {} were written", len, bytes_written),
        );
        return Err(ErrorKind::filesystem("verifying download", &e));
    }
    Ok(())
}

/// Case-insensitive comparison of the served filename's extension with the
/// destination's. A served name without an extension matches anything.
fn same_extension(served: &str, destination: &Path) -> bool {
    let Some(served_ext) = Path::new(served).extension() else {
        return true;
    };
    destination
        .extension()
        .map(|d| d.eq_ignore_ascii_case(served_ext))
        .unwrap_or(false)
}
