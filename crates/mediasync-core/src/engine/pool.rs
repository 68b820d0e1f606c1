//! Bounded worker pool over a shared job queue.
//!
//! All jobs go on the queue before any worker starts. Each worker pops a job,
//! runs its pipeline in a task of its own (so a panic becomes a `Failed`
//! result instead of killing the worker), sends the result, and pauses for
//! the pacing delay before taking the next job if it went to the network.

use std::any::Any;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::pipeline::{process_job, PipelineContext, Processed};
use super::report::{JobProgress, RunReport};
use crate::config::EngineConfig;
use crate::error::{ConfigError, ErrorKind};
use crate::fetcher::Fetcher;
use crate::job::{Job, JobResult, JobState};
use crate::retry::RetryPolicy;

type Queue = Arc<Mutex<VecDeque<Job>>>;

fn pop(queue: &Queue) -> Option<Job> {
    queue
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .pop_front()
}

fn is_drained(queue: &Queue) -> bool {
    queue
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .is_empty()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "job panicked".to_string()
    }
}

/// Runs a batch of jobs with at most `concurrency` in flight.
pub struct WorkerPool {
    config: EngineConfig,
    fetcher: Arc<dyn Fetcher>,
    cancel: CancellationToken,
    progress: Option<mpsc::UnboundedSender<JobProgress>>,
}

impl WorkerPool {
    /// Validates `config`; nothing runs when it is rejected.
    pub fn new(config: EngineConfig, fetcher: Arc<dyn Fetcher>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            fetcher,
            cancel: CancellationToken::new(),
            progress: None,
        })
    }

    /// Use `token` to stop the run early. Queued jobs end `Cancelled`;
    /// in-flight transfers finish.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Report every finished job on `tx`.
    pub fn with_progress(mut self, tx: mpsc::UnboundedSender<JobProgress>) -> Self {
        self.progress = Some(tx);
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run every job to a terminal state. Always returns one result per job.
    pub async fn run(&self, jobs: Vec<Job>) -> RunReport {
        let total = jobs.len();
        if total == 0 {
            return RunReport::default();
        }
        let workers = self.config.concurrency.min(total);
        tracing::info!(jobs = total, workers, dry_run = self.config.dry_run, "run starting");

        let queue: Queue = Arc::new(Mutex::new(jobs.into_iter().collect()));
        let ctx = Arc::new(PipelineContext {
            config: self.config.clone(),
            policy: RetryPolicy::new(self.config.max_attempts, self.config.retry_wait),
            fetcher: Arc::clone(&self.fetcher),
            cancel: self.cancel.clone(),
        });

        let (tx, mut rx) = mpsc::unbounded_channel::<JobResult>();
        let mut join_set = JoinSet::new();
        for index in 0..workers {
            join_set.spawn(worker(index, Arc::clone(&ctx), Arc::clone(&queue), tx.clone()));
        }
        drop(tx);

        let mut results = Vec::with_capacity(total);
        while let Some(result) = rx.recv().await {
            self.record(result, &mut results, total);
        }
        while let Some(joined) = join_set.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "worker task ended abnormally");
            }
        }

        // Whatever is still queued was never started.
        while let Some(job) = pop(&queue) {
            self.record(JobResult::finish(job, JobState::Cancelled), &mut results, total);
        }

        let report = RunReport::new(results);
        let c = report.counts();
        tracing::info!(
            succeeded = c.succeeded,
            skipped = c.skipped,
            failed = c.failed,
            cancelled = c.cancelled,
            would_download = c.would_download,
            would_skip = c.would_skip,
            "run finished"
        );
        report
    }

    fn record(&self, result: JobResult, results: &mut Vec<JobResult>, total: usize) {
        if let Some(tx) = &self.progress {
            let _ = tx.send(JobProgress::from_result(&result, results.len() + 1, total));
        }
        results.push(result);
    }
}

/// Pops and runs jobs until the queue is empty or the run is cancelled.
///
/// After a job that made a request, the worker waits `pacing_delay` before
/// taking the next one. No wait follows jobs that never reached the network
/// (skipped, dry run, failed before the first request), and none once the
/// queue is drained. Cancellation cuts the wait short.
async fn worker(
    index: usize,
    ctx: Arc<PipelineContext>,
    queue: Queue,
    results: mpsc::UnboundedSender<JobResult>,
) {
    tracing::debug!(worker = index, "worker started");
    loop {
        if ctx.cancel.is_cancelled() {
            break;
        }
        let Some(job) = pop(&queue) else {
            break;
        };
        let snapshot = job.clone();
        let processed = match tokio::spawn(process_job(Arc::clone(&ctx), job)).await {
            Ok(p) => p,
            Err(e) => {
                let message = if e.is_panic() {
                    panic_message(e.into_panic().as_ref())
                } else {
                    e.to_string()
                };
                tracing::error!(worker = index, job = %snapshot.id, %message, "job pipeline panicked");
                Processed {
                    result: JobResult::failed(snapshot, ErrorKind::Internal(message)),
                    touched_network: true,
                }
            }
        };
        let touched_network = processed.touched_network;
        if results.send(processed.result).is_err() {
            break;
        }
        let pacing = ctx.config.pacing_delay;
        if touched_network && !pacing.is_zero() && !is_drained(&queue) {
            tokio::select! {
                _ = tokio::time::sleep(pacing) => {}
                _ = ctx.cancel.cancelled() => break,
            }
        }
    }
    tracing::debug!(worker = index, "worker stopped");
}
