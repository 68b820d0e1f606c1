//! Download orchestration: worker pool, per-job pipeline, run report.
//!
//! The caller builds `Job`s (destinations already resolved), hands them to
//! `WorkerPool::run`, and gets back a `RunReport` holding exactly one
//! `JobResult` per job. Failures stay inside their job; the run always
//! completes.

mod pipeline;
mod pool;
mod report;


pub use crate::config::{EngineConfig, MAX_CONCURRENCY};
pub use pool::WorkerPool;
pub use report::{JobProgress, RunReport, StateCounts};
