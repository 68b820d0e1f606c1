//! `mediasync sync` – download a manifest's items into the collection.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use mediasync_core::catalog::{CatalogClient, EntryFilter, ManifestCatalog};
use mediasync_core::config::SyncConfig;
use mediasync_core::engine::{JobProgress, RunReport, WorkerPool};
use mediasync_core::fetcher::{CurlFetcher, Fetcher};
use mediasync_core::job::{build_jobs, JobState};
use mediasync_core::layout::{assign_destinations, TemplateLayout};
use tokio::sync::mpsc;

use crate::cli::SyncArgs;

const MIB: f64 = 1_048_576.0;

/// Returns `Ok(false)` when at least one job failed.
pub async fn run_sync(mut cfg: SyncConfig, args: &SyncArgs) -> Result<bool> {
    args.apply_to(&mut cfg);
    let mut engine = cfg.engine_config().context("invalid settings")?;
    engine.force_overwrite = args.force;
    engine.dry_run = args.dry_run;

    let root = match &cfg.download_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };
    let layout = TemplateLayout::new(&root, &cfg.filename_format, cfg.format)
        .context("invalid filename format")?;

    let entries = ManifestCatalog::new(&args.manifest).entries()?;
    let total_entries = entries.len();
    let filter = EntryFilter {
        include_hidden: args.include_hidden,
        since: args.download_since,
    };
    let items = filter.apply(entries);
    if items.is_empty() {
        println!("Nothing to download ({} catalog entries filtered out).", total_entries);
        return Ok(true);
    }

    let destinations = assign_destinations(&layout, &items);
    let jobs = build_jobs(items.into_iter().zip(destinations));
    tracing::info!(
        jobs = jobs.len(),
        root = %root.display(),
        dry_run = engine.dry_run,
        "starting sync"
    );

    let fetcher: Arc<dyn Fetcher> = Arc::new(CurlFetcher::new(cfg.curl_options()));
    let (progress_tx, progress_rx) = mpsc::unbounded_channel::<JobProgress>();
    let pool = WorkerPool::new(engine, fetcher)?.with_progress(progress_tx);

    let cancel = pool.cancellation_token();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted: finishing downloads in progress, skipping the rest.");
            cancel.cancel();
        }
    });
    let printer = tokio::spawn(print_progress(progress_rx));

    let report = pool.run(jobs).await;
    // Dropping the pool closes the progress channel so the printer ends.
    drop(pool);
    ctrl_c.abort();
    let _ = printer.await;

    print_summary(&report, &root);
    Ok(!report.has_failures())
}

async fn print_progress(mut rx: mpsc::UnboundedReceiver<JobProgress>) {
    while let Some(p) = rx.recv().await {
        let detail = match (&p.error, p.state) {
            (Some(e), _) => format!(": {}", e),
            (None, JobState::Succeeded) => {
                format!(" ({:.1} MiB)", p.bytes_written as f64 / MIB)
            }
            _ => String::new(),
        };
        let retries = if p.attempts > 1 {
            format!(" after {} attempts", p.attempts)
        } else {
            String::new()
        };
        println!(
            "[{:>w$}/{}] {:<14} {}{}{}",
            p.completed,
            p.total,
            p.state.as_str(),
            p.label,
            retries,
            detail,
            w = p.total.to_string().len()
        );
    }
}

fn print_summary(report: &RunReport, root: &Path) {
    let c = report.counts();
    println!();
    if c.would_download + c.would_skip > 0 {
        println!(
            "Dry run in {}: {} would be downloaded, {} already present.",
            root.display(),
            c.would_download,
            c.would_skip
        );
        return;
    }
    println!(
        "Downloaded {}, skipped {}, failed {}, cancelled {} ({:.1} MiB) into {}",
        c.succeeded,
        c.skipped,
        c.failed,
        c.cancelled,
        report.bytes_written() as f64 / MIB,
        root.display()
    );
    for r in report.failed() {
        let reason = r
            .error
            .as_ref()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".to_string());
        println!("  failed: {} ({}): {}", r.job.label(), r.job.item.url, reason);
    }
}
