//! CLI for the mediasync collection downloader.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use mediasync_core::config::{self, SyncConfig};
use mediasync_core::layout::AudioFormat;

use commands::{run_config, run_sync};

/// Top-level CLI for mediasync.
#[derive(Debug, Parser)]
#[command(name = "mediasync")]
#[command(about = "mediasync: download a purchased music collection", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download every item of a catalog manifest that is not already on disk.
    Sync(SyncArgs),

    /// Show the config file location and effective settings.
    Config,
}

/// Flags for `mediasync sync`. Unset flags fall back to config.toml.
#[derive(Debug, Clone, Args)]
pub struct SyncArgs {
    /// JSON manifest of catalog entries.
    pub manifest: PathBuf,

    /// Collection root (default: config `download_dir`, else the current directory).
    #[arg(short = 'd', long = "directory", value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Filename template; placeholders {artist}, {title}, {item_id}.
    #[arg(long, value_name = "TEMPLATE")]
    pub filename_format: Option<String>,

    /// Encoding whose extension is used when the URL has none.
    #[arg(short = 'f', long)]
    pub format: Option<AudioFormat>,

    /// Number of parallel downloads (1-32).
    #[arg(short = 'p', long, value_name = "N")]
    pub parallel_downloads: Option<usize>,

    /// Re-download files even when their size matches.
    #[arg(long)]
    pub force: bool,

    /// Keep existing files whose size cannot be verified.
    #[arg(long)]
    pub skip_unverified: bool,

    /// Seconds each worker waits after a download.
    #[arg(long, value_name = "SECS")]
    pub wait_after_download: Option<f64>,

    /// Attempts per file before giving up.
    #[arg(long, value_name = "N")]
    pub max_download_attempts: Option<u32>,

    /// Seconds to wait between attempts.
    #[arg(long, value_name = "SECS")]
    pub retry_wait: Option<f64>,

    /// Also download items hidden from the collection.
    #[arg(long)]
    pub include_hidden: bool,

    /// Only download items purchased on or after this date.
    #[arg(long, value_name = "YYYY-MM-DD", value_parser = parse_date)]
    pub download_since: Option<NaiveDate>,

    /// Extract album archives and delete them afterwards.
    #[arg(short = 'x', long)]
    pub extract: bool,

    /// Report what would be downloaded without touching anything.
    #[arg(long)]
    pub dry_run: bool,
}

fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("{}: expected YYYY-MM-DD", e))
}

impl SyncArgs {
    /// Overlay the flags that were given onto the file configuration.
    pub fn apply_to(&self, cfg: &mut SyncConfig) {
        if let Some(d) = &self.directory {
            cfg.download_dir = Some(d.clone());
        }
        if let Some(f) = &self.filename_format {
            cfg.filename_format = f.clone();
        }
        if let Some(f) = self.format {
            cfg.format = f;
        }
        if let Some(n) = self.parallel_downloads {
            cfg.parallel_downloads = n;
        }
        if let Some(s) = self.wait_after_download {
            cfg.wait_after_download_secs = s;
        }
        if let Some(n) = self.max_download_attempts {
            cfg.max_download_attempts = n;
        }
        if let Some(s) = self.retry_wait {
            cfg.retry_wait_secs = s;
        }
        cfg.extract |= self.extract;
        cfg.skip_unverified |= self.skip_unverified;
    }
}

impl CliCommand {
    /// Parse arguments and run. `Ok(false)` means the run finished with
    /// failed jobs.
    pub async fn run_from_args() -> Result<bool> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Sync(args) => run_sync(cfg, &args).await,
            CliCommand::Config => {
                run_config(&cfg)?;
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests;
