//! `mediasync config` – show where settings live and what they are.

use anyhow::Result;
use mediasync_core::config::{self, SyncConfig};
use mediasync_core::logging;

pub fn run_config(cfg: &SyncConfig) -> Result<()> {
    println!("config file: {}", config::config_path()?.display());
    if let Ok(path) = logging::log_path() {
        println!("log file:    {}", path.display());
    }
    println!();
    print!("{}", toml::to_string_pretty(cfg)?);
    Ok(())
}
