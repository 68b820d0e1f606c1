//! CLI command handlers, one file per command.

mod config;
mod sync;

pub use config::run_config;
pub use sync::run_sync;
