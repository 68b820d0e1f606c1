//! CLI parse tests.

use super::{Cli, CliCommand, SyncArgs};
use clap::Parser;

pub(super) fn parse(args: &[&str]) -> CliCommand {
    let cli = Cli::try_parse_from(args).unwrap();
    cli.command
}

pub(super) fn parse_sync(args: &[&str]) -> SyncArgs {
    match parse(args) {
        CliCommand::Sync(a) => a,
        other => panic!("expected Sync, got {:?}", other),
    }
}
