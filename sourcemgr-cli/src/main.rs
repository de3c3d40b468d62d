//! `SourceMgr` CLI - Command-line interface for the `SourceMgr` fleet manager
//!
//! Provides commands for managing game server endpoints, polling their live
//! status, running RCON commands across the fleet, uploading files over
//! FTP/SFTP and migrating stored credentials.

mod cli;
mod commands;
mod error;
mod util;

use clap::Parser;
use cli::Cli;

use crate::error::CliError;

fn main() {
    let cli = Cli::parse();
    let quiet = cli.quiet;

    let result = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::Config(format!("Failed to create async runtime: {e}")))
        .and_then(|runtime| runtime.block_on(commands::run(cli)));

    if let Err(e) = result {
        if !quiet {
            eprintln!("Error: {e}");
        }
        std::process::exit(e.exit_code());
    }
}
