//! Command handler modules for the CLI.

mod add;
mod completions;
mod delete;
mod duplicate;
mod exec;
mod list;
mod secret;
mod show;
mod status;
mod transfer;
mod update;
mod watch;

use std::sync::Arc;

use sourcemgr_core::FleetManager;

use crate::cli::{Cli, Commands};
use crate::error::CliError;
use crate::util::{init_logging, load_settings, open_fleet, resolve_paths};

/// Sets up logging and the fleet, runs the command, then shuts the fleet
/// down. A command error wins over a shutdown error.
pub async fn run(cli: Cli) -> Result<(), CliError> {
    if let Commands::Completions { shell } = cli.command {
        return completions::cmd_completions(shell);
    }

    let paths = resolve_paths(cli.config.as_deref())?;
    let settings = load_settings(&paths).await?;
    init_logging(&settings, cli.verbose, cli.quiet)?;

    let fleet = open_fleet(settings, &paths).await?;
    let result = dispatch(&fleet, cli.command).await;
    let closed = fleet.shutdown().await;
    tracing::debug!(?closed, "CLI session finished");

    result?;
    closed.map(|_| ()).map_err(CliError::from)
}

/// Dispatch a CLI command to the appropriate handler.
async fn dispatch(fleet: &Arc<FleetManager>, command: Commands) -> Result<(), CliError> {
    match command {
        Commands::List { format } => list::cmd_list(fleet, format).await,
        Commands::Show { name } => show::cmd_show(fleet, &name).await,
        Commands::Add { fields } => add::cmd_add(fleet, fields).await,
        Commands::Update { name, fields } => update::cmd_update(fleet, &name, fields).await,
        Commands::Delete { name } => delete::cmd_delete(fleet, &name).await,
        Commands::Duplicate { name, new_name } => {
            duplicate::cmd_duplicate(fleet, &name, new_name.as_deref()).await
        }
        Commands::Status { name, format } => status::cmd_status(fleet, &name, format).await,
        Commands::Exec { command, targets } => exec::cmd_exec(fleet, &command, &targets).await,
        Commands::Upload {
            local,
            remote,
            targets,
        } => transfer::cmd_upload(fleet, &local, remote.as_deref(), &targets).await,
        Commands::Mkdir { name, path } => transfer::cmd_mkdir(fleet, &name, &path).await,
        Commands::Ls { name, path } => transfer::cmd_ls(fleet, &name, &path).await,
        Commands::Watch { interval, rounds } => watch::cmd_watch(fleet, interval, rounds).await,
        Commands::Secret(subcmd) => secret::cmd_secret(fleet, subcmd).await,
        Commands::Completions { shell } => completions::cmd_completions(shell),
    }
}
