//! RCON command execution across one or more servers.

use sourcemgr_core::{FleetManager, format_broadcast};

use crate::cli::Targets;
use crate::error::CliError;
use crate::util::resolve_targets;

/// Exec command handler.
///
/// A single target prints the bare output; several targets print one
/// section per server. Any failed server makes the command fail after all
/// output is printed.
pub async fn cmd_exec(fleet: &FleetManager, command: &str, targets: &Targets) -> Result<(), CliError> {
    let command = command.trim();
    if command.is_empty() {
        return Err(CliError::Input("command must not be empty".into()));
    }

    let ids = resolve_targets(fleet, targets).await?;
    if ids.is_empty() {
        println!("No servers configured.");
        return Ok(());
    }

    let outcomes = fleet.execute_on(&ids, command).await;
    if let [single] = outcomes.as_slice() {
        println!("{}", single.message().trim_end());
    } else {
        print!("{}", format_broadcast(&outcomes));
    }

    let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
    if failed > 0 {
        return Err(CliError::Partial {
            failed,
            total: outcomes.len(),
        });
    }
    Ok(())
}
