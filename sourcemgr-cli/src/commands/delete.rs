//! Delete endpoint command.

use sourcemgr_core::FleetManager;

use crate::error::CliError;

/// Delete endpoint command handler
pub async fn cmd_delete(fleet: &FleetManager, name: &str) -> Result<(), CliError> {
    let id = fleet.find(name).await?.id();
    let removed = fleet.remove_endpoint(id).await?;
    println!(
        "Deleted server '{}' ({})",
        removed.display_name(),
        removed.control_address()
    );
    Ok(())
}
