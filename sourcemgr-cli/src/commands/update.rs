//! Update endpoint command.

use sourcemgr_core::FleetManager;

use crate::cli::EndpointArgs;
use crate::error::CliError;
use crate::util::endpoint_edit;

/// Update endpoint command handler
pub async fn cmd_update(
    fleet: &FleetManager,
    name: &str,
    fields: EndpointArgs,
) -> Result<(), CliError> {
    let edit = endpoint_edit(fields);
    if edit.is_empty() {
        return Err(CliError::Input("nothing to update".into()));
    }

    let id = fleet.find(name).await?.id();
    let changed = fleet.update_endpoint(id, edit).await?;
    let label = crate::util::endpoint_name(fleet, id).await;
    if changed {
        println!("Updated server '{label}'");
    } else {
        println!("Server '{label}' is unchanged");
    }
    Ok(())
}
