//! Add endpoint command.

use sourcemgr_core::FleetManager;

use crate::cli::EndpointArgs;
use crate::error::CliError;
use crate::util::endpoint_edit;

/// Add endpoint command handler
pub async fn cmd_add(fleet: &FleetManager, fields: EndpointArgs) -> Result<(), CliError> {
    if fields.ip_address.as_deref().is_none_or(|ip| ip.trim().is_empty()) {
        return Err(CliError::Input("--host is required".into()));
    }

    let id = fleet.add_endpoint(endpoint_edit(fields)).await?;
    let endpoint = fleet.find(&id.to_string()).await?.snapshot().await;
    println!(
        "Added server '{}' ({})",
        endpoint.display_name(),
        endpoint.control_address()
    );
    Ok(())
}
