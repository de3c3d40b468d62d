//! Duplicate endpoint command.

use sourcemgr_core::{EndpointEdit, FleetManager};

use crate::error::CliError;
use crate::util::endpoint_name;

/// Duplicate an endpoint
pub async fn cmd_duplicate(
    fleet: &FleetManager,
    name: &str,
    new_name: Option<&str>,
) -> Result<(), CliError> {
    let source = fleet.find(name).await?.id();
    let id = fleet.duplicate_endpoint(source).await?;

    if let Some(label) = new_name {
        let edit = EndpointEdit {
            label: Some(label.to_string()),
            ..EndpointEdit::default()
        };
        fleet.update_endpoint(id, edit).await?;
    }

    println!("Created duplicate server '{}'", endpoint_name(fleet, id).await);
    Ok(())
}
