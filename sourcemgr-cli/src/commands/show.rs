//! Show endpoint details command.

use sourcemgr_core::FleetManager;

use crate::error::CliError;

/// Show endpoint details command handler
pub async fn cmd_show(fleet: &FleetManager, name: &str) -> Result<(), CliError> {
    let managed = fleet.find(name).await?;
    let endpoint = managed.snapshot().await;
    let vault = fleet.vault();

    println!("Server Details:");
    println!("  Name:      {}", endpoint.display_name());
    if endpoint.display_name() != endpoint.label {
        println!("  Label:     {}", endpoint.label);
    }
    println!("  Address:   {}", endpoint.control_address());
    if let Some(port) = endpoint.query_port {
        println!("  Query:     {}:{port}", endpoint.ip_address);
    }
    println!("  RCON pass: {}", secret_state(vault, endpoint.stored_rcon_password()));
    println!(
        "  Files:     {} {}:{}",
        endpoint.ftp_protocol,
        endpoint.transfer_host(),
        endpoint.ftp_port
    );
    if !endpoint.ftp_username.is_empty() {
        println!("  Username:  {}", endpoint.ftp_username);
    }
    println!("  File pass: {}", secret_state(vault, endpoint.stored_ftp_password()));
    if !endpoint.ftp_root_directory.is_empty() {
        println!("  Root dir:  {}", endpoint.ftp_root_directory);
    }

    Ok(())
}

/// How a secret is stored, never its value
fn secret_state(
    vault: &sourcemgr_core::CredentialVault,
    stored: &sourcemgr_core::StoredSecret,
) -> &'static str {
    if stored.is_empty() {
        "not set"
    } else if vault.is_sealed(stored.as_stored()) {
        "sealed"
    } else {
        "plaintext"
    }
}
