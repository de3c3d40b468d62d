//! Credential vault commands.

use sourcemgr_core::FleetManager;

use crate::cli::SecretCommands;
use crate::error::CliError;

/// Secret command handler
pub async fn cmd_secret(fleet: &FleetManager, subcmd: SecretCommands) -> Result<(), CliError> {
    match subcmd {
        SecretCommands::Status => cmd_secret_status(fleet).await,
        SecretCommands::Migrate => cmd_secret_migrate(fleet).await,
    }
}

async fn cmd_secret_status(fleet: &FleetManager) -> Result<(), CliError> {
    let status = fleet.secret_status().await;

    println!("Credential Vault Status");
    println!("=======================\n");
    println!(
        "Vault:      {}",
        if status.vault_available {
            "Available ✓"
        } else {
            "Unavailable (secrets are stored as plaintext)"
        }
    );
    println!("Config:     {}", fleet.config_path().display());
    println!("Sealed:     {}", status.sealed);
    println!("Plaintext:  {}", status.plaintext);
    println!("Not set:    {}", status.empty);

    if status.plaintext > 0 && status.vault_available {
        println!("\nRun 'sourcemgr secret migrate' to seal the remaining plaintext secrets.");
    }
    Ok(())
}

async fn cmd_secret_migrate(fleet: &FleetManager) -> Result<(), CliError> {
    if !fleet.vault().is_available() {
        return Err(CliError::Secret(
            "credential vault is unavailable, nothing can be sealed".into(),
        ));
    }

    let report = fleet.migrate_secrets().await?;
    for failure in &report.failures {
        eprintln!(
            "  failed: {} ({}): {}",
            failure.label, failure.field, failure.error
        );
    }

    if report.resealed == 0 && report.failures.is_empty() {
        println!("All secrets are already sealed.");
    } else {
        println!(
            "Sealed {} secret(s) across {} server(s)",
            report.resealed, report.modified
        );
    }

    if !report.failures.is_empty() {
        return Err(CliError::Secret(format!(
            "{} secret(s) could not be sealed",
            report.failures.len()
        )));
    }
    Ok(())
}
