//! List endpoints command.

use std::fmt::Write as _;

use serde::Serialize;
use sourcemgr_core::{Endpoint, FleetManager};

use crate::cli::OutputFormat;
use crate::error::CliError;

/// One row of the endpoint list
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointRow {
    pub name: String,
    pub address: String,
    pub transfer: String,
    pub transfer_address: String,
    pub username: String,
}

impl From<&Endpoint> for EndpointRow {
    fn from(endpoint: &Endpoint) -> Self {
        Self {
            name: endpoint.display_name().to_string(),
            address: endpoint.control_address(),
            transfer: endpoint.ftp_protocol.to_string(),
            transfer_address: format!("{}:{}", endpoint.transfer_host(), endpoint.ftp_port),
            username: endpoint.ftp_username.clone(),
        }
    }
}

/// List endpoints command handler
pub async fn cmd_list(fleet: &FleetManager, format: OutputFormat) -> Result<(), CliError> {
    let mut rows = Vec::new();
    for endpoint in fleet.endpoints().await {
        rows.push(EndpointRow::from(&endpoint.snapshot().await));
    }

    match format {
        OutputFormat::Table => println!("{}", format_table(&rows)),
        OutputFormat::Json => println!("{}", format_json(&rows)?),
    }
    Ok(())
}

/// Format endpoints as a table string
#[must_use]
pub fn format_table(rows: &[EndpointRow]) -> String {
    if rows.is_empty() {
        return "No servers configured.".to_string();
    }

    let name_width = rows.iter().map(|r| r.name.len()).max().unwrap_or(4).max(4);
    let address_width = rows
        .iter()
        .map(|r| r.address.len())
        .max()
        .unwrap_or(7)
        .max(7);
    let transfer_width = 8;

    let mut output = String::new();
    let _ = writeln!(
        output,
        "{:<name_width$}  {:<address_width$}  {:<transfer_width$}  FILES",
        "NAME", "ADDRESS", "TRANSFER"
    );
    let _ = writeln!(
        output,
        "{:-<name_width$}  {:-<address_width$}  {:-<transfer_width$}  -----",
        "", "", ""
    );
    for row in rows {
        let files = if row.username.is_empty() {
            row.transfer_address.clone()
        } else {
            format!("{}@{}", row.username, row.transfer_address)
        };
        let _ = writeln!(
            output,
            "{:<name_width$}  {:<address_width$}  {:<transfer_width$}  {files}",
            row.name, row.address, row.transfer
        );
    }

    output.trim_end().to_string()
}

/// Format endpoints as JSON string
///
/// # Errors
///
/// Returns `CliError::Config` if JSON serialization fails.
pub fn format_json(rows: &[EndpointRow]) -> Result<String, CliError> {
    serde_json::to_string_pretty(rows)
        .map_err(|e| CliError::Config(format!("Failed to serialize server list: {e}")))
}
