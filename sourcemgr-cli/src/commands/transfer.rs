//! File transfer commands: upload, mkdir and ls.

use std::path::Path;

use sourcemgr_core::config::expand_path;
use sourcemgr_core::fleet::{describe_error, transfer_error_prefix};
use sourcemgr_core::protocol::{format_listing, normalize_path};
use sourcemgr_core::{FleetManager, SourceMgrError};
use uuid::Uuid;

use crate::cli::Targets;
use crate::error::CliError;
use crate::util::resolve_targets;

/// Name and `"FTP Error"` / `"SFTP Error"` prefix of an endpoint
async fn describe_target(fleet: &FleetManager, id: Uuid) -> Result<(String, &'static str), CliError> {
    let endpoint = fleet
        .get(id)
        .await
        .ok_or_else(|| SourceMgrError::EndpointNotFound(id.to_string()))?
        .snapshot()
        .await;
    Ok((
        endpoint.display_name().to_string(),
        transfer_error_prefix(endpoint.ftp_protocol),
    ))
}

/// Upload command handler. Directories are uploaded recursively.
///
/// Every target is attempted; the command fails afterwards if any
/// server could not take the upload.
pub async fn cmd_upload(
    fleet: &FleetManager,
    local: &Path,
    remote: Option<&str>,
    targets: &Targets,
) -> Result<(), CliError> {
    let local = expand_path(&local.to_string_lossy());
    let metadata = tokio::fs::metadata(&local)
        .await
        .map_err(|e| CliError::Input(format!("{}: {e}", local.display())))?;

    let ids = resolve_targets(fleet, targets).await?;
    let mut failed = 0;
    for &id in &ids {
        let (name, prefix) = describe_target(fleet, id).await?;
        let remote = match remote {
            Some(remote) => remote.to_string(),
            None => fleet.suggest_remote_path(id, &local).await?,
        };

        let outcome = if metadata.is_dir() {
            fleet.upload_tree(id, &local, &remote).await.map(|report| {
                let complete = report.is_complete();
                (report.message(), complete)
            })
        } else {
            fleet.try_upload(id, &local, &remote).await.map(|_| {
                let message = format!("File uploaded successfully to {}", normalize_path(&remote));
                (message, true)
            })
        };

        match outcome {
            Ok((message, complete)) => {
                println!("[{name}] {message}");
                if !complete {
                    failed += 1;
                }
            }
            Err(e @ (SourceMgrError::Protocol(_) | SourceMgrError::Probe(_))) => {
                println!("[{name}] {}", describe_error(prefix, &e));
                failed += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    if failed > 0 {
        return Err(CliError::Partial {
            failed,
            total: ids.len(),
        });
    }
    Ok(())
}

fn transfer_failure(prefix: &str, error: &SourceMgrError) -> CliError {
    if error.is_connection_failure() {
        CliError::Connection(describe_error(prefix, error))
    } else {
        CliError::Config(error.to_string())
    }
}

/// Mkdir command handler
pub async fn cmd_mkdir(fleet: &FleetManager, name: &str, path: &str) -> Result<(), CliError> {
    let id = fleet.find(name).await?.id();
    let (_, prefix) = describe_target(fleet, id).await?;
    fleet
        .try_create_directory(id, path)
        .await
        .map_err(|e| transfer_failure(prefix, &e))?;
    println!("Directory created: {}", normalize_path(path));
    Ok(())
}

/// Ls command handler
pub async fn cmd_ls(fleet: &FleetManager, name: &str, path: &str) -> Result<(), CliError> {
    let id = fleet.find(name).await?.id();
    let (_, prefix) = describe_target(fleet, id).await?;
    let (shown, entries) = fleet
        .browse(id, path)
        .await
        .map_err(|e| transfer_failure(prefix, &e))?;
    print!("{}", format_listing(&shown, &entries));
    Ok(())
}
