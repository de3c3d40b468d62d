//! Shared utility functions used across command modules.

use std::path::Path;
use std::sync::Arc;

use secrecy::SecretString;
use sourcemgr_core::{
    AppSettings, Backends, ConfigPaths, EndpointEdit, FileTransferProtocol, FleetManager,
    TracingLevel, init_tracing,
};
use uuid::Uuid;

use crate::cli::{EndpointArgs, Targets, TransferArg};
use crate::error::CliError;

/// Resolves configuration paths, honouring the `--config` override
pub fn resolve_paths(config_path: Option<&Path>) -> Result<ConfigPaths, CliError> {
    let paths = ConfigPaths::resolve()
        .map_err(|e| CliError::Config(format!("Failed to locate configuration: {e}")))?;
    Ok(match config_path {
        Some(dir) => paths.with_config_dir(dir),
        None => paths,
    })
}

/// Loads `settings.toml`, falling back to defaults when it is missing
pub async fn load_settings(paths: &ConfigPaths) -> Result<AppSettings, CliError> {
    AppSettings::load(&paths.settings_file())
        .await
        .map_err(|e| CliError::Config(format!("Failed to load settings: {e}")))
}

/// Starts logging. `-q` keeps errors only, `-v` raises the configured level;
/// either flag also overrides a configured filter.
pub fn init_logging(settings: &AppSettings, verbose: u8, quiet: bool) -> Result<(), CliError> {
    let level = match (quiet, verbose) {
        (true, _) => TracingLevel::Error,
        (false, 0) => settings.logging.level,
        (false, n) => TracingLevel::from_verbosity(n, false).unwrap_or(settings.logging.level),
    };
    let mut config = settings
        .logging
        .tracing_config()
        .with_level(level)
        .with_thread_ids(false);
    if quiet || verbose > 0 {
        config.filter = None;
    }
    init_tracing(&config).map_err(|e| CliError::Logging(e.to_string()))
}

/// Opens the fleet over the real network backends
pub async fn open_fleet(
    settings: AppSettings,
    paths: &ConfigPaths,
) -> Result<Arc<FleetManager>, CliError> {
    let fleet = FleetManager::open(settings, paths, Backends::network(paths)).await?;
    let report = fleet.load_report();
    if report.resealed > 0 {
        eprintln!(
            "Sealed {} plaintext secret(s) in {}",
            report.resealed,
            fleet.config_path().display()
        );
    }
    Ok(Arc::new(fleet))
}

/// Resolves `--server`/`--all` to endpoint ids in declaration order
pub async fn resolve_targets(fleet: &FleetManager, targets: &Targets) -> Result<Vec<Uuid>, CliError> {
    if targets.all {
        let mut ids = Vec::new();
        for endpoint in fleet.endpoints().await {
            ids.push(endpoint.id());
        }
        return Ok(ids);
    }
    let mut ids = Vec::with_capacity(targets.servers.len());
    for name in &targets.servers {
        let id = fleet.find(name).await?.id();
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

/// Endpoint label for messages
pub async fn endpoint_name(fleet: &FleetManager, id: Uuid) -> String {
    match fleet.get(id).await {
        Some(endpoint) => endpoint.snapshot().await.display_name().to_string(),
        None => id.to_string(),
    }
}

/// Converts command-line fields into an edit
#[must_use]
pub fn endpoint_edit(args: EndpointArgs) -> EndpointEdit {
    EndpointEdit {
        label: args.label,
        ip_address: args.ip_address,
        rcon_port: args.rcon_port,
        rcon_password: args.rcon_password.map(SecretString::from),
        ftp_host: args.ftp_host,
        ftp_port: args.ftp_port,
        ftp_username: args.ftp_username,
        ftp_password: args.ftp_password.map(SecretString::from),
        ftp_root_directory: args.root_dir,
        ftp_protocol: args.transfer.map(|t| match t {
            TransferArg::Ftp => FileTransferProtocol::Ftp,
            TransferArg::Sftp => FileTransferProtocol::Sftp,
        }),
        query_port: args.query_port,
    }
}
