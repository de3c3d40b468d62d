//! Results of fleet operations

use std::fmt::Write as _;
use std::path::PathBuf;

use serde::Serialize;
use uuid::Uuid;

use crate::connection::PoolStatsSnapshot;
use crate::error::{SourceMgrError, SourceMgrResult};
use crate::models::FileTransferProtocol;

/// Prefix of user-facing RCON failures
pub const RCON_ERROR_PREFIX: &str = "RCON Error";

/// Prefix of user-facing failures for a file-transfer protocol
#[must_use]
pub const fn transfer_error_prefix(protocol: FileTransferProtocol) -> &'static str {
    match protocol {
        FileTransferProtocol::Ftp => "FTP Error",
        FileTransferProtocol::Sftp => "SFTP Error",
    }
}

/// Renders an error the way single-endpoint operations report it
#[must_use]
pub fn describe_error(prefix: &str, error: &SourceMgrError) -> String {
    format!("{prefix}: {error}")
}

/// Output of one command sent to one endpoint
#[derive(Debug)]
pub struct CommandOutcome {
    /// Endpoint runtime id
    pub id: Uuid,
    /// Display name when the command ran
    pub name: String,
    /// Command output or failure
    pub result: SourceMgrResult<String>,
}

impl CommandOutcome {
    /// Returns true if the command produced output
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// Output text, or the descriptive error
    #[must_use]
    pub fn message(&self) -> String {
        match &self.result {
            Ok(text) => text.clone(),
            Err(e) => describe_error(RCON_ERROR_PREFIX, e),
        }
    }
}

/// Renders broadcast outcomes with a header per endpoint
#[must_use]
pub fn format_broadcast(outcomes: &[CommandOutcome]) -> String {
    let mut out = String::new();
    for outcome in outcomes {
        let _ = writeln!(out, "=== {} ===", outcome.name);
        let message = outcome.message();
        out.push_str(message.trim_end());
        out.push_str("\n\n");
    }
    out
}

/// One file a folder upload could not send
#[derive(Debug, Clone, Serialize)]
pub struct UploadFailure {
    /// Local file
    pub local: PathBuf,
    /// Intended remote path
    pub remote: String,
    /// What went wrong
    pub error: String,
}

/// Outcome of a recursive folder upload
#[derive(Debug, Clone, Default, Serialize)]
pub struct UploadReport {
    /// Remote directory the tree was uploaded into
    pub remote_root: String,
    /// Files sent
    pub files: usize,
    /// Bytes sent
    pub bytes: u64,
    /// Files that failed
    pub failures: Vec<UploadFailure>,
}

impl UploadReport {
    /// Returns true if every file was sent
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// One-line summary followed by any failures
    #[must_use]
    pub fn message(&self) -> String {
        let mut out = format!(
            "Uploaded {} file(s), {} bytes to {}",
            self.files, self.bytes, self.remote_root
        );
        for failure in &self.failures {
            let _ = write!(
                out,
                "\n  failed: {} -> {}: {}",
                failure.local.display(),
                failure.remote,
                failure.error
            );
        }
        out
    }
}

/// Sealed-storage state of the stored secrets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SecretStatus {
    /// Whether the vault has key material
    pub vault_available: bool,
    /// Secrets stored sealed
    pub sealed: usize,
    /// Secrets still stored as plaintext
    pub plaintext: usize,
    /// Secret slots left empty
    pub empty: usize,
}

/// Counters of the four session pools
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FleetPoolStats {
    /// RCON pool
    pub rcon: PoolStatsSnapshot,
    /// Query pool
    pub query: PoolStatsSnapshot,
    /// FTP pool
    pub ftp: PoolStatsSnapshot,
    /// SFTP pool
    pub sftp: PoolStatsSnapshot,
}
