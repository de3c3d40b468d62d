//! Protocol-neutral file transfer operations
//!
//! Works on any [`FileTransferSession`], so FTP/FTPS and SFTP share the same
//! directory-walk and listing logic.

use std::fmt::Write as _;
use std::path::Path;

use super::{FileTransferSession, RemoteEntry};
use crate::error::ProtocolResult;

/// Converts backslashes to `/` and collapses repeated separators.
///
/// A trailing separator is dropped unless the path is the root.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let replaced = path.trim().replace('\\', "/");
    let mut out = String::with_capacity(replaced.len());
    for c in replaced.chars() {
        if c == '/' && out.ends_with('/') {
            continue;
        }
        out.push(c);
    }
    if out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    out
}

/// Parent of a remote path; `None` for the root or a bare name
#[must_use]
pub fn parent_directory(path: &str) -> Option<String> {
    let normalized = normalize_path(path);
    match normalized.rfind('/') {
        Some(0) if normalized.len() > 1 => Some("/".to_string()),
        Some(0) | None => None,
        Some(idx) => Some(normalized[..idx].to_string()),
    }
}

/// Joins a remote base and a relative path with `/`
#[must_use]
pub fn join_remote(base: &str, relative: &str) -> String {
    let relative = normalize_path(relative);
    let relative = relative.trim_start_matches('/');
    let base = normalize_path(base);
    if base.is_empty() {
        relative.to_string()
    } else if relative.is_empty() {
        base
    } else if base.ends_with('/') {
        format!("{base}{relative}")
    } else {
        format!("{base}/{relative}")
    }
}

/// Default remote path for a local file: its name under `root`
#[must_use]
pub fn suggest_remote_path(local: &Path, root: &str) -> String {
    let name = local
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if root.is_empty() {
        name
    } else {
        join_remote(root, &name)
    }
}

/// Creates a remote directory.
///
/// With `recursive`, every missing component is created in turn: absolute
/// paths are walked from `/`, relative ones from the working directory.
/// Existing components are left alone, and an existing target is success
/// either way.
///
/// # Errors
///
/// Returns the first protocol error raised by the session.
pub async fn create_directory(
    session: &dyn FileTransferSession,
    path: &str,
    recursive: bool,
) -> ProtocolResult<()> {
    let path = normalize_path(path);
    if !recursive {
        if session.directory_exists(&path).await? {
            return Ok(());
        }
        return session.make_directory(&path).await;
    }

    let mut current = if path.starts_with('/') {
        "/".to_string()
    } else {
        let cwd = session.working_directory().await?;
        normalize_path(&cwd)
    };

    for segment in path.split('/').filter(|s| !s.is_empty() && *s != ".") {
        current = join_remote(&current, segment);
        if !session.directory_exists(&current).await? {
            tracing::debug!(path = %current, "Creating remote directory");
            session.make_directory(&current).await?;
        }
    }
    Ok(())
}

/// Uploads a file, creating the remote parent directory first.
///
/// Returns the number of bytes sent.
///
/// # Errors
///
/// Returns a local-file or protocol error.
pub async fn upload(
    session: &dyn FileTransferSession,
    local: &Path,
    remote: &str,
) -> ProtocolResult<u64> {
    let remote = normalize_path(remote);
    if let Some(parent) = parent_directory(&remote) {
        create_directory(session, &parent, true).await?;
    }
    session.upload_file(local, &remote).await
}

/// Lists a remote directory, directories first, then by name
///
/// # Errors
///
/// Returns the session's protocol error.
pub async fn list_directory(
    session: &dyn FileTransferSession,
    path: &str,
) -> ProtocolResult<Vec<RemoteEntry>> {
    let mut entries = session.list(&normalize_path(path)).await?;
    entries.sort_by(|a, b| {
        b.is_directory
            .cmp(&a.is_directory)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
    Ok(entries)
}

/// Renders a listing as `[DIR]`/`[FILE]` lines under a header
#[must_use]
pub fn format_listing(path: &str, entries: &[RemoteEntry]) -> String {
    let mut out = format!("Directory listing for {path}:\n");
    for entry in entries {
        let kind = if entry.is_directory { "[DIR]" } else { "[FILE]" };
        let modified = entry
            .modified
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(out, "{kind} {} - {modified}", entry.name);
    }
    out
}
