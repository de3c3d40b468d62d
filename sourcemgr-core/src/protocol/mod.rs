//! Protocol layer for `SourceMgr`
//!
//! Session contracts and clients for the protocols a game server exposes:
//! - Source RCON for remote console commands
//! - A2S_INFO for live server status
//! - FTP/FTPS and SFTP for file transfer
//!
//! Each client implements [`PooledSession`] so it can be kept in a
//! [`crate::connection::SessionPool`], plus the operation trait for its
//! protocol family.

mod ftp;
mod query;
mod rcon;
mod response;
mod sftp;
mod transfer;

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub use ftp::{FtpConnector, FtpSession, FtpReply};
pub use query::{A2S_INFO_REQUEST, QueryConnector, QuerySession, ServerInfo, parse_info_response};
pub use rcon::{RconConnector, RconPacket, RconSession, packet_type};
pub use response::{CvarValue, PlayerEntry, RconParse, StatusReport};
pub use sftp::{SftpConnector, SftpSession};
pub use transfer::{
    create_directory, format_listing, join_remote, list_directory, normalize_path,
    parent_directory, suggest_remote_path, upload,
};

use crate::connection::PooledSession;
use crate::error::ProtocolResult;

/// A remote console session
#[async_trait]
pub trait CommandSession: PooledSession {
    /// Executes a console command and returns its full text output
    async fn send_command(&self, command: &str) -> ProtocolResult<String>;
}

impl dyn CommandSession {
    /// Executes a command and parses its output into `T`
    ///
    /// # Errors
    ///
    /// Returns the transport error, or [`crate::error::ProtocolError::Malformed`]
    /// if the output cannot be parsed.
    pub async fn execute_typed<T: RconParse>(&self, command: &str) -> ProtocolResult<T> {
        let text = self.send_command(command).await?;
        T::parse_response(&text)
    }
}

/// A status-query session
#[async_trait]
pub trait InfoSession: PooledSession {
    /// Requests the server's current info
    async fn get_info(&self) -> ProtocolResult<ServerInfo>;
}

/// Entry of a remote directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteEntry {
    /// File or directory name
    pub name: String,
    /// True for directories
    pub is_directory: bool,
    /// Size in bytes (0 for directories)
    pub size: u64,
    /// Last modification time, if the server reports it
    pub modified: Option<DateTime<Utc>>,
}

/// A file-transfer session (FTP/FTPS or SFTP).
///
/// Paths may be absolute or relative to the working directory.
#[async_trait]
pub trait FileTransferSession: PooledSession {
    /// Current working directory
    async fn working_directory(&self) -> ProtocolResult<String>;

    /// Changes the working directory
    async fn set_working_directory(&self, path: &str) -> ProtocolResult<()>;

    /// Returns true if `path` exists and is a directory
    async fn directory_exists(&self, path: &str) -> ProtocolResult<bool>;

    /// Creates one directory level; the parent must exist
    async fn make_directory(&self, path: &str) -> ProtocolResult<()>;

    /// Uploads a local file, overwriting the remote file. Returns bytes sent.
    async fn upload_file(&self, local: &Path, remote: &str) -> ProtocolResult<u64>;

    /// Lists a directory; an empty path lists the working directory
    async fn list(&self, path: &str) -> ProtocolResult<Vec<RemoteEntry>>;
}
