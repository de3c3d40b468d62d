//! Data models for managed endpoints

mod endpoint;
mod managed;
mod status;

pub use endpoint::{
    DEFAULT_FTP_PORT, DEFAULT_RCON_PORT, DEFAULT_SFTP_PORT, Endpoint, FileTransferProtocol,
    PLACEHOLDER_LABEL, StoredSecret,
};
pub use managed::ManagedEndpoint;
pub use status::{DEFAULT_MAX_PLAYERS, EndpointStatus, StatusTier, UNKNOWN_MAP};
