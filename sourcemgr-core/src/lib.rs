//! `SourceMgr` Core Library
//!
//! This crate provides the core of the `SourceMgr` game server fleet manager:
//! credential protection, session pooling, status polling, persistence and
//! the protocol clients for Source dedicated servers.
//!
//! # Crate Structure
//!
//! - [`models`] - Endpoint record, live status, runtime wrapper
//! - [`secret`] - Credential vault, key stores, plaintext migration
//! - [`connection`] - Keyed session pools with retry
//! - [`protocol`] - RCON, A2S_INFO, FTP/FTPS and SFTP clients
//! - [`status`] - Reachability probes and the fleet status poller
//! - [`config`] - Endpoint list and settings persistence
//! - [`fleet`] - Fleet manager tying everything together
//! - [`tracing`] - Structured logging setup

// Enable missing_docs warning for public API documentation
#![warn(missing_docs)]

pub mod config;
pub mod connection;
pub mod error;
pub mod fleet;
pub mod models;
pub mod protocol;
pub mod secret;
pub mod status;
pub mod tracing;

// Flat re-exports for the CLI and the integration tests. Less common items
// are reached through their module paths.

pub use config::{AppSettings, ConfigPaths, ConfigStore, LoadedConfig};
pub use connection::{
    ConnectParams, ConnectionKey, Connector, FtpEncryption, PooledSession, RetryConfig,
    SessionPool, TlsSettings,
};
pub use error::{
    ConfigError, ConfigResult, ProbeError, ProbeResult, ProtocolError, ProtocolResult,
    SecretError, SecretResult, SourceMgrError, SourceMgrResult,
};
pub use fleet::{
    Backends, CommandOutcome, EndpointEdit, FleetManager, SecretStatus, UploadReport,
    format_broadcast,
};
pub use models::{
    Endpoint, EndpointStatus, FileTransferProtocol, ManagedEndpoint, StatusTier, StoredSecret,
};
pub use protocol::{
    CommandSession, CvarValue, FileTransferSession, InfoSession, RemoteEntry, ServerInfo,
    StatusReport,
};
pub use secret::{
    CredentialVault, KeyStore, MachineKeyStore, MigrationReport, StaticKeyStore, migrate_endpoints,
};
pub use status::{PollResult, PollSummary, ProbeKind, ReachabilityProbe, StatusPoller};
pub use tracing::{
    TracingConfig, TracingError, TracingLevel, TracingOutput, TracingResult, init_tracing,
    span_names,
};
