//! Error types for `SourceMgr`
//!
//! Each concern gets its own `thiserror` enum and `Result` alias. The
//! top-level [`SourceMgrError`] aggregates them for callers that cross
//! module boundaries (the fleet manager and the CLI).

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Top-level error type for `SourceMgr` operations
#[derive(Debug, Error)]
pub enum SourceMgrError {
    /// Configuration or persistence error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Network protocol error (RCON, query, FTP, SFTP)
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Credential vault error
    #[error(transparent)]
    Secret(#[from] SecretError),

    /// Reachability probe error
    #[error(transparent)]
    Probe(#[from] ProbeError),

    /// Endpoint lookup failed
    #[error("Endpoint not found: {0}")]
    EndpointNotFound(String),

    /// A name matched more than one endpoint
    #[error("'{0}' matches more than one endpoint, use its id")]
    AmbiguousEndpoint(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SourceMgrError {
    /// Returns true for failures to reach or talk to a remote server
    #[must_use]
    pub const fn is_connection_failure(&self) -> bool {
        matches!(self, Self::Protocol(_) | Self::Probe(_))
    }
}

/// Result type for cross-module operations
pub type SourceMgrResult<T> = std::result::Result<T, SourceMgrError>;

/// Errors raised while loading or persisting configuration.
///
/// These are fatal to the requested operation and always reach the caller.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading or writing a file failed
    #[error("Failed to access {path}: {source}")]
    Io {
        /// File that could not be accessed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// File contents could not be parsed
    #[error("Failed to parse {path}: {reason}")]
    Parse {
        /// File that failed to parse
        path: PathBuf,
        /// Parser message
        reason: String,
    },

    /// Data could not be serialized
    #[error("Failed to serialize configuration: {0}")]
    Serialize(String),

    /// No usable configuration directory on this platform
    #[error("Could not determine {0} directory")]
    NoDirectory(&'static str),

    /// A field value is invalid
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Errors raised by protocol clients and connection pools.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// TCP/UDP connection could not be established
    #[error("Connection to {addr} failed: {reason}")]
    Connect {
        /// Target address
        addr: String,
        /// Failure reason
        reason: String,
    },

    /// Operation exceeded its timeout
    #[error("{operation} timed out after {}ms", .after.as_millis())]
    Timeout {
        /// Operation that timed out
        operation: &'static str,
        /// Timeout that elapsed
        after: Duration,
    },

    /// Remote rejected the credentials
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Remote replied with something the client does not understand
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// Remote replied with an error status
    #[error("Server replied {code}: {message}")]
    Remote {
        /// Numeric reply code
        code: u16,
        /// Reply text
        message: String,
    },

    /// TLS negotiation failed
    #[error("TLS error: {0}")]
    Tls(String),

    /// SSH transport or SFTP subsystem failure
    #[error("SSH error: {0}")]
    Ssh(String),

    /// The session was closed or poisoned by an earlier failure
    #[error("Session is closed")]
    Closed,

    /// Local file could not be read
    #[error("Local file error: {0}")]
    LocalFile(String),

    /// I/O error on an established session
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Creates a connect error for the given address
    pub fn connect(addr: impl Into<String>, reason: impl ToString) -> Self {
        Self::Connect {
            addr: addr.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a timeout error
    #[must_use]
    pub const fn timeout(operation: &'static str, after: Duration) -> Self {
        Self::Timeout { operation, after }
    }

    /// Returns true when the error means the underlying session is unusable
    #[must_use]
    pub const fn is_fatal_to_session(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::Timeout { .. } | Self::Closed | Self::Malformed(_) | Self::Ssh(_)
        )
    }
}

/// Result type for protocol operations
pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;

/// Errors raised by the credential vault.
///
/// Vault errors are degraded gracefully: unseal failures become an empty
/// secret, seal failures fall back to plaintext storage.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SecretError {
    /// Key material could not be loaded or created
    #[error("Key store unavailable: {0}")]
    KeyStoreUnavailable(String),

    /// Encryption failed
    #[error("Failed to seal secret: {0}")]
    SealFailed(String),

    /// Decryption failed (corrupt data, different user or machine)
    #[error("Failed to unseal secret: {0}")]
    UnsealFailed(String),

    /// Value is not in the vault's encoding
    #[error("Invalid sealed value: {0}")]
    InvalidEncoding(String),
}

/// Result type for vault operations
pub type SecretResult<T> = std::result::Result<T, SecretError>;

/// Errors raised by reachability probes
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// Host resolution failed
    #[error("Failed to resolve host '{host}': {reason}")]
    ResolutionFailed {
        /// The hostname that failed to resolve
        host: String,
        /// The reason for the failure
        reason: String,
    },

    /// Host did not answer in time or refused
    #[error("Host '{host}' is not reachable: {reason}")]
    Unreachable {
        /// The host that was unreachable
        host: String,
        /// The reason for the failure
        reason: String,
    },

    /// Probe tool could not be run
    #[error("Probe unavailable: {0}")]
    Unavailable(String),
}

/// Result type for probe operations
pub type ProbeResult<T> = std::result::Result<T, ProbeError>;
