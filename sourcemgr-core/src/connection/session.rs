//! Session contracts shared by every pool

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::ProtocolResult;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Allocates a process-unique session id
#[must_use]
pub fn next_session_id() -> u64 {
    NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed)
}

/// A live protocol session that can be kept in a [`super::SessionPool`]
#[async_trait]
pub trait PooledSession: Send + Sync {
    /// Process-unique id of this session
    fn session_id(&self) -> u64;

    /// Returns true if the session can still be used
    async fn is_alive(&self) -> bool;

    /// Closes the session; must tolerate an already dead connection
    async fn disconnect(&self);
}

/// Opens new sessions of type `S`
#[async_trait]
pub trait Connector<S: ?Sized + Send + Sync + 'static>: Send + Sync {
    /// Connects, authenticates and applies the protocol configuration
    async fn connect(&self, params: &ConnectParams) -> ProtocolResult<Arc<S>>;
}

/// FTP channel encryption mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FtpEncryption {
    /// Plain FTP
    None,
    /// Try explicit TLS, fall back to plain FTP if the server refuses
    #[default]
    Auto,
    /// `AUTH TLS` on the control connection, required
    Explicit,
    /// TLS from the first byte
    Implicit,
}

impl fmt::Display for FtpEncryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Auto => "auto",
            Self::Explicit => "explicit",
            Self::Implicit => "implicit",
        })
    }
}

impl std::str::FromStr for FtpEncryption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "plain" => Ok(Self::None),
            "auto" => Ok(Self::Auto),
            "explicit" => Ok(Self::Explicit),
            "implicit" => Ok(Self::Implicit),
            other => Err(format!("unknown FTP encryption mode '{other}'")),
        }
    }
}

/// TLS behaviour for FTPS sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlsSettings {
    /// Encryption mode
    pub encryption: FtpEncryption,
    /// Accept any server certificate
    pub accept_invalid_certificates: bool,
}

impl Default for TlsSettings {
    fn default() -> Self {
        Self {
            encryption: FtpEncryption::Auto,
            accept_invalid_certificates: true,
        }
    }
}

/// Everything a connector needs to open one session.
///
/// Built per acquisition; the password is revealed from the vault only for
/// the duration of the handshake.
#[derive(Debug)]
pub struct ConnectParams {
    /// Remote host
    pub host: String,
    /// Remote port
    pub port: u16,
    /// User name (empty for RCON and query)
    pub username: String,
    /// Plaintext password
    pub password: SecretString,
    /// Directory to change into after login (file transfer only)
    pub root_directory: String,
    /// Connect and per-operation timeout
    pub timeout: Duration,
    /// FTPS settings
    pub tls: TlsSettings,
}

impl ConnectParams {
    /// Creates parameters for an address without credentials
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            username: String::new(),
            password: SecretString::from(String::new()),
            root_directory: String::new(),
            timeout,
            tls: TlsSettings::default(),
        }
    }

    /// Sets the credentials
    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: SecretString) -> Self {
        self.username = username.into();
        self.password = password;
        self
    }

    /// Sets the root directory
    #[must_use]
    pub fn with_root_directory(mut self, root: impl Into<String>) -> Self {
        self.root_directory = root.into();
        self
    }

    /// Sets the TLS settings
    #[must_use]
    pub const fn with_tls(mut self, tls: TlsSettings) -> Self {
        self.tls = tls;
        self
    }

    /// `host:port`
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Identity of a pooled session
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionKey {
    host: String,
    port: u16,
    username: Option<String>,
}

impl ConnectionKey {
    /// Key for address-only protocols (RCON, query)
    #[must_use]
    pub fn address(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            username: None,
        }
    }

    /// Key for account-based protocols (FTP, SFTP)
    #[must_use]
    pub fn account(host: impl Into<String>, port: u16, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            username: Some(username.into()),
        }
    }

    /// Remote host
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Remote port
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.username {
            Some(user) => write!(f, "{}:{}:{user}", self.host, self.port),
            None => write!(f, "{}:{}", self.host, self.port),
        }
    }
}
