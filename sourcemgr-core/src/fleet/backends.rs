//! Pluggable connectors and key store used by the fleet

use std::sync::Arc;

use crate::config::ConfigPaths;
use crate::connection::Connector;
use crate::protocol::{
    CommandSession, FileTransferSession, FtpConnector, InfoSession, QueryConnector,
    RconConnector, SftpConnector,
};
use crate::secret::{KeyStore, MachineKeyStore};
use crate::status::ReachabilityProbe;

/// Everything the fleet needs to reach the outside world.
///
/// [`Backends::network`] wires the real protocol clients; tests swap in
/// in-memory connectors.
#[derive(Clone)]
pub struct Backends {
    /// Key material for the credential vault
    pub key_store: Arc<dyn KeyStore>,
    /// RCON sessions
    pub rcon: Arc<dyn Connector<dyn CommandSession>>,
    /// A2S query sessions
    pub query: Arc<dyn Connector<dyn InfoSession>>,
    /// FTP/FTPS sessions
    pub ftp: Arc<dyn Connector<dyn FileTransferSession>>,
    /// SFTP sessions
    pub sftp: Arc<dyn Connector<dyn FileTransferSession>>,
    /// Reachability probe; `None` uses the probe selected in settings
    pub probe: Option<Arc<dyn ReachabilityProbe>>,
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends")
            .field("probe", &self.probe.as_ref().map(|p| p.name()))
            .finish_non_exhaustive()
    }
}

impl Backends {
    /// Real network clients and the machine-bound key store in `paths`
    #[must_use]
    pub fn network(paths: &ConfigPaths) -> Self {
        Self {
            key_store: Arc::new(MachineKeyStore::new(paths.data_dir())),
            rcon: Arc::new(RconConnector),
            query: Arc::new(QueryConnector),
            ftp: Arc::new(FtpConnector),
            sftp: Arc::new(SftpConnector),
            probe: None,
        }
    }

    /// Replaces the key store
    #[must_use]
    pub fn with_key_store(mut self, key_store: Arc<dyn KeyStore>) -> Self {
        self.key_store = key_store;
        self
    }

    /// Replaces the RCON connector
    #[must_use]
    pub fn with_rcon(mut self, connector: Arc<dyn Connector<dyn CommandSession>>) -> Self {
        self.rcon = connector;
        self
    }

    /// Replaces the query connector
    #[must_use]
    pub fn with_query(mut self, connector: Arc<dyn Connector<dyn InfoSession>>) -> Self {
        self.query = connector;
        self
    }

    /// Replaces the FTP connector
    #[must_use]
    pub fn with_ftp(mut self, connector: Arc<dyn Connector<dyn FileTransferSession>>) -> Self {
        self.ftp = connector;
        self
    }

    /// Replaces the SFTP connector
    #[must_use]
    pub fn with_sftp(mut self, connector: Arc<dyn Connector<dyn FileTransferSession>>) -> Self {
        self.sftp = connector;
        self
    }

    /// Uses a specific reachability probe
    #[must_use]
    pub fn with_probe(mut self, probe: Arc<dyn ReachabilityProbe>) -> Self {
        self.probe = Some(probe);
        self
    }
}
