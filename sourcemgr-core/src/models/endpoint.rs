//! Persisted endpoint record

use std::fmt;
use std::str::FromStr;

use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::secret::CredentialVault;

/// Default RCON port of Source dedicated servers
pub const DEFAULT_RCON_PORT: u16 = 27015;

/// Default FTP control port
pub const DEFAULT_FTP_PORT: u16 = 21;

/// Default SFTP port
pub const DEFAULT_SFTP_PORT: u16 = 22;

/// Label given to endpoints the user has not named yet
pub const PLACEHOLDER_LABEL: &str = "New Server";

/// File-transfer protocol variant used for uploads and browsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FileTransferProtocol {
    /// FTP, optionally upgraded to FTPS
    #[default]
    Ftp,
    /// SFTP over SSH
    Sftp,
}

impl FileTransferProtocol {
    /// Returns the persisted name of the protocol
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ftp => "FTP",
            Self::Sftp => "SFTP",
        }
    }

    /// Returns the protocol's conventional port
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Ftp => DEFAULT_FTP_PORT,
            Self::Sftp => DEFAULT_SFTP_PORT,
        }
    }
}

impl fmt::Display for FileTransferProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileTransferProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FTP" | "FTPS" => Ok(Self::Ftp),
            "SFTP" => Ok(Self::Sftp),
            other => Err(format!("unknown file transfer protocol '{other}'")),
        }
    }
}

impl Serialize for FileTransferProtocol {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FileTransferProtocol {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Older files stored the enum ordinal instead of its name
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Name(String),
            Ordinal(u8),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Name(name) => name.parse().map_err(serde::de::Error::custom),
            Repr::Ordinal(0) => Ok(Self::Ftp),
            Repr::Ordinal(1) => Ok(Self::Sftp),
            Repr::Ordinal(n) => Err(serde::de::Error::custom(format!(
                "unknown file transfer protocol ordinal {n}"
            ))),
        }
    }
}

/// A secret exactly as it is stored on disk.
///
/// Normally this is a vault-sealed value; legacy configurations may still
/// hold plaintext until the migration pass reseals it. Use
/// [`CredentialVault::reveal`] to obtain the usable plaintext.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoredSecret(String);

impl StoredSecret {
    /// Wraps an already-stored value without sealing it
    #[must_use]
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the raw stored representation
    #[must_use]
    pub fn as_stored(&self) -> &str {
        &self.0
    }

    /// Returns true if nothing is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for StoredSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("StoredSecret(<empty>)")
        } else {
            f.write_str("StoredSecret(***)")
        }
    }
}

const fn default_rcon_port() -> u16 {
    DEFAULT_RCON_PORT
}

const fn default_ftp_port() -> u16 {
    DEFAULT_FTP_PORT
}

/// One managed game server.
///
/// Only identity, credentials, protocol selector, root directory and the
/// user label are persisted. Live status is tracked separately by
/// [`super::ManagedEndpoint`]; the hostname learned from queries lives here
/// but is never written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    /// User-assigned label
    #[serde(rename = "name", default)]
    pub label: String,
    /// Network address of the game server
    pub ip_address: String,
    /// RCON TCP port
    #[serde(default = "default_rcon_port")]
    pub rcon_port: u16,
    #[serde(default, skip_serializing_if = "StoredSecret::is_empty")]
    rcon_password: StoredSecret,
    /// File-transfer host (falls back to the IP address when empty)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ftp_host: String,
    /// File-transfer port
    #[serde(default = "default_ftp_port")]
    pub ftp_port: u16,
    /// File-transfer user name
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ftp_username: String,
    #[serde(default, skip_serializing_if = "StoredSecret::is_empty")]
    ftp_password: StoredSecret,
    /// Directory the file-transfer session changes into after login
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ftp_root_directory: String,
    /// File-transfer protocol variant
    #[serde(default)]
    pub ftp_protocol: FileTransferProtocol,
    /// A2S query port; the RCON port is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_port: Option<u16>,
    #[serde(skip)]
    learned_hostname: Option<String>,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            label: PLACEHOLDER_LABEL.to_string(),
            ip_address: String::new(),
            rcon_port: DEFAULT_RCON_PORT,
            rcon_password: StoredSecret::default(),
            ftp_host: String::new(),
            ftp_port: DEFAULT_FTP_PORT,
            ftp_username: String::new(),
            ftp_password: StoredSecret::default(),
            ftp_root_directory: String::new(),
            ftp_protocol: FileTransferProtocol::Ftp,
            query_port: None,
            learned_hostname: None,
        }
    }
}

impl Endpoint {
    /// Creates an endpoint with the given label and control address
    #[must_use]
    pub fn new(label: impl Into<String>, ip_address: impl Into<String>, rcon_port: u16) -> Self {
        Self {
            label: label.into(),
            ip_address: ip_address.into(),
            rcon_port,
            ..Self::default()
        }
    }

    /// Name shown to the user: the learned hostname if any, else the label
    #[must_use]
    pub fn display_name(&self) -> &str {
        match self.learned_hostname.as_deref() {
            Some(hostname) if !hostname.is_empty() => hostname,
            _ => &self.label,
        }
    }

    /// Hostname reported by the server's query interface, if learned
    #[must_use]
    pub fn learned_hostname(&self) -> Option<&str> {
        self.learned_hostname.as_deref()
    }

    /// Returns true if the label is empty or still the placeholder
    #[must_use]
    pub fn has_placeholder_label(&self) -> bool {
        self.label.trim().is_empty() || self.label == PLACEHOLDER_LABEL
    }

    /// Records a hostname learned from a live query.
    ///
    /// Adopts the hostname as the label when the label is still a
    /// placeholder. Returns true if the persisted label changed.
    pub fn record_hostname(&mut self, hostname: &str) -> bool {
        if hostname.is_empty() {
            return false;
        }
        self.learned_hostname = Some(hostname.to_string());
        if self.has_placeholder_label() {
            self.label = hostname.to_string();
            return true;
        }
        false
    }

    /// Drops the learned hostname, e.g. after the endpoint moved to a
    /// different server
    pub fn forget_hostname(&mut self) {
        self.learned_hostname = None;
    }

    /// Effective A2S query port
    #[must_use]
    pub fn effective_query_port(&self) -> u16 {
        self.query_port.unwrap_or(self.rcon_port)
    }

    /// `address:port` of the RCON service
    #[must_use]
    pub fn control_address(&self) -> String {
        format!("{}:{}", self.ip_address, self.rcon_port)
    }

    /// Host used for file transfer
    #[must_use]
    pub fn transfer_host(&self) -> &str {
        if self.ftp_host.trim().is_empty() {
            &self.ip_address
        } else {
            &self.ftp_host
        }
    }

    /// Stored (normally sealed) RCON password
    #[must_use]
    pub const fn stored_rcon_password(&self) -> &StoredSecret {
        &self.rcon_password
    }

    /// Stored (normally sealed) file-transfer password
    #[must_use]
    pub const fn stored_ftp_password(&self) -> &StoredSecret {
        &self.ftp_password
    }

    /// Returns the usable RCON password
    #[must_use]
    pub fn rcon_password(&self, vault: &CredentialVault) -> SecretString {
        vault.reveal(&self.rcon_password)
    }

    /// Returns the usable file-transfer password
    #[must_use]
    pub fn ftp_password(&self, vault: &CredentialVault) -> SecretString {
        vault.reveal(&self.ftp_password)
    }

    /// Seals and stores a new RCON password. Returns true if it changed.
    pub fn set_rcon_password(&mut self, vault: &CredentialVault, plaintext: &str) -> bool {
        Self::assign_secret(&mut self.rcon_password, vault, plaintext)
    }

    /// Seals and stores a new file-transfer password. Returns true if it changed.
    pub fn set_ftp_password(&mut self, vault: &CredentialVault, plaintext: &str) -> bool {
        Self::assign_secret(&mut self.ftp_password, vault, plaintext)
    }

    fn assign_secret(slot: &mut StoredSecret, vault: &CredentialVault, plaintext: &str) -> bool {
        use secrecy::ExposeSecret;

        if vault.reveal(slot).expose_secret() == plaintext {
            return false;
        }
        *slot = vault.protect(plaintext);
        true
    }

    /// Secret slots for the migration pass, with their field names
    pub(crate) fn secret_slots_mut(&mut self) -> [(&'static str, &mut StoredSecret); 2] {
        [
            ("rconPassword", &mut self.rcon_password),
            ("ftpPassword", &mut self.ftp_password),
        ]
    }

    /// Copies identity and credentials into a new endpoint labelled as a copy
    #[must_use]
    pub fn duplicate(&self) -> Self {
        Self {
            label: format!("{} (Copy)", self.display_name()),
            learned_hostname: None,
            ..self.clone()
        }
    }

    /// Checks that the endpoint can be connected to
    ///
    /// # Errors
    ///
    /// Returns a message describing the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.ip_address.trim().is_empty() {
            return Err("IP address is required".to_string());
        }
        if self.rcon_port == 0 {
            return Err("RCON port must be non-zero".to_string());
        }
        if self.ftp_port == 0 {
            return Err("File transfer port must be non-zero".to_string());
        }
        Ok(())
    }
}
