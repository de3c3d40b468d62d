//! Field-level endpoint edits

use secrecy::{ExposeSecret, SecretString};

use crate::models::{Endpoint, FileTransferProtocol};
use crate::secret::CredentialVault;

/// A set of endpoint field changes; `None` leaves a field untouched.
///
/// Passwords are sealed through the vault when applied.
#[derive(Debug, Default)]
pub struct EndpointEdit {
    /// New label
    pub label: Option<String>,
    /// New IP address or host name
    pub ip_address: Option<String>,
    /// New RCON port
    pub rcon_port: Option<u16>,
    /// New RCON password
    pub rcon_password: Option<SecretString>,
    /// New file-transfer host
    pub ftp_host: Option<String>,
    /// New file-transfer port
    pub ftp_port: Option<u16>,
    /// New file-transfer user
    pub ftp_username: Option<String>,
    /// New file-transfer password
    pub ftp_password: Option<SecretString>,
    /// New root directory
    pub ftp_root_directory: Option<String>,
    /// New protocol variant
    pub ftp_protocol: Option<FileTransferProtocol>,
    /// New query port; `Some(0)` clears it
    pub query_port: Option<u16>,
}

fn assign<T: PartialEq>(target: &mut T, value: Option<T>) -> bool {
    match value {
        Some(value) if *target != value => {
            *target = value;
            true
        }
        _ => false,
    }
}

impl EndpointEdit {
    /// Returns true if no field is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.label.is_none()
            && self.ip_address.is_none()
            && self.rcon_port.is_none()
            && self.rcon_password.is_none()
            && self.ftp_host.is_none()
            && self.ftp_port.is_none()
            && self.ftp_username.is_none()
            && self.ftp_password.is_none()
            && self.ftp_root_directory.is_none()
            && self.ftp_protocol.is_none()
            && self.query_port.is_none()
    }

    /// Applies the edit. Returns true if any field changed.
    ///
    /// Switching the protocol variant while the port is still the old
    /// variant's default moves it to the new default.
    pub fn apply(self, endpoint: &mut Endpoint, vault: &CredentialVault) -> bool {
        let mut changed = false;
        changed |= assign(&mut endpoint.label, self.label);
        changed |= assign(&mut endpoint.ip_address, self.ip_address);
        changed |= assign(&mut endpoint.rcon_port, self.rcon_port);
        changed |= assign(&mut endpoint.ftp_host, self.ftp_host);
        changed |= assign(&mut endpoint.ftp_username, self.ftp_username);
        changed |= assign(&mut endpoint.ftp_root_directory, self.ftp_root_directory);

        if let Some(protocol) = self.ftp_protocol {
            if endpoint.ftp_protocol != protocol {
                if self.ftp_port.is_none() && endpoint.ftp_port == endpoint.ftp_protocol.default_port()
                {
                    endpoint.ftp_port = protocol.default_port();
                }
                endpoint.ftp_protocol = protocol;
                changed = true;
            }
        }
        changed |= assign(&mut endpoint.ftp_port, self.ftp_port);

        if let Some(port) = self.query_port {
            let port = (port != 0).then_some(port);
            changed |= assign(&mut endpoint.query_port, Some(port));
        }

        if let Some(password) = self.rcon_password {
            changed |= endpoint.set_rcon_password(vault, password.expose_secret());
        }
        if let Some(password) = self.ftp_password {
            changed |= endpoint.set_ftp_password(vault, password.expose_secret());
        }
        changed
    }
}
