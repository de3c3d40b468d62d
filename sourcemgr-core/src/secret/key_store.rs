//! Machine- and user-bound key material for the credential vault
//!
//! The vault key is never stored directly. A random user key lives in the
//! user's data directory (readable only by the owner) and is mixed with the
//! machine identity and the user name through HKDF-SHA256. Copying the key
//! file to another machine or account therefore yields a different key.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use ring::hkdf;
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

use crate::error::{SecretError, SecretResult};

/// Length of vault key material in bytes (AES-256)
pub const KEY_LEN: usize = 32;

/// File name of the user key inside the data directory
pub const KEY_FILE_NAME: &str = "vault.key";

const HKDF_SALT: &[u8] = b"sourcemgr/credential-vault";
const HKDF_INFO: &[u8] = b"aes-256-gcm/v1";

const MACHINE_ID_PATHS: &[&str] = &["/etc/machine-id", "/var/lib/dbus/machine-id"];

/// Key material handed to the vault
pub type KeyMaterial = Zeroizing<[u8; KEY_LEN]>;

/// Source of vault key material
pub trait KeyStore: Send + Sync {
    /// Loads (or creates) the key material
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::KeyStoreUnavailable`] if no key can be produced.
    fn key_material(&self) -> SecretResult<KeyMaterial>;
}

/// Key store bound to the local machine and the current user
pub struct MachineKeyStore {
    key_path: PathBuf,
    machine_id: String,
    user: String,
}

impl fmt::Debug for MachineKeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MachineKeyStore")
            .field("key_path", &self.key_path)
            .finish_non_exhaustive()
    }
}

impl MachineKeyStore {
    /// Creates a key store keeping its user key in `data_dir`
    #[must_use]
    pub fn new(data_dir: &Path) -> Self {
        Self::with_identity(data_dir, machine_identity(), user_identity())
    }

    /// Creates a key store with an explicit machine and user identity
    #[must_use]
    pub fn with_identity(
        data_dir: &Path,
        machine_id: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            key_path: data_dir.join(KEY_FILE_NAME),
            machine_id: machine_id.into(),
            user: user.into(),
        }
    }

    /// Path of the user key file
    #[must_use]
    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    fn load_or_create_user_key(&self) -> SecretResult<KeyMaterial> {
        match std::fs::read_to_string(&self.key_path) {
            Ok(contents) => parse_user_key(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => self.create_user_key(),
            Err(e) => Err(unavailable(&self.key_path, &e)),
        }
    }

    fn create_user_key(&self) -> SecretResult<KeyMaterial> {
        if let Some(parent) = self.key_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| unavailable(parent, &e))?;
        }

        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        SystemRandom::new()
            .fill(&mut key[..])
            .map_err(|_| SecretError::KeyStoreUnavailable("random source failed".into()))?;

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        match options.open(&self.key_path) {
            Ok(mut file) => {
                let encoded = Zeroizing::new(hex::encode(&key[..]));
                file.write_all(encoded.as_bytes())
                    .and_then(|()| file.sync_all())
                    .map_err(|e| unavailable(&self.key_path, &e))?;
                tracing::info!(path = %self.key_path.display(), "Created vault key");
                Ok(key)
            }
            // Another process won the race; use its key
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let contents = std::fs::read_to_string(&self.key_path)
                    .map_err(|e| unavailable(&self.key_path, &e))?;
                parse_user_key(&contents)
            }
            Err(e) => Err(unavailable(&self.key_path, &e)),
        }
    }
}

impl KeyStore for MachineKeyStore {
    fn key_material(&self) -> SecretResult<KeyMaterial> {
        let user_key = self.load_or_create_user_key()?;
        derive_key(&user_key, &self.machine_id, &self.user)
    }
}

/// Key store over fixed key material, for embedding and tests
pub struct StaticKeyStore {
    key: KeyMaterial,
}

impl StaticKeyStore {
    /// Creates a key store that always yields `key`
    #[must_use]
    pub fn new(key: [u8; KEY_LEN]) -> Self {
        Self {
            key: Zeroizing::new(key),
        }
    }
}

impl fmt::Debug for StaticKeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StaticKeyStore(***)")
    }
}

impl KeyStore for StaticKeyStore {
    fn key_material(&self) -> SecretResult<KeyMaterial> {
        Ok(self.key.clone())
    }
}

fn unavailable(path: &Path, err: &std::io::Error) -> SecretError {
    SecretError::KeyStoreUnavailable(format!("{}: {err}", path.display()))
}

fn parse_user_key(contents: &str) -> SecretResult<KeyMaterial> {
    let bytes = Zeroizing::new(
        hex::decode(contents.trim())
            .map_err(|e| SecretError::KeyStoreUnavailable(format!("corrupt key file: {e}")))?,
    );
    if bytes.len() != KEY_LEN {
        return Err(SecretError::KeyStoreUnavailable(format!(
            "corrupt key file: expected {KEY_LEN} bytes, found {}",
            bytes.len()
        )));
    }
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    key.copy_from_slice(&bytes);
    Ok(key)
}

fn derive_key(user_key: &[u8; KEY_LEN], machine_id: &str, user: &str) -> SecretResult<KeyMaterial> {
    let prk = hkdf::Salt::new(hkdf::HKDF_SHA256, HKDF_SALT).extract(user_key);
    let info: [&[u8]; 5] = [
        HKDF_INFO,
        machine_id.as_bytes(),
        b"\0",
        user.as_bytes(),
        b"\0",
    ];
    let okm = prk
        .expand(&info, hkdf::HKDF_SHA256)
        .map_err(|_| SecretError::KeyStoreUnavailable("key derivation failed".into()))?;

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    okm.fill(&mut key[..])
        .map_err(|_| SecretError::KeyStoreUnavailable("key derivation failed".into()))?;
    Ok(key)
}

/// Identity of the local machine
#[must_use]
pub fn machine_identity() -> String {
    MACHINE_ID_PATHS
        .iter()
        .filter_map(|path| std::fs::read_to_string(path).ok())
        .map(|id| id.trim().to_string())
        .find(|id| !id.is_empty())
        .or_else(|| {
            hostname::get()
                .ok()
                .and_then(|name| name.into_string().ok())
        })
        .unwrap_or_else(|| "localhost".to_string())
}

/// Name of the current user
#[must_use]
pub fn user_identity() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .ok()
        .filter(|name| !name.is_empty())
        .or_else(|| dirs::home_dir().map(|home| home.display().to_string()))
        .unwrap_or_default()
}
