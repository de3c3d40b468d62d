//! Credential vault: sealing secrets at rest
//!
//! Sealed values are base64 text of `SMV1 || nonce || ciphertext || tag`
//! using AES-256-GCM with a fresh random nonce per seal, so sealing the same
//! plaintext twice yields different text.

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};
use secrecy::{ExposeSecret, SecretString};

use super::key_store::{KeyMaterial, KeyStore};
use crate::error::{SecretError, SecretResult};
use crate::models::StoredSecret;

/// Header carried by every sealed value
const SEALED_MAGIC: &[u8] = b"SMV1";

/// Seals and unseals endpoint secrets with a machine- and user-bound key
pub struct CredentialVault {
    key: Result<KeyMaterial, SecretError>,
    rng: SystemRandom,
}

impl fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialVault")
            .field("available", &self.is_available())
            .finish()
    }
}

impl CredentialVault {
    /// Opens the vault over the given key store.
    ///
    /// A key store failure does not fail construction; the vault is then
    /// unavailable and every seal falls back to plaintext.
    #[must_use]
    pub fn open(store: &dyn KeyStore) -> Self {
        let key = store.key_material();
        if let Err(ref e) = key {
            tracing::warn!(error = %e, "Credential vault unavailable, secrets stay plaintext");
        }
        Self {
            key,
            rng: SystemRandom::new(),
        }
    }

    /// Creates a vault that cannot seal anything
    #[must_use]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            key: Err(SecretError::KeyStoreUnavailable(reason.into())),
            rng: SystemRandom::new(),
        }
    }

    /// Returns true if key material was loaded
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.key.is_ok()
    }

    fn cipher(&self) -> SecretResult<LessSafeKey> {
        let key = self.key.as_ref().map_err(Clone::clone)?;
        let unbound = UnboundKey::new(&AES_256_GCM, &key[..])
            .map_err(|_| SecretError::KeyStoreUnavailable("invalid key length".into()))?;
        Ok(LessSafeKey::new(unbound))
    }

    /// Seals a plaintext secret. Empty input yields empty output.
    ///
    /// # Errors
    ///
    /// Returns an error if the vault is unavailable or encryption fails.
    pub fn seal(&self, plaintext: &str) -> SecretResult<String> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }

        let cipher = self.cipher()?;
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| SecretError::SealFailed("failed to generate nonce".into()))?;

        let mut buffer = Vec::with_capacity(
            SEALED_MAGIC.len() + NONCE_LEN + plaintext.len() + AES_256_GCM.tag_len(),
        );
        buffer.extend_from_slice(SEALED_MAGIC);
        buffer.extend_from_slice(&nonce_bytes);
        let header_len = buffer.len();

        let mut body = zeroize::Zeroizing::new(plaintext.as_bytes().to_vec());
        cipher
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::from(SEALED_MAGIC),
                &mut *body,
            )
            .map_err(|_| SecretError::SealFailed("encryption failed".into()))?;
        buffer.extend_from_slice(&body);
        debug_assert!(buffer.len() > header_len);

        Ok(STANDARD.encode(buffer))
    }

    /// Unseals a value, reporting why it failed
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::InvalidEncoding`] for values that are not in
    /// the sealed format, [`SecretError::UnsealFailed`] when authentication
    /// fails (different key, corrupt data) and
    /// [`SecretError::KeyStoreUnavailable`] without key material.
    pub fn try_unseal(&self, sealed: &str) -> SecretResult<SecretString> {
        if sealed.is_empty() {
            return Ok(SecretString::from(String::new()));
        }

        let data = STANDARD
            .decode(sealed.trim())
            .map_err(|e| SecretError::InvalidEncoding(e.to_string()))?;
        let min_len = SEALED_MAGIC.len() + NONCE_LEN + AES_256_GCM.tag_len();
        if data.len() < min_len || !data.starts_with(SEALED_MAGIC) {
            return Err(SecretError::InvalidEncoding("missing sealed header".into()));
        }

        let cipher = self.cipher()?;
        let (nonce_bytes, ciphertext) = data[SEALED_MAGIC.len()..].split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| SecretError::InvalidEncoding("bad nonce".into()))?;

        let mut buffer = zeroize::Zeroizing::new(ciphertext.to_vec());
        let plaintext = cipher
            .open_in_place(nonce, Aad::from(SEALED_MAGIC), &mut buffer)
            .map_err(|_| SecretError::UnsealFailed("authentication failed".into()))?;

        let text = std::str::from_utf8(plaintext)
            .map_err(|e| SecretError::UnsealFailed(e.to_string()))?;
        Ok(SecretString::from(text.to_owned()))
    }

    /// Unseals a value; any failure yields an empty secret
    #[must_use]
    pub fn unseal(&self, sealed: &str) -> SecretString {
        self.try_unseal(sealed).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "Unseal failed");
            SecretString::from(String::new())
        })
    }

    /// Returns true if `value` is a sealed value this vault can open.
    ///
    /// Anything else, including values sealed on another machine, is
    /// treated as legacy plaintext.
    #[must_use]
    pub fn is_sealed(&self, value: &str) -> bool {
        !value.is_empty() && self.try_unseal(value).is_ok()
    }

    /// Seals a plaintext for storage, falling back to plaintext on failure
    #[must_use]
    pub fn protect(&self, plaintext: &str) -> StoredSecret {
        match self.seal(plaintext) {
            Ok(sealed) => StoredSecret::from_stored(sealed),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to seal secret, storing plaintext");
                StoredSecret::from_stored(plaintext)
            }
        }
    }

    /// Returns the usable plaintext of a stored secret.
    ///
    /// Sealed values are unsealed; legacy plaintext is returned as is.
    #[must_use]
    pub fn reveal(&self, stored: &StoredSecret) -> SecretString {
        match self.try_unseal(stored.as_stored()) {
            Ok(secret) => secret,
            Err(_) => SecretString::from(stored.as_stored().to_owned()),
        }
    }

    /// Compares a stored secret against a plaintext without exposing it
    #[must_use]
    pub fn matches(&self, stored: &StoredSecret, plaintext: &str) -> bool {
        self.reveal(stored).expose_secret() == plaintext
    }
}
