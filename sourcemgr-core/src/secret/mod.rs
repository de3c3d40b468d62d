//! Credential protection for `SourceMgr`
//!
//! Endpoint secrets are sealed at rest by the [`CredentialVault`] with key
//! material from a [`KeyStore`]. Configurations written by older versions
//! may contain plaintext secrets; [`migrate_endpoints`] reseals them on load.

mod key_store;
mod migration;
mod vault;

pub use key_store::{
    KEY_FILE_NAME, KEY_LEN, KeyMaterial, KeyStore, MachineKeyStore, StaticKeyStore,
    machine_identity, user_identity,
};
pub use migration::{MigrationFailure, MigrationReport, migrate_endpoints};
pub use vault::CredentialVault;
