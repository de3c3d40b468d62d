//! Persistence of the endpoint list (`servers.json`)

use std::path::{Path, PathBuf};

use tracing::Instrument;

use crate::error::{ConfigError, ConfigResult};
use crate::models::Endpoint;
use crate::secret::{CredentialVault, MigrationReport, migrate_endpoints};
use crate::tracing::span_names;

/// Endpoints read by [`ConfigStore::load`]
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    /// Endpoints in file order
    pub endpoints: Vec<Endpoint>,
    /// Outcome of the secret migration pass
    pub migration: MigrationReport,
    /// True if migration changes were written back
    pub persisted: bool,
}

/// Reads and writes the endpoint list as pretty-printed JSON
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Creates a store for the given file
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> ConfigError {
        ConfigError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Reads endpoints without migrating them.
    ///
    /// A missing or blank file is an empty list.
    ///
    /// # Errors
    ///
    /// Returns an I/O or parse error.
    pub async fn read(&self) -> ConfigResult<Vec<Endpoint>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&text).map_err(|e| ConfigError::Parse {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    /// Loads endpoints and reseals legacy plaintext secrets.
    ///
    /// If the migration changed anything the list is written back before
    /// returning.
    ///
    /// # Errors
    ///
    /// Returns an I/O, parse or write-back error.
    pub async fn load(&self, vault: &CredentialVault) -> ConfigResult<LoadedConfig> {
        let span = tracing::info_span!(span_names::CONFIG_LOAD, path = %self.path.display());
        self.load_inner(vault).instrument(span).await
    }

    async fn load_inner(&self, vault: &CredentialVault) -> ConfigResult<LoadedConfig> {
        let mut endpoints = self.read().await?;
        let migration = migrate_endpoints(vault, &mut endpoints);
        for failure in &migration.failures {
            tracing::warn!(
                endpoint = %failure.label,
                field = failure.field,
                error = %failure.error,
                "Secret left unsealed"
            );
        }

        let persisted = if migration.needs_persist() {
            tracing::info!(
                modified = migration.modified,
                "Migrated plaintext secrets, saving configuration"
            );
            self.save(&endpoints).await?;
            true
        } else {
            false
        };

        tracing::debug!(item_count = endpoints.len(), "Loaded endpoints");
        Ok(LoadedConfig {
            endpoints,
            migration,
            persisted,
        })
    }

    /// Replaces the file with `endpoints`.
    ///
    /// The list is written to a sibling temporary file which is then renamed
    /// over the target, so readers never observe a partial file.
    ///
    /// # Errors
    ///
    /// Returns a serialization or I/O error.
    pub async fn save(&self, endpoints: &[Endpoint]) -> ConfigResult<()> {
        let span = tracing::debug_span!(span_names::CONFIG_SAVE, item_count = endpoints.len());
        self.save_inner(endpoints).instrument(span).await
    }

    async fn save_inner(&self, endpoints: &[Endpoint]) -> ConfigResult<()> {
        let json = serde_json::to_string_pretty(endpoints)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ConfigError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, json.as_bytes())
            .await
            .map_err(|source| ConfigError::Io {
                path: temp_path.clone(),
                source,
            })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = tokio::fs::set_permissions(&temp_path, perms).await;
        }

        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| self.io_error(e))
    }
}
