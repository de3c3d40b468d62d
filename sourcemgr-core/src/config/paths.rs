//! Configuration and data directories

use std::path::{Path, PathBuf};

use crate::error::{ConfigError, ConfigResult};

/// Overrides the configuration directory
pub const CONFIG_DIR_ENV: &str = "SOURCEMGR_CONFIG_DIR";
/// Overrides the data directory holding the vault key
pub const DATA_DIR_ENV: &str = "SOURCEMGR_DATA_DIR";
/// Directory name under the platform config/data roots
pub const APP_DIR_NAME: &str = "sourcemgr";
/// Endpoint list file name
pub const SERVERS_FILE: &str = "servers.json";
/// Settings file name
pub const SETTINGS_FILE: &str = "settings.toml";

/// Expands `~` and environment variables in a user-supplied path
#[must_use]
pub fn expand_path(input: &str) -> PathBuf {
    match shellexpand::full(input) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(input).as_ref()),
    }
}

fn env_dir(name: &str) -> Option<PathBuf> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(|v| expand_path(&v))
}

/// Where configuration and key material live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    config_dir: PathBuf,
    data_dir: PathBuf,
}

impl ConfigPaths {
    /// Uses explicit directories
    #[must_use]
    pub fn new(config_dir: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            data_dir: data_dir.into(),
        }
    }

    /// Resolves directories from the environment, then platform defaults
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoDirectory`] if the platform has no config or
    /// data directory and no override is set.
    pub fn resolve() -> ConfigResult<Self> {
        let config_dir = match env_dir(CONFIG_DIR_ENV) {
            Some(dir) => dir,
            None => dirs::config_dir()
                .ok_or(ConfigError::NoDirectory("configuration"))?
                .join(APP_DIR_NAME),
        };
        let data_dir = match env_dir(DATA_DIR_ENV) {
            Some(dir) => dir,
            None => dirs::data_local_dir()
                .ok_or(ConfigError::NoDirectory("data"))?
                .join(APP_DIR_NAME),
        };
        Ok(Self::new(config_dir, data_dir))
    }

    /// Replaces the configuration directory
    #[must_use]
    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = dir.into();
        self
    }

    /// Configuration directory
    #[must_use]
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Data directory
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Endpoint list file
    #[must_use]
    pub fn servers_file(&self) -> PathBuf {
        self.config_dir.join(SERVERS_FILE)
    }

    /// Settings file
    #[must_use]
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join(SETTINGS_FILE)
    }
}
