//! Configuration management for `SourceMgr`
//!
//! - [`ConfigStore`] persists the endpoint list as JSON and runs the secret
//!   migration on load.
//! - [`AppSettings`] holds polling, connection and logging settings from
//!   `settings.toml`.
//! - [`ConfigPaths`] resolves where both files (and the vault key) live.

mod paths;
mod settings;
mod store;

pub use paths::{
    APP_DIR_NAME, CONFIG_DIR_ENV, ConfigPaths, DATA_DIR_ENV, SERVERS_FILE, SETTINGS_FILE,
    expand_path,
};
pub use settings::{AppSettings, ConnectionSettings, LoggingSettings, PollingSettings};
pub use store::{ConfigStore, LoadedConfig};
