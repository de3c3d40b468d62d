//! Application settings (`settings.toml`)
//!
//! Every section and field is optional; a missing file yields the defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::connection::{FtpEncryption, RetryConfig, TlsSettings};
use crate::error::{ConfigError, ConfigResult};
use crate::status::ProbeKind;
use crate::tracing::{TracingConfig, TracingLevel, TracingOutput};

const fn default_interval_secs() -> u64 {
    30
}

const fn default_concurrency() -> usize {
    crate::status::DEFAULT_CONCURRENCY
}

const fn default_probe_timeout_ms() -> u64 {
    1000
}

const fn default_query_timeout_ms() -> u64 {
    5000
}

const fn default_connect_timeout_secs() -> u64 {
    10
}

const fn default_retry_attempts() -> u32 {
    crate::connection::DEFAULT_ATTEMPTS
}

const fn default_true() -> bool {
    true
}

/// `[polling]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingSettings {
    /// Seconds between automatic refreshes
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Endpoints polled at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Reachability probe
    #[serde(default)]
    pub probe: ProbeKind,
    /// Probe timeout in milliseconds
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// A2S_INFO timeout in milliseconds
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            concurrency: default_concurrency(),
            probe: ProbeKind::default(),
            probe_timeout_ms: default_probe_timeout_ms(),
            query_timeout_ms: default_query_timeout_ms(),
        }
    }
}

impl PollingSettings {
    /// Refresh interval
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Probe timeout
    #[must_use]
    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Query timeout
    #[must_use]
    pub const fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}

/// `[connection]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Connect timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Connect attempts per acquisition
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// FTP encryption mode
    #[serde(default)]
    pub ftp_encryption: FtpEncryption,
    /// Accept any FTPS certificate
    #[serde(default = "default_true")]
    pub accept_invalid_certificates: bool,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            retry_attempts: default_retry_attempts(),
            ftp_encryption: FtpEncryption::default(),
            accept_invalid_certificates: true,
        }
    }
}

impl ConnectionSettings {
    /// Connect timeout
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Retry policy for pool connects
    #[must_use]
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new().with_attempts(self.retry_attempts)
    }

    /// FTPS settings
    #[must_use]
    pub const fn tls_settings(&self) -> TlsSettings {
        TlsSettings {
            encryption: self.ftp_encryption,
            accept_invalid_certificates: self.accept_invalid_certificates,
        }
    }
}

/// `[logging]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level when no `-v`/`-q` flag is given
    #[serde(default)]
    pub level: TracingLevel,
    /// Append logs to this file instead of stderr
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    /// `EnvFilter` directives, e.g. `"sourcemgr_core=debug,tokio=warn"`.
    /// Overrides `level`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

impl LoggingSettings {
    /// Tracing configuration for these settings
    #[must_use]
    pub fn tracing_config(&self) -> TracingConfig {
        let output = self
            .file
            .as_ref()
            .map_or(TracingOutput::Stderr, |f| TracingOutput::File(f.clone()));
        let config = TracingConfig::new().with_level(self.level).with_output(output);
        match &self.filter {
            Some(filter) => config.with_filter(filter.clone()),
            None => config,
        }
    }
}

/// Contents of `settings.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    /// Status polling
    #[serde(default)]
    pub polling: PollingSettings,
    /// Protocol connections
    #[serde(default)]
    pub connection: ConnectionSettings,
    /// Logging
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl AppSettings {
    /// Parses settings from TOML text
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for invalid TOML and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_toml(text: &str, origin: &Path) -> ConfigResult<Self> {
        let settings: Self = toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: origin.to_path_buf(),
            reason: e.to_string(),
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads settings, returning defaults if the file does not exist
    ///
    /// # Errors
    ///
    /// Returns an I/O, parse or validation error.
    pub async fn load(path: &Path) -> ConfigResult<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Self::from_toml(&text, path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No settings file, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Writes the settings as TOML
    ///
    /// # Errors
    ///
    /// Returns a serialization or I/O error.
    pub async fn save(&self, path: &Path) -> ConfigResult<()> {
        let text =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ConfigError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::write(path, text)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Checks value ranges
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.polling.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "polling.interval_secs must be at least 1".into(),
            ));
        }
        if self.polling.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "polling.concurrency must be at least 1".into(),
            ));
        }
        if self.polling.probe_timeout_ms == 0 || self.polling.query_timeout_ms == 0 {
            return Err(ConfigError::Invalid("polling timeouts must be non-zero".into()));
        }
        if self.connection.connect_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "connection.connect_timeout_secs must be at least 1".into(),
            ));
        }
        if self.connection.retry_attempts == 0 {
            return Err(ConfigError::Invalid(
                "connection.retry_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
