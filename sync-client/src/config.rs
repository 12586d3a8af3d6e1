//! Configuration loading for the vault.
//!
//! Configuration is loaded from a TOML file. Every field has a default, so
//! an empty file is a valid local-only configuration.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration for a [`Vault`](crate::Vault).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientConfig {
    /// Local storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Remote backend configuration. Absent means local-only.
    #[serde(default)]
    pub remote: Option<RemoteConfig>,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Local storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding records and the key file (default: ./hearth-data).
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Prefix for every composite record key (default: hearth).
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

/// Remote backend configuration.
#[derive(Clone, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the backend.
    pub url: String,
    /// Project API key, sent as `apikey` on every request.
    pub api_key: String,
    /// Session token for the signed-in user. Falls back to `api_key`.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Signed-in user id. Without it there is no identity and sync is offline.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Request timeout in seconds (default: 30).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset (default: info).
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("hearth-data")
}

fn default_key_prefix() -> String {
    "hearth".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            key_prefix: default_key_prefix(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("url", &self.url)
            .field("api_key", &"[REDACTED]")
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("user_id", &self.user_id)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Local-only configuration storing data in `data_dir`.
    pub fn local(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage: StorageConfig {
                data_dir: data_dir.into(),
                ..StorageConfig::default()
            },
            ..Self::default()
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
}
