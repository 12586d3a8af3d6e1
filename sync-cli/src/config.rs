//! Configuration resolution for the `hearth` CLI.
//!
//! Order of precedence for the data directory: `--data-dir`, then the
//! config file's `storage.data_dir`, then the platform data directory.

use anyhow::{Context, Result};
use hearth_sync_client::{ClientConfig, StorageConfig};
use std::path::{Path, PathBuf};

/// Name of the config file looked up in the platform config directory.
pub const CONFIG_FILE: &str = "hearth.toml";

/// Resolve the effective configuration.
pub fn load(config_path: Option<&Path>, data_dir: Option<PathBuf>) -> Result<ClientConfig> {
    let mut config = match config_path {
        Some(path) => ClientConfig::from_file(path)?,
        None => match default_config_path() {
            Some(path) if path.exists() => ClientConfig::from_file(&path)?,
            _ => ClientConfig {
                storage: StorageConfig {
                    data_dir: default_data_dir()?,
                    ..Default::default()
                },
                ..Default::default()
            },
        },
    };

    if let Some(dir) = data_dir {
        config.storage.data_dir = dir;
    }
    Ok(config)
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("app", "hearth", "hearth")
}

/// Config file in the platform config directory, if one can be determined.
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

/// Platform data directory for the vault.
pub fn default_data_dir() -> Result<PathBuf> {
    let dirs = project_dirs().context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}

/// Set directory permissions to 0700 (owner only) on Unix.
/// No-op on non-Unix platforms.
pub async fn set_dir_permissions_0700(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
            .await
            .context("Failed to set directory permissions")?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}
