//! CLI configuration handling.

use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use keyward_core::BackendKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Which credential backend to open. Defaults to the OS keyring so an
    /// unreachable keyring is reported instead of silently using memory.
    pub backend: BackendKind,

    /// Logging level, used when `RUST_LOG` is not set.
    pub log_level: String,

    /// Prefix for the bookkeeping entries the keyring backend keeps.
    pub index_namespace: String,

    /// Path to the configuration file that was loaded.
    #[serde(skip)]
    pub config_path: PathBuf,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Keyring,
            log_level: "info".to_string(),
            index_namespace: "keyward".to_string(),
            config_path: PathBuf::new(),
        }
    }
}

/// Load configuration.
///
/// An explicit path must exist. Without one, the default location is used and
/// a missing file means defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<CliConfig> {
    let config_path = match explicit {
        Some(path) => {
            if !path.exists() {
                bail!("config file {:?} does not exist", path);
            }
            path.to_path_buf()
        }
        None => default_config_path(),
    };

    let mut config = if config_path.exists() {
        let contents = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config from {:?}", config_path))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {:?}", config_path))?
    } else {
        CliConfig::default()
    };

    if config.index_namespace.trim().is_empty() {
        bail!("index_namespace in {:?} must not be empty", config_path);
    }

    config.config_path = config_path;
    Ok(config)
}

/// Default config file location, e.g. `~/.config/keyward/config.toml` on Linux.
pub fn default_config_path() -> PathBuf {
    project_dirs()
        .map(|d| d.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("keyward.toml"))
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "keyward", "keyward")
}
