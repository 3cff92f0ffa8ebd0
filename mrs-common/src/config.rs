//! Bootstrap configuration loading and root folder resolution
//!
//! The TOML file is optional. A missing file yields defaults with a warning;
//! only a file that exists but cannot be read or parsed is an error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Directory name used under platform config/data folders
pub const APP_DIR: &str = "mrs";

/// Bootstrap configuration loaded from TOML file
///
/// Every field is optional; the service layers CLI and environment values on
/// top and falls back to compiled defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TomlConfig {
    /// Folder holding the database and model assets
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// HTTP listen address (`host:port`)
    #[serde(default)]
    pub bind_address: Option<String>,

    /// SQLite database file
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Exported clustering model (scaler + centroids)
    #[serde(default)]
    pub model_path: Option<PathBuf>,

    /// Reference dataset CSV
    #[serde(default)]
    pub dataset_path: Option<PathBuf>,

    /// Recommendation count when the caller gives none
    #[serde(default)]
    pub recommendation_limit_default: Option<usize>,

    /// Base URL of the music catalog service
    #[serde(default)]
    pub music_service_url: Option<String>,

    /// Audio download timeout in seconds
    #[serde(default)]
    pub download_timeout_secs: Option<u64>,

    /// Backfill scheduling
    #[serde(default)]
    pub backfill: BackfillToml,

    /// Audio analyzer settings
    #[serde(default)]
    pub analyzer: AnalyzerToml,

    /// Local-development `host:port` rewrites applied to audio URLs
    #[serde(default)]
    pub url_aliases: Option<BTreeMap<String, String>>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[backfill]` table
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BackfillToml {
    /// Run one backfill pass right after startup
    #[serde(default)]
    pub on_startup: Option<bool>,

    /// Extraction worker count
    #[serde(default)]
    pub workers: Option<usize>,
}

/// `[analyzer]` table
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AnalyzerToml {
    /// Extractor executable name or path
    #[serde(default)]
    pub binary: Option<String>,

    /// Extractor profile file
    #[serde(default)]
    pub profile: Option<PathBuf>,
}

/// `[logging]` table
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// A loaded bootstrap file and where it came from
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    pub config: TomlConfig,
    /// File actually read; `None` when defaults were used
    pub source: Option<PathBuf>,
}

/// Load the TOML bootstrap file
///
/// With `explicit_path` the file is read from there; otherwise the platform
/// locations from [`default_config_path`] are tried. Returns defaults when no
/// file exists.
pub fn load_toml_config(explicit_path: Option<&Path>, module_name: &str) -> Result<LoadedConfig> {
    let path = match explicit_path {
        Some(path) => path.to_path_buf(),
        None => match default_config_path(module_name) {
            Some(path) => path,
            None => {
                warn!("No config file found for {}, using defaults", module_name);
                return Ok(LoadedConfig::default());
            }
        },
    };

    if !path.exists() {
        warn!("Config file {} not found, using defaults", path.display());
        return Ok(LoadedConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config = parse_toml_config(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(LoadedConfig {
        config,
        source: Some(path),
    })
}

/// Parse TOML text into a [`TomlConfig`]
pub fn parse_toml_config(content: &str) -> std::result::Result<TomlConfig, toml::de::Error> {
    toml::from_str(content)
}

/// First existing platform config file for `module_name`
///
/// Linux tries `~/.config/mrs/<module>.toml` then `/etc/mrs/<module>.toml`.
/// Other platforms use the user config directory only.
pub fn default_config_path(module_name: &str) -> Option<PathBuf> {
    let file_name = format!("{}.toml", module_name);
    let user_config = dirs::config_dir().map(|d| d.join(APP_DIR).join(&file_name));

    if let Some(path) = user_config.filter(|p| p.exists()) {
        return Some(path);
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc").join(APP_DIR).join(&file_name);
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Root folder resolution, highest priority first:
/// 1. Command-line argument
/// 2. Environment variable
/// 3. TOML config value
/// 4. OS-dependent default
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    toml_value: Option<&Path>,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = toml_value {
        return path.to_path_buf();
    }

    default_root_folder()
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("./mrs_data"))
}
