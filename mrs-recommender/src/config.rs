//! Service configuration
//!
//! Priority, highest first: command line, `MRS_*` environment variables
//! (both through clap), TOML file, compiled defaults.

use crate::analyzer::essentia::{EssentiaSettings, DEFAULT_BINARY};
use crate::pipeline::pool::DEFAULT_WORKERS;
use crate::pipeline::MIN_WORKERS;
use crate::services::downloader::default_url_aliases;
use clap::Parser;
use mrs_common::config::{load_toml_config, resolve_root_folder, TomlConfig};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Module name, used for the config file name
pub const MODULE_NAME: &str = "mrs-recommender";

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:4003";
pub const DEFAULT_MUSIC_SERVICE_URL: &str = "http://localhost:4000";
pub const DEFAULT_LIMIT: usize = 10;
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 30;

/// Command-line arguments
#[derive(Parser, Debug, Default)]
#[command(name = "mrs-recommender")]
#[command(about = "Audio feature extraction and cluster-based song recommendation")]
#[command(version)]
pub struct CliArgs {
    /// TOML configuration file
    #[arg(short, long, env = "MRS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Folder holding the database and model assets (also MRS_ROOT_FOLDER)
    #[arg(long)]
    pub root_folder: Option<PathBuf>,

    /// Listen address (host:port)
    #[arg(short, long, env = "MRS_BIND_ADDRESS")]
    pub bind: Option<String>,

    /// SQLite database file
    #[arg(short, long, env = "MRS_DATABASE_PATH")]
    pub database: Option<PathBuf>,

    /// Clustering model export (JSON)
    #[arg(long, env = "MRS_MODEL_PATH")]
    pub model_path: Option<PathBuf>,

    /// Reference dataset (CSV)
    #[arg(long, env = "MRS_DATASET_PATH")]
    pub dataset_path: Option<PathBuf>,

    /// Recommendation count when a request gives none
    #[arg(long, env = "MRS_RECOMMENDATION_LIMIT_DEFAULT")]
    pub limit_default: Option<usize>,

    /// Music service base URL (song catalog)
    #[arg(long, env = "MRS_MUSIC_SERVICE_URL")]
    pub music_service_url: Option<String>,

    /// Extraction worker count (minimum 3)
    #[arg(long, env = "MRS_BACKFILL_WORKERS")]
    pub workers: Option<usize>,

    /// Run a backfill pass at startup
    #[arg(long, env = "MRS_BACKFILL_ON_STARTUP")]
    pub backfill_on_startup: Option<bool>,

    /// Skip the startup backfill pass
    #[arg(long)]
    pub no_startup_backfill: bool,

    /// Essentia extractor executable
    #[arg(long, env = "MRS_ESSENTIA_BINARY")]
    pub essentia_binary: Option<String>,
}

/// Fully resolved settings
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_address: String,
    pub database_path: PathBuf,
    pub model_path: PathBuf,
    pub dataset_path: PathBuf,
    pub recommendation_limit_default: usize,
    pub music_service_url: String,
    pub download_timeout: Duration,
    pub backfill_on_startup: bool,
    pub workers: usize,
    pub analyzer: EssentiaSettings,
    pub url_aliases: BTreeMap<String, String>,
    pub log_level: String,
    /// TOML file actually read; `None` when running on defaults
    pub config_file: Option<PathBuf>,
}

impl ServiceConfig {
    /// Read the TOML file (if any) and resolve against `args`
    pub fn load(args: &CliArgs) -> mrs_common::Result<Self> {
        let loaded = load_toml_config(args.config.as_deref(), MODULE_NAME)?;
        let mut config = Self::resolve(args, &loaded.config);
        config.config_file = loaded.source;
        Ok(config)
    }

    /// Merge arguments over TOML values over defaults
    pub fn resolve(args: &CliArgs, toml: &TomlConfig) -> Self {
        let root = resolve_root_folder(
            args.root_folder.as_deref(),
            "MRS_ROOT_FOLDER",
            toml.root_folder.as_deref(),
        );

        let pick_path = |cli: &Option<PathBuf>, file: &Option<PathBuf>, default: PathBuf| {
            cli.clone().or_else(|| file.clone()).unwrap_or(default)
        };

        let backfill_on_startup = if args.no_startup_backfill {
            false
        } else {
            args.backfill_on_startup
                .or(toml.backfill.on_startup)
                .unwrap_or(true)
        };

        Self {
            bind_address: args
                .bind
                .clone()
                .or_else(|| toml.bind_address.clone())
                .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string()),
            database_path: pick_path(&args.database, &toml.database_path, root.join("mrs.db")),
            model_path: pick_path(
                &args.model_path,
                &toml.model_path,
                root.join("ai").join("cluster_model.json"),
            ),
            dataset_path: pick_path(
                &args.dataset_path,
                &toml.dataset_path,
                root.join("ai").join("data.csv"),
            ),
            recommendation_limit_default: args
                .limit_default
                .or(toml.recommendation_limit_default)
                .unwrap_or(DEFAULT_LIMIT),
            music_service_url: args
                .music_service_url
                .clone()
                .or_else(|| toml.music_service_url.clone())
                .unwrap_or_else(|| DEFAULT_MUSIC_SERVICE_URL.to_string()),
            download_timeout: Duration::from_secs(
                toml.download_timeout_secs
                    .unwrap_or(DEFAULT_DOWNLOAD_TIMEOUT_SECS),
            ),
            backfill_on_startup,
            workers: args
                .workers
                .or(toml.backfill.workers)
                .unwrap_or(DEFAULT_WORKERS)
                .max(MIN_WORKERS),
            analyzer: EssentiaSettings {
                binary: args
                    .essentia_binary
                    .clone()
                    .or_else(|| toml.analyzer.binary.clone())
                    .unwrap_or_else(|| DEFAULT_BINARY.to_string()),
                profile: toml.analyzer.profile.clone(),
            },
            url_aliases: toml
                .url_aliases
                .clone()
                .unwrap_or_else(default_url_aliases),
            log_level: toml.logging.level.clone(),
            config_file: None,
        }
    }
}
