//! Integration tests for bootstrap configuration
//!
//! Tests that touch MRS_* environment variables are marked #[serial] so they
//! never run in parallel with each other.

use mrs_common::config::{load_toml_config, resolve_root_folder, TomlConfig};
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[test]
#[serial]
fn test_env_root_folder_beats_toml() {
    env::set_var("MRS_TEST_ROOT_FOLDER", "/tmp/mrs-env-root");

    let resolved = resolve_root_folder(
        None,
        "MRS_TEST_ROOT_FOLDER",
        Some(Path::new("/tmp/mrs-toml-root")),
    );
    assert_eq!(resolved, PathBuf::from("/tmp/mrs-env-root"));

    env::remove_var("MRS_TEST_ROOT_FOLDER");
}

#[test]
#[serial]
fn test_toml_root_folder_used_without_env() {
    env::remove_var("MRS_TEST_ROOT_FOLDER");

    let resolved = resolve_root_folder(
        None,
        "MRS_TEST_ROOT_FOLDER",
        Some(Path::new("/tmp/mrs-toml-root")),
    );
    assert_eq!(resolved, PathBuf::from("/tmp/mrs-toml-root"));
}

#[test]
#[serial]
fn test_blank_env_value_is_ignored() {
    env::set_var("MRS_TEST_ROOT_FOLDER", "   ");

    let resolved = resolve_root_folder(None, "MRS_TEST_ROOT_FOLDER", None);
    assert_eq!(resolved, mrs_common::config::default_root_folder());

    env::remove_var("MRS_TEST_ROOT_FOLDER");
}

#[test]
fn test_load_written_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("mrs-recommender.toml");

    let mut config = TomlConfig::default();
    config.database_path = Some(PathBuf::from("/data/mrs.db"));
    config.backfill.workers = Some(8);
    config.logging.level = "warn".to_string();
    std::fs::write(&path, toml::to_string(&config).unwrap()).unwrap();

    let loaded = load_toml_config(Some(&path), "mrs-recommender").unwrap();
    assert_eq!(loaded.source.as_deref(), Some(path.as_path()));
    assert_eq!(loaded.config.database_path, Some(PathBuf::from("/data/mrs.db")));
    assert_eq!(loaded.config.backfill.workers, Some(8));
    assert_eq!(loaded.config.logging.level, "warn");
}
