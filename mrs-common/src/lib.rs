//! # MRS Common Library
//!
//! Shared code for the music recommendation service crates:
//! - Database initialization and persisted models
//! - The fixed 15-column feature schema
//! - Bootstrap configuration loading
//! - Timestamp helpers

pub mod config;
pub mod db;
pub mod error;
pub mod features;
pub mod time;

pub use error::{Error, Result};
pub use features::{FeatureMap, FeatureVector, FEATURE_COLUMNS, FEATURE_COUNT};
