//! Audio analysis
//!
//! An [`AudioAnalyzer`] turns an audio file into a flat pool of named
//! descriptors (`"rhythm.bpm"`, `"tonal.key_key"`, ...). Analyzer instances are
//! not safe for concurrent reuse: each extraction worker creates its own via
//! an [`AnalyzerFactory`] and keeps it for every task it runs.

pub mod essentia;

pub use essentia::{essentia_factory, EssentiaExtractor, EssentiaSettings};

use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Flattened analyzer output, keyed by dotted descriptor path
pub type DescriptorPool = BTreeMap<String, Value>;

/// Analyzer errors
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Analyzer executable could not be located
    #[error("Analyzer binary not found: {0}")]
    BinaryNotFound(String),

    /// Analyzer process could not be run
    #[error("Failed to execute analyzer: {0}")]
    Execution(String),

    /// Analyzer ran and reported failure
    #[error("Analysis failed: {0}")]
    Failed(String),

    /// Analyzer output was not valid JSON
    #[error("Failed to parse analyzer output: {0}")]
    Parse(String),

    /// Audio file not found at path
    #[error("Audio file not found: {0}")]
    FileNotFound(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Extracts descriptors from one audio file at a time
///
/// Implementations may hold native or process state and are driven from a
/// blocking thread, one call at a time.
pub trait AudioAnalyzer: Send {
    fn analyze(&mut self, audio_path: &Path) -> Result<DescriptorPool, AnalysisError>;
}

/// Creates a fresh analyzer for a worker
pub type AnalyzerFactory =
    Arc<dyn Fn() -> Result<Box<dyn AudioAnalyzer>, AnalysisError> + Send + Sync>;

/// Flatten nested analyzer JSON into dotted keys
///
/// Objects are descended into; every other value (numbers, strings, arrays)
/// is a leaf.
pub fn flatten_descriptors(root: &Value) -> DescriptorPool {
    let mut pool = DescriptorPool::new();
    flatten_into(&mut pool, String::new(), root);
    pool
}

fn flatten_into(pool: &mut DescriptorPool, prefix: String, value: &Value) {
    match value {
        Value::Object(map) => {
            for (name, child) in map {
                let key = if prefix.is_empty() {
                    name.clone()
                } else {
                    format!("{}.{}", prefix, name)
                };
                flatten_into(pool, key, child);
            }
        }
        leaf => {
            if !prefix.is_empty() {
                pool.insert(prefix, leaf.clone());
            }
        }
    }
}
