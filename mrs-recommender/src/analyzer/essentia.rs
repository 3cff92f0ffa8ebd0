//! Essentia command-line analyzer
//!
//! Runs `essentia_streaming_extractor_music <audio> <output.json> [profile]`
//! and flattens the JSON it writes. Each instance owns a scratch directory
//! for output files, removed when the instance is dropped.

use super::{flatten_descriptors, AnalysisError, AnalyzerFactory, AudioAnalyzer, DescriptorPool};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tempfile::TempDir;

/// Default extractor executable
pub const DEFAULT_BINARY: &str = "essentia_streaming_extractor_music";

/// How to invoke the extractor
#[derive(Debug, Clone)]
pub struct EssentiaSettings {
    /// Executable name (looked up in PATH) or path
    pub binary: String,
    /// Optional extractor profile (YAML)
    pub profile: Option<PathBuf>,
}

impl Default for EssentiaSettings {
    fn default() -> Self {
        Self {
            binary: DEFAULT_BINARY.to_string(),
            profile: None,
        }
    }
}

/// One extractor instance
pub struct EssentiaExtractor {
    binary: PathBuf,
    profile: Option<PathBuf>,
    scratch: TempDir,
    runs: u64,
}

impl EssentiaExtractor {
    /// Locate the binary and prepare a scratch directory
    pub fn new(settings: &EssentiaSettings) -> Result<Self, AnalysisError> {
        let binary = locate_binary(&settings.binary)
            .ok_or_else(|| AnalysisError::BinaryNotFound(settings.binary.clone()))?;

        let scratch = tempfile::Builder::new().prefix("essentia_").tempdir()?;

        tracing::debug!(
            binary = %binary.display(),
            scratch = %scratch.path().display(),
            "Created Essentia extractor"
        );

        Ok(Self {
            binary,
            profile: settings.profile.clone(),
            scratch,
            runs: 0,
        })
    }
}

impl AudioAnalyzer for EssentiaExtractor {
    fn analyze(&mut self, audio_path: &Path) -> Result<DescriptorPool, AnalysisError> {
        if !audio_path.exists() {
            return Err(AnalysisError::FileNotFound(
                audio_path.display().to_string(),
            ));
        }

        self.runs += 1;
        let output_file = self
            .scratch
            .path()
            .join(format!("analysis_{}.json", self.runs));

        let mut command = Command::new(&self.binary);
        command.arg(audio_path).arg(&output_file);
        if let Some(profile) = &self.profile {
            command.arg(profile);
        }

        tracing::debug!(
            audio_file = %audio_path.display(),
            output_file = %output_file.display(),
            "Running Essentia analysis"
        );

        let output = command
            .output()
            .map_err(|e| AnalysisError::Execution(e.to_string()))?;

        if !output.status.success() {
            let _ = std::fs::remove_file(&output_file);
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AnalysisError::Failed(format!(
                "Exit code: {:?}, stderr: {}",
                output.status.code(),
                stderr.trim()
            )));
        }

        let json_content = std::fs::read_to_string(&output_file)?;
        let _ = std::fs::remove_file(&output_file);

        let root: serde_json::Value = serde_json::from_str(&json_content)
            .map_err(|e| AnalysisError::Parse(e.to_string()))?;
        let pool = flatten_descriptors(&root);

        tracing::debug!(
            audio_file = %audio_path.display(),
            descriptors = pool.len(),
            "Essentia analysis completed"
        );

        Ok(pool)
    }
}

/// Factory producing [`EssentiaExtractor`] instances
pub fn essentia_factory(settings: EssentiaSettings) -> AnalyzerFactory {
    let settings = Arc::new(settings);
    Arc::new(move || {
        let extractor = EssentiaExtractor::new(&settings)?;
        Ok(Box::new(extractor) as Box<dyn AudioAnalyzer>)
    })
}

/// Resolve a binary name against PATH, or accept an explicit path
fn locate_binary(binary: &str) -> Option<PathBuf> {
    let candidate = Path::new(binary);
    if candidate.components().count() > 1 || candidate.is_absolute() {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(binary))
        .find(|full| full.is_file())
}
