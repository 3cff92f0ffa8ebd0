//! Feature extraction pipeline
//!
//! One extraction turns a song's audio URL into a stored [`FeatureRecord`]:
//!
//! 1. Scoped working directory (removed on every exit path)
//! 2. URL alias rewrite for local development hosts
//! 3. Streamed download with timeout
//! 4. Tag read, degrading to defaults on failure
//! 5. Caller-supplied name/album override
//! 6. Audio analysis on the worker's own analyzer
//! 7. Descriptor codec
//! 8. Full-replace upsert keyed by song id
//!
//! A failure in steps 3-8 abandons that song only. Nothing is written unless
//! every step succeeds, and errors never propagate past
//! [`ExtractionPipeline::extract_and_store`].

pub mod backfill;
pub mod pool;

pub use backfill::{spawn_startup_backfill, BackfillReport, BackfillScheduler};
pub use pool::{ExtractionPool, WorkerAnalyzer, MIN_WORKERS};

use crate::analyzer::AnalysisError;
use crate::codec;
use crate::db;
use crate::services::{audio_file_name, normalize_url, read_song_metadata, url_stem};
use crate::services::{DownloadError, Downloader};
use mrs_common::db::{FeatureRecord, SongMetadata};
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};

/// Why one extraction was abandoned
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Working directory: {0}")]
    WorkDir(#[from] std::io::Error),

    #[error("Download: {0}")]
    Download(#[from] DownloadError),

    #[error("Analysis: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Store: {0}")]
    Store(#[from] mrs_common::Error),
}

/// Work item for one song
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionRequest {
    pub song_id: String,
    pub source_url: String,
    /// Overrides the tag title when present
    pub name: Option<String>,
    /// Overrides the tag album when present
    pub album: Option<String>,
}

impl ExtractionRequest {
    pub fn new(song_id: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            song_id: song_id.into(),
            source_url: source_url.into(),
            name: None,
            album: None,
        }
    }
}

/// Result of one extraction, for logging and backfill accounting
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    Stored { song_id: String, feature_count: usize },
    Failed { song_id: String, reason: String },
}

impl ExtractionOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, ExtractionOutcome::Stored { .. })
    }

    pub fn song_id(&self) -> &str {
        match self {
            ExtractionOutcome::Stored { song_id, .. } | ExtractionOutcome::Failed { song_id, .. } => {
                song_id
            }
        }
    }
}

/// Shared, stateless part of extraction
///
/// The analyzer is not held here; each pool worker passes its own.
pub struct ExtractionPipeline {
    db: SqlitePool,
    downloader: Downloader,
    url_aliases: BTreeMap<String, String>,
    /// Parent of per-song working directories; system temp dir when unset
    work_root: Option<PathBuf>,
}

impl ExtractionPipeline {
    pub fn new(db: SqlitePool, downloader: Downloader, url_aliases: BTreeMap<String, String>) -> Self {
        Self {
            db,
            downloader,
            url_aliases,
            work_root: None,
        }
    }

    /// Create working directories under `root` instead of the system temp dir
    pub fn with_work_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.work_root = Some(root.into());
        self
    }

    /// Run every step for one song; never returns an error
    pub async fn extract_and_store(
        &self,
        request: &ExtractionRequest,
        analyzer: &mut WorkerAnalyzer,
    ) -> ExtractionOutcome {
        match self.try_extract(request, analyzer).await {
            Ok(record) => ExtractionOutcome::Stored {
                song_id: record.song_id,
                feature_count: record.features.len(),
            },
            Err(e) => {
                error!(song_id = %request.song_id, "Feature extraction failed: {}", e);
                ExtractionOutcome::Failed {
                    song_id: request.song_id.clone(),
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn try_extract(
        &self,
        request: &ExtractionRequest,
        analyzer: &mut WorkerAnalyzer,
    ) -> Result<FeatureRecord, ExtractionError> {
        let song_id = request.song_id.as_str();

        // Dropping the TempDir removes it, whichever way this function exits
        let mut builder = tempfile::Builder::new();
        builder.prefix("audio_");
        let work_dir = match &self.work_root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        let audio_path = work_dir
            .path()
            .join(audio_file_name(&request.source_url, song_id));

        let download_url = normalize_url(&request.source_url, &self.url_aliases);
        info!(song_id = %song_id, url = %download_url, "Downloading audio");
        let bytes = self.downloader.download(&download_url, &audio_path).await?;

        info!(song_id = %song_id, bytes, "Extracting metadata");
        let fallback_name = url_stem(&request.source_url).unwrap_or_else(|| song_id.to_string());
        let mut metadata = read_metadata_or_default(&audio_path, &fallback_name).await;
        if let Some(name) = request.name.as_deref().filter(|n| !n.trim().is_empty()) {
            metadata.name = name.to_string();
        }
        if let Some(album) = request.album.as_deref().filter(|a| !a.trim().is_empty()) {
            metadata.album = album.to_string();
        }

        info!(song_id = %song_id, "Running audio analysis");
        let descriptors = analyzer.analyze(audio_path.clone()).await?;
        let features = codec::to_feature_map(&descriptors, metadata.year, metadata.duration_ms);

        let record = FeatureRecord {
            song_id: song_id.to_string(),
            file: request.source_url.clone(),
            metadata,
            features,
            updated_at: mrs_common::time::now(),
        };
        db::upsert_feature_record(&self.db, &record).await?;

        info!(
            song_id = %song_id,
            keys = ?record.features.keys().collect::<Vec<_>>(),
            "Stored feature set"
        );

        Ok(record)
    }
}

/// Tag metadata, or defaults named after `fallback_name` when tags cannot be read
async fn read_metadata_or_default(audio_path: &Path, fallback_name: &str) -> SongMetadata {
    let path = audio_path.to_path_buf();
    let name = fallback_name.to_string();
    let result = tokio::task::spawn_blocking(move || read_song_metadata(&path, &name)).await;

    match result {
        Ok(Ok(metadata)) => metadata,
        Ok(Err(e)) => {
            warn!(file = %audio_path.display(), "Metadata extraction skipped: {}", e);
            SongMetadata::with_name(fallback_name)
        }
        Err(e) => {
            warn!(file = %audio_path.display(), "Metadata task failed: {}", e);
            SongMetadata::with_name(fallback_name)
        }
    }
}
