//! Fake analyzer and catalogs

use async_trait::async_trait;
use mrs_recommender::analyzer::{AnalysisError, AnalyzerFactory, AudioAnalyzer, DescriptorPool};
use mrs_recommender::services::{CatalogError, CatalogSong, SongCatalog};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;

/// Observes what fake analyzers did
#[derive(Clone, Default)]
pub struct FakeAnalyzerTracker {
    created: Arc<AtomicUsize>,
    analyzed: Arc<Mutex<Vec<Analyzed>>>,
}

/// One analyze call
#[derive(Debug, Clone)]
pub struct Analyzed {
    pub instance: usize,
    pub path: PathBuf,
    pub thread: ThreadId,
}

impl FakeAnalyzerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Analyzer instances created so far
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn analyzed(&self) -> Vec<Analyzed> {
        self.analyzed.lock().unwrap().clone()
    }

    /// Factory for analyzers reporting to this tracker
    ///
    /// Output depends on the audio file name:
    /// - contains `fail`: analysis error
    /// - otherwise: valence taken from the leading number of the stem, if any
    pub fn factory(&self) -> AnalyzerFactory {
        let tracker = self.clone();
        Arc::new(move || {
            let instance = tracker.created.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeAnalyzer {
                instance,
                analyzed: Arc::clone(&tracker.analyzed),
            }) as Box<dyn AudioAnalyzer>)
        })
    }
}

struct FakeAnalyzer {
    instance: usize,
    analyzed: Arc<Mutex<Vec<Analyzed>>>,
}

impl AudioAnalyzer for FakeAnalyzer {
    fn analyze(&mut self, audio_path: &Path) -> Result<DescriptorPool, AnalysisError> {
        self.analyzed.lock().unwrap().push(Analyzed {
            instance: self.instance,
            path: audio_path.to_path_buf(),
            thread: std::thread::current().id(),
        });

        // Give other workers a chance to overlap
        std::thread::sleep(std::time::Duration::from_millis(15));

        let stem = audio_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        if stem.contains("fail") {
            return Err(AnalysisError::Failed("fake analyzer refused".to_string()));
        }

        let valence: f64 = stem
            .split('_')
            .next()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.0);

        let mut pool = DescriptorPool::new();
        pool.insert("highlevel.mood_happy.value".to_string(), json!(valence));
        pool.insert("rhythm.bpm".to_string(), json!([118.0]));
        pool.insert("tonal.key_key".to_string(), json!("D#"));
        pool.insert("tonal.key_scale".to_string(), json!("major"));
        pool.insert("metadata.audio_properties.length".to_string(), json!(42.5));
        Ok(pool)
    }
}

/// Catalog with a fixed song list
pub struct StaticCatalog {
    songs: Vec<CatalogSong>,
}

impl StaticCatalog {
    pub fn new(songs: Vec<CatalogSong>) -> Arc<Self> {
        Arc::new(Self { songs })
    }

    pub fn empty() -> Arc<Self> {
        Self::new(Vec::new())
    }

    pub fn song(id: &str, file: Option<String>) -> CatalogSong {
        CatalogSong {
            id: id.to_string(),
            file,
            name: Some(format!("Catalog {}", id)),
            album: None,
        }
    }
}

#[async_trait]
impl SongCatalog for StaticCatalog {
    async fn list_songs(&self) -> Result<Vec<CatalogSong>, CatalogError> {
        Ok(self.songs.clone())
    }
}

/// Catalog that is always down
pub struct FailingCatalog;

#[async_trait]
impl SongCatalog for FailingCatalog {
    async fn list_songs(&self) -> Result<Vec<CatalogSong>, CatalogError> {
        Err(CatalogError::Status(502))
    }
}
