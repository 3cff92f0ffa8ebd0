//! Backfill of songs that have no features yet
//!
//! Compares the music service catalog with the feature store and runs an
//! extraction for every song that is missing, through the shared bounded
//! pool. Running it again once everything is stored finds nothing to do.

use super::{ExtractionOutcome, ExtractionPool, ExtractionRequest};
use crate::db;
use crate::services::SongCatalog;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Counts from one backfill pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    /// Catalog songs examined
    pub checked: usize,
    /// Songs without a feature record
    pub missing: usize,
    /// Missing songs that had an audio URL and were extracted
    pub scheduled: usize,
}

/// Drives extraction over the catalog/store gap
pub struct BackfillScheduler {
    catalog: Arc<dyn SongCatalog>,
    db: SqlitePool,
    pool: Arc<ExtractionPool>,
}

impl BackfillScheduler {
    pub fn new(catalog: Arc<dyn SongCatalog>, db: SqlitePool, pool: Arc<ExtractionPool>) -> Self {
        Self { catalog, db, pool }
    }

    /// Extract every catalog song that has no stored features
    ///
    /// Waits for all scheduled extractions to settle. Catalog or store
    /// failures are logged and yield zero counts.
    pub async fn backfill_missing(&self) -> BackfillReport {
        info!("Backfill started");

        let songs = match self.catalog.list_songs().await {
            Ok(songs) => songs,
            Err(e) => {
                warn!("Backfill skipped, song catalog unavailable: {}", e);
                return BackfillReport::default();
            }
        };

        let existing = match db::existing_song_ids(&self.db).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Backfill skipped, feature store unavailable: {}", e);
                return BackfillReport::default();
            }
        };

        info!(catalog = songs.len(), stored = existing.len(), "Backfill comparing catalog");

        let mut report = BackfillReport {
            checked: songs.len(),
            ..BackfillReport::default()
        };

        let mut tasks = FuturesUnordered::new();
        for song in &songs {
            if existing.contains(&song.id) {
                continue;
            }
            report.missing += 1;

            let Some(url) = song.audio_url() else {
                warn!(song_id = %song.id, "Missing features but no audio URL");
                continue;
            };

            let request = ExtractionRequest {
                song_id: song.id.clone(),
                source_url: url.to_string(),
                name: song.name.clone(),
                album: song.album.clone(),
            };
            report.scheduled += 1;
            tasks.push(self.pool.run(request));
        }

        let mut stored = 0usize;
        while let Some(outcome) = tasks.next().await {
            match outcome {
                ExtractionOutcome::Stored { .. } => stored += 1,
                ExtractionOutcome::Failed { song_id, reason } => {
                    warn!(song_id = %song_id, "Backfill extraction failed: {}", reason);
                }
            }
        }

        info!(
            checked = report.checked,
            missing = report.missing,
            scheduled = report.scheduled,
            stored,
            "Backfill completed"
        );

        report
    }
}

/// Run one backfill pass on a detached task
pub fn spawn_startup_backfill(scheduler: Arc<BackfillScheduler>) -> JoinHandle<BackfillReport> {
    tokio::spawn(async move { scheduler.backfill_missing().await })
}
