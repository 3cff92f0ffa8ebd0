//! Recommendation engine
//!
//! A query vector is scaled, assigned to its nearest cluster, and compared
//! against every reference row in that cluster. Candidates come back in
//! ascending distance; rows at equal distance keep dataset order.

use super::assets::{squared_distance, RecommendationAssets};
use crate::db;
use mrs_common::features::to_ordered_vector;
use mrs_common::{FeatureVector, FEATURE_COLUMNS};
use ndarray::{Array1, Array2, Axis};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

/// Smallest accepted limit
pub const MIN_LIMIT: usize = 1;

/// Largest accepted limit
pub const MAX_LIMIT: usize = 50;

/// Recommendation errors
#[derive(Debug, Error)]
pub enum RecommendError {
    /// Assets failed to load at startup
    #[error("Recommendation assets not loaded: {0}")]
    Unavailable(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Feature store error: {0}")]
    Store(#[from] mrs_common::Error),
}

/// Whether the engine can serve requests
#[derive(Debug, Clone)]
pub enum EngineState {
    Ready(Arc<RecommendationAssets>),
    /// Load failed; holds the reason
    Unavailable(String),
}

impl EngineState {
    /// Load assets from disk; a failure is logged and yields `Unavailable`
    pub fn load(model_path: &Path, dataset_path: &Path) -> Self {
        match RecommendationAssets::load(model_path, dataset_path) {
            Ok(assets) => {
                info!(
                    rows = assets.dataset().len(),
                    clusters = assets.model().n_clusters(),
                    "Recommendation assets loaded"
                );
                EngineState::Ready(Arc::new(assets))
            }
            Err(e) => {
                error!(
                    model = %model_path.display(),
                    dataset = %dataset_path.display(),
                    "Failed to load recommendation assets: {}",
                    e
                );
                EngineState::Unavailable(e.to_string())
            }
        }
    }
}

/// One recommended reference track
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub id: Option<String>,
    pub name: Option<String>,
    pub artists: Option<String>,
    pub year: Option<i64>,
    pub popularity: Option<i64>,
    /// Euclidean distance in scaled space
    pub distance: f64,
    /// Unscaled feature cells; null where the dataset had no number
    pub features: BTreeMap<String, Option<f64>>,
}

/// Ranked candidates from the query's cluster
#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub cluster: usize,
    pub candidates: Vec<Candidate>,
}

/// User recommendation plus how many favorites contributed
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecommendation {
    pub cluster: usize,
    pub favorites_used: usize,
    pub candidates: Vec<Candidate>,
}

pub struct RecommendationEngine {
    state: EngineState,
    db: SqlitePool,
    default_limit: usize,
}

impl RecommendationEngine {
    pub fn new(state: EngineState, db: SqlitePool, default_limit: usize) -> Self {
        Self {
            state,
            db,
            default_limit: default_limit.clamp(MIN_LIMIT, MAX_LIMIT),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self.state, EngineState::Ready(_))
    }

    pub fn default_limit(&self) -> usize {
        self.default_limit
    }

    /// Requested limit clamped to [`MIN_LIMIT`]..=[`MAX_LIMIT`]
    ///
    /// Absent or non-integer values use the configured default.
    pub fn normalize_limit(&self, requested: Option<&str>) -> usize {
        match requested.map(str::trim).and_then(parse_limit) {
            Some(n) => n.clamp(MIN_LIMIT as i64, MAX_LIMIT as i64) as usize,
            None => self.default_limit,
        }
    }

    fn assets(&self) -> Result<&RecommendationAssets, RecommendError> {
        match &self.state {
            EngineState::Ready(assets) => Ok(assets),
            EngineState::Unavailable(reason) => Err(RecommendError::Unavailable(reason.clone())),
        }
    }

    /// Recommend from an unscaled feature vector
    pub fn recommend(&self, query: &FeatureVector, limit: usize) -> Result<Recommendation, RecommendError> {
        let assets = self.assets()?;
        let scaled = assets.scaler().transform(query);
        rank(assets, &scaled, limit)
    }

    /// Recommend tracks similar to a stored song
    pub async fn recommend_for_song(
        &self,
        song_id: &str,
        limit: usize,
    ) -> Result<Recommendation, RecommendError> {
        let assets = self.assets()?;

        let record = db::find_feature_record(&self.db, song_id)
            .await?
            .filter(|r| !r.features.is_empty())
            .ok_or_else(|| RecommendError::NotFound("Song features not found".to_string()))?;

        let vector = to_ordered_vector(&record.features)
            .ok_or_else(|| RecommendError::NotFound("Song feature vector incomplete".to_string()))?;

        let scaled = assets.scaler().transform(&vector);
        rank(assets, &scaled, limit)
    }

    /// Recommend around the centroid of a user's favorites
    pub async fn recommend_for_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<UserRecommendation, RecommendError> {
        let assets = self.assets()?;

        let favorites = db::favorites_for_user(&self.db, user_id).await?;
        if favorites.is_empty() {
            return Err(RecommendError::NotFound("No favorites found for user".to_string()));
        }

        let song_ids: Vec<String> = favorites
            .into_iter()
            .map(|f| f.song)
            .filter(|s| !s.trim().is_empty())
            .collect();
        if song_ids.is_empty() {
            return Err(RecommendError::NotFound(
                "No favorite songs found for user".to_string(),
            ));
        }

        let records = db::find_feature_records_by_ids(&self.db, &song_ids).await?;
        let vectors: Vec<FeatureVector> = records
            .iter()
            .filter_map(|r| to_ordered_vector(&r.features))
            .collect();
        if vectors.is_empty() {
            return Err(RecommendError::NotFound(
                "No extracted features for favorites".to_string(),
            ));
        }

        let mut scaled = Array2::<f64>::zeros((vectors.len(), FEATURE_COLUMNS.len()));
        for (mut row, vector) in scaled.axis_iter_mut(Axis(0)).zip(vectors.iter()) {
            row.assign(&assets.scaler().transform(vector));
        }
        let centroid = scaled
            .mean_axis(Axis(0))
            .ok_or_else(|| RecommendError::NotFound("No extracted features for favorites".to_string()))?;

        let recommendation = rank(assets, &centroid, limit)?;
        Ok(UserRecommendation {
            cluster: recommendation.cluster,
            favorites_used: vectors.len(),
            candidates: recommendation.candidates,
        })
    }
}

/// Integer value of `text`; integers too large for `i64` saturate by sign
fn parse_limit(text: &str) -> Option<i64> {
    if let Ok(n) = text.parse::<i64>() {
        return Some(n);
    }
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(if negative { i64::MIN } else { i64::MAX })
}

/// Cluster the scaled query and rank that cluster's rows by distance
fn rank(
    assets: &RecommendationAssets,
    scaled_query: &Array1<f64>,
    limit: usize,
) -> Result<Recommendation, RecommendError> {
    let cluster = assets.model().predict(scaled_query.view());

    let mut members: Vec<(usize, f64)> = assets
        .labels()
        .iter()
        .enumerate()
        .filter(|(_, label)| **label == cluster)
        .map(|(row, _)| {
            let distance = squared_distance(assets.scaled().row(row), scaled_query.view()).sqrt();
            (row, distance)
        })
        .collect();

    if members.is_empty() {
        return Err(RecommendError::NotFound("No similar songs in dataset".to_string()));
    }

    // sort_by is stable, so equal distances keep dataset order
    members.sort_by(|a, b| a.1.total_cmp(&b.1));
    members.truncate(limit.max(MIN_LIMIT));

    let rows = assets.dataset().rows();
    let candidates = members
        .into_iter()
        .map(|(index, distance)| {
            let row = &rows[index];
            Candidate {
                id: row.id.clone(),
                name: row.name.clone(),
                artists: row.artists.clone(),
                year: row.year,
                popularity: row.popularity,
                distance,
                features: FEATURE_COLUMNS
                    .iter()
                    .zip(row.features.iter())
                    .map(|(column, value)| (column.to_string(), *value))
                    .collect(),
            }
        })
        .collect();

    Ok(Recommendation { cluster, candidates })
}
