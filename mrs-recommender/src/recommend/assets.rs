//! Pre-trained recommendation assets
//!
//! The model file is a JSON export of the fitted scaling + clustering
//! pipeline:
//!
//! ```json
//! {"scaler": {"mean": [..15], "scale": [..15]},
//!  "kmeans": {"cluster_centers": [[..15], ...]}}
//! ```
//!
//! The reference dataset is a CSV with at least the 15 feature columns; `id`,
//! `name`, `artists` are used for display when present.

use mrs_common::{FeatureVector, FEATURE_COLUMNS, FEATURE_COUNT};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

/// Asset loading errors
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Failed to read {0}: {1}")]
    Io(String, std::io::Error),

    #[error("Invalid model file: {0}")]
    Model(String),

    #[error("Invalid dataset: {0}")]
    Dataset(String),

    #[error("Dataset missing feature columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}

/// Per-feature standardization `(x - mean) / scale`
#[derive(Debug, Clone)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    /// Zero (or non-finite) scale entries are treated as 1.0
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self, AssetError> {
        if mean.len() != FEATURE_COUNT || scale.len() != FEATURE_COUNT {
            return Err(AssetError::Model(format!(
                "scaler expects {} values, got mean={} scale={}",
                FEATURE_COUNT,
                mean.len(),
                scale.len()
            )));
        }
        let scale = scale
            .into_iter()
            .map(|s| if s == 0.0 || !s.is_finite() { 1.0 } else { s })
            .collect::<Vec<_>>();

        Ok(Self {
            mean: Array1::from_vec(mean),
            scale: Array1::from_vec(scale),
        })
    }

    pub fn transform(&self, vector: &FeatureVector) -> Array1<f64> {
        (&ArrayView1::from(&vector[..]) - &self.mean) / &self.scale
    }

    /// Scale every row of an `n x 15` matrix
    pub fn transform_rows(&self, rows: &Array2<f64>) -> Array2<f64> {
        (rows - &self.mean) / &self.scale
    }
}

/// Nearest-centroid cluster assignment
#[derive(Debug, Clone)]
pub struct KMeansModel {
    centers: Array2<f64>,
}

impl KMeansModel {
    pub fn new(cluster_centers: Vec<Vec<f64>>) -> Result<Self, AssetError> {
        if cluster_centers.is_empty() {
            return Err(AssetError::Model("no cluster centers".to_string()));
        }
        if let Some(bad) = cluster_centers.iter().position(|c| c.len() != FEATURE_COUNT) {
            return Err(AssetError::Model(format!(
                "cluster center {} has {} values, expected {}",
                bad,
                cluster_centers[bad].len(),
                FEATURE_COUNT
            )));
        }

        let n_clusters = cluster_centers.len();
        let flat: Vec<f64> = cluster_centers.into_iter().flatten().collect();
        let centers = Array2::from_shape_vec((n_clusters, FEATURE_COUNT), flat)
            .map_err(|e| AssetError::Model(e.to_string()))?;
        Ok(Self { centers })
    }

    pub fn n_clusters(&self) -> usize {
        self.centers.nrows()
    }

    /// Cluster whose centroid is closest to the scaled vector; ties go to the
    /// lower cluster id
    pub fn predict(&self, scaled: ArrayView1<f64>) -> usize {
        let mut best = 0;
        let mut best_distance = f64::INFINITY;
        for (cluster, center) in self.centers.axis_iter(Axis(0)).enumerate() {
            let distance = squared_distance(center, scaled);
            if distance < best_distance {
                best = cluster;
                best_distance = distance;
            }
        }
        best
    }
}

pub(crate) fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

#[derive(Debug, Deserialize)]
struct ModelFile {
    scaler: ScalerParams,
    kmeans: KMeansParams,
}

#[derive(Debug, Deserialize)]
struct ScalerParams {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct KMeansParams {
    cluster_centers: Vec<Vec<f64>>,
}

/// Parse the JSON model export
pub fn parse_model(json: &str) -> Result<(StandardScaler, KMeansModel), AssetError> {
    let file: ModelFile = serde_json::from_str(json).map_err(|e| AssetError::Model(e.to_string()))?;
    let scaler = StandardScaler::new(file.scaler.mean, file.scaler.scale)?;
    let model = KMeansModel::new(file.kmeans.cluster_centers)?;
    Ok((scaler, model))
}

/// One reference track
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceRow {
    pub id: Option<String>,
    pub name: Option<String>,
    pub artists: Option<String>,
    pub year: Option<i64>,
    pub popularity: Option<i64>,
    /// Raw feature cells in column order; `None` when missing or non-numeric
    pub features: [Option<f64>; FEATURE_COUNT],
}

impl ReferenceRow {
    /// Feature vector with missing cells as 0.0
    pub fn vector(&self) -> FeatureVector {
        let mut vector = [0.0; FEATURE_COUNT];
        for (slot, cell) in vector.iter_mut().zip(self.features.iter()) {
            *slot = cell.unwrap_or(0.0);
        }
        vector
    }
}

/// Reference tracks recommendations are drawn from
#[derive(Debug, Clone, Default)]
pub struct ReferenceDataset {
    rows: Vec<ReferenceRow>,
}

impl ReferenceDataset {
    pub fn from_rows(rows: Vec<ReferenceRow>) -> Self {
        Self { rows }
    }

    pub fn from_csv_path(path: &Path) -> Result<Self, AssetError> {
        let file = std::fs::File::open(path)
            .map_err(|e| AssetError::Io(path.display().to_string(), e))?;
        Self::from_csv_reader(file)
    }

    /// Parse CSV with a header row; every feature column must be present
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, AssetError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader
            .headers()
            .map_err(|e| AssetError::Dataset(e.to_string()))?
            .clone();
        let position = |name: &str| headers.iter().position(|h| h == name);

        let missing: Vec<String> = FEATURE_COLUMNS
            .iter()
            .filter(|c| position(**c).is_none())
            .map(|c| c.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(AssetError::MissingColumns(missing));
        }

        let feature_positions: Vec<usize> = FEATURE_COLUMNS.iter().filter_map(|c| position(*c)).collect();
        let id_pos = position("id");
        let name_pos = position("name");
        let artists_pos = position("artists");
        let year_pos = position("year");
        let popularity_pos = position("popularity");

        let mut rows = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record.map_err(|e| AssetError::Dataset(format!("row {}: {}", line + 1, e)))?;
            let text = |pos: Option<usize>| {
                pos.and_then(|p| record.get(p))
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            };
            let number = |pos: Option<usize>| pos.and_then(|p| record.get(p)).and_then(parse_cell);

            let mut features = [None; FEATURE_COUNT];
            for (slot, pos) in features.iter_mut().zip(feature_positions.iter()) {
                *slot = number(Some(*pos));
            }

            rows.push(ReferenceRow {
                id: text(id_pos),
                name: text(name_pos),
                artists: text(artists_pos),
                year: number(year_pos).map(|v| v as i64),
                popularity: number(popularity_pos).map(|v| v as i64),
                features,
            });
        }

        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[ReferenceRow] {
        &self.rows
    }

    /// `n x 15` matrix of row vectors (missing cells as 0.0)
    pub fn feature_matrix(&self) -> Array2<f64> {
        let mut matrix = Array2::zeros((self.rows.len(), FEATURE_COUNT));
        for (mut target, row) in matrix.axis_iter_mut(Axis(0)).zip(self.rows.iter()) {
            target.assign(&ArrayView1::from(&row.vector()[..]));
        }
        matrix
    }
}

fn parse_cell(cell: &str) -> Option<f64> {
    cell.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Everything the engine needs, immutable after construction
#[derive(Debug)]
pub struct RecommendationAssets {
    scaler: StandardScaler,
    model: KMeansModel,
    dataset: ReferenceDataset,
    scaled: Array2<f64>,
    labels: Vec<usize>,
}

impl RecommendationAssets {
    /// Load the model export and dataset from disk
    ///
    /// A dataset with a header but no rows is rejected.
    pub fn load(model_path: &Path, dataset_path: &Path) -> Result<Self, AssetError> {
        let json = std::fs::read_to_string(model_path)
            .map_err(|e| AssetError::Io(model_path.display().to_string(), e))?;
        let (scaler, model) = parse_model(&json)?;
        let dataset = ReferenceDataset::from_csv_path(dataset_path)?;
        if dataset.is_empty() {
            return Err(AssetError::Dataset("no reference rows".to_string()));
        }
        Ok(Self::from_parts(scaler, model, dataset))
    }

    /// Scale the dataset and assign each row its cluster
    pub fn from_parts(scaler: StandardScaler, model: KMeansModel, dataset: ReferenceDataset) -> Self {
        let scaled = scaler.transform_rows(&dataset.feature_matrix());
        let labels = scaled
            .axis_iter(Axis(0))
            .map(|row| model.predict(row))
            .collect();

        Self {
            scaler,
            model,
            dataset,
            scaled,
            labels,
        }
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn model(&self) -> &KMeansModel {
        &self.model
    }

    pub fn dataset(&self) -> &ReferenceDataset {
        &self.dataset
    }

    /// Scaled reference matrix, row-aligned with the dataset
    pub fn scaled(&self) -> &Array2<f64> {
        &self.scaled
    }

    /// Cluster of each reference row
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }
}
