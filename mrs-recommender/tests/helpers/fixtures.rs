//! Recommendation asset fixtures
//!
//! Four clusters separated along `valence` (centers -10, 0, 10, 100). Every
//! reference row and every seeded song has year 1999 and popularity 40, all
//! other features zero, so distances differ only through valence. The
//! cluster at 100 has no reference rows.

use mrs_common::db::{FeatureRecord, SongMetadata};
use mrs_common::{FeatureMap, FEATURE_COLUMNS, FEATURE_COUNT};
use mrs_recommender::recommend::{
    KMeansModel, RecommendationAssets, ReferenceDataset, ReferenceRow, StandardScaler,
};
use serde_json::json;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};

/// Cluster centers on the valence axis
pub const CENTERS: [f64; 4] = [-10.0, 0.0, 10.0, 100.0];

/// (id, valence) reference rows, in dataset order
const ROWS: [(&str, f64); 14] = [
    ("n1", -12.0),
    ("n2", -11.0),
    ("n3", -10.0),
    ("n4", -9.0),
    ("n5", -8.0),
    ("n6", -10.5),
    ("m1", -1.0),
    ("m2", 0.0),
    ("m3", 1.0),
    ("m4", 2.0),
    ("m5", 3.0),
    ("m6", 4.0),
    ("h1", 9.0),
    ("h2", 11.0),
];

fn centers() -> Vec<Vec<f64>> {
    CENTERS
        .iter()
        .map(|c| {
            let mut center = vec![0.0; FEATURE_COUNT];
            center[0] = *c;
            center
        })
        .collect()
}

/// Identity scaling, except `explicit` has a zero scale (treated as 1.0)
fn scaler_params() -> (Vec<f64>, Vec<f64>) {
    let mean = vec![0.0; FEATURE_COUNT];
    let mut scale = vec![1.0; FEATURE_COUNT];
    scale[6] = 0.0;
    (mean, scale)
}

fn reference_rows() -> Vec<ReferenceRow> {
    ROWS.iter()
        .map(|(id, valence)| {
            let mut features = [Some(0.0); FEATURE_COUNT];
            features[0] = Some(*valence);
            features[1] = Some(1999.0);
            features[12] = Some(40.0);
            ReferenceRow {
                id: Some(id.to_string()),
                name: Some(format!("Reference {}", id)),
                artists: Some("['Fixture Band']".to_string()),
                year: Some(1999),
                popularity: Some(40),
                features,
            }
        })
        .collect()
}

pub fn fixture_assets() -> RecommendationAssets {
    let (mean, scale) = scaler_params();
    RecommendationAssets::from_parts(
        StandardScaler::new(mean, scale).unwrap(),
        KMeansModel::new(centers()).unwrap(),
        ReferenceDataset::from_rows(reference_rows()),
    )
}

/// Write the same fixture as model JSON + dataset CSV; returns their paths
pub fn write_asset_files(dir: &Path) -> (PathBuf, PathBuf) {
    let (mean, scale) = scaler_params();
    let model_path = dir.join("cluster_model.json");
    let model = json!({
        "scaler": {"mean": mean, "scale": scale},
        "kmeans": {"cluster_centers": centers()}
    });
    std::fs::write(&model_path, model.to_string()).unwrap();

    let mut csv = String::from("id,name,artists,");
    csv.push_str(&FEATURE_COLUMNS.join(","));
    csv.push('\n');
    for (id, valence) in ROWS {
        let mut cells = vec![
            id.to_string(),
            format!("Reference {}", id),
            "Fixture Band".to_string(),
        ];
        for column in FEATURE_COLUMNS {
            cells.push(match column {
                "valence" => valence.to_string(),
                "year" => "1999".to_string(),
                "popularity" => "40".to_string(),
                _ => "0".to_string(),
            });
        }
        csv.push_str(&cells.join(","));
        csv.push('\n');
    }
    let dataset_path = dir.join("data.csv");
    std::fs::write(&dataset_path, csv).unwrap();

    (model_path, dataset_path)
}

/// Full 15-column feature map matching the fixture rows except for `valence`
pub fn features_with_valence(valence: f64) -> FeatureMap {
    FEATURE_COLUMNS
        .iter()
        .map(|column| {
            let value = match *column {
                "valence" => json!(valence),
                "year" => json!(1999),
                "popularity" => json!(40),
                _ => json!(0),
            };
            (column.to_string(), value)
        })
        .collect()
}

/// Store a feature record directly
pub async fn seed_feature_record(db: &SqlitePool, song_id: &str, features: FeatureMap) {
    let record = FeatureRecord {
        song_id: song_id.to_string(),
        file: format!("http://music-service:4000/uploads/{}.mp3", song_id),
        metadata: SongMetadata::with_name(song_id),
        features,
        updated_at: mrs_common::time::now(),
    };
    mrs_recommender::db::upsert_feature_record(db, &record)
        .await
        .unwrap();
}
