//! Fixed feature schema shared by extraction, persistence and recommendation
//!
//! Every acoustic feature vector in the system has the same 15 columns in the
//! same order. Stored feature maps and the reference dataset both use these
//! column names.

use serde_json::Value;
use std::collections::BTreeMap;

/// Number of columns in a feature vector
pub const FEATURE_COUNT: usize = 15;

/// Feature columns in vector order
pub const FEATURE_COLUMNS: [&str; FEATURE_COUNT] = [
    "valence",
    "year",
    "acousticness",
    "danceability",
    "duration_ms",
    "energy",
    "explicit",
    "instrumentalness",
    "key",
    "liveness",
    "loudness",
    "mode",
    "popularity",
    "speechiness",
    "tempo",
];

/// Named feature values as persisted on a feature record
///
/// Values are JSON numbers when written by the extraction pipeline. Records
/// in the store may hold anything, so readers coerce through
/// [`to_ordered_vector`].
pub type FeatureMap = BTreeMap<String, Value>;

/// Ordered feature vector (see [`FEATURE_COLUMNS`])
pub type FeatureVector = [f64; FEATURE_COUNT];

/// Position of a column in the vector
pub fn column_index(column: &str) -> Option<usize> {
    FEATURE_COLUMNS.iter().position(|c| *c == column)
}

/// Build the ordered vector from a feature map
///
/// Absent columns read as 0.0. Returns `None` when a present value cannot be
/// read as a float (null, text that is not a number, arrays, objects).
pub fn to_ordered_vector(features: &FeatureMap) -> Option<FeatureVector> {
    let mut vector = [0.0; FEATURE_COUNT];
    for (slot, column) in vector.iter_mut().zip(FEATURE_COLUMNS.iter()) {
        if let Some(value) = features.get(*column) {
            *slot = value_as_f64(value)?;
        }
    }
    Some(vector)
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
