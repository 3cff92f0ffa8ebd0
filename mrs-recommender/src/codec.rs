//! Descriptor-to-feature codec
//!
//! Turns the analyzer's flattened descriptor pool into the fixed 15-column
//! feature map. Every lookup is tolerant: a missing or malformed descriptor
//! falls back to a default and never fails the extraction.

use crate::analyzer::DescriptorPool;
use mrs_common::FeatureMap;
use serde_json::{json, Value};

/// Descriptor keys read from the analyzer output
pub mod keys {
    pub const BPM: &str = "rhythm.bpm";
    pub const DANCEABILITY: &str = "rhythm.danceability";
    pub const KEY: &str = "tonal.key_key";
    pub const SCALE: &str = "tonal.key_scale";
    pub const MOOD_HAPPY: &str = "highlevel.mood_happy.value";
    pub const ACOUSTIC: &str = "highlevel.acoustic.value";
    pub const ENERGY: &str = "highlevel.energy.value";
    pub const INSTRUMENTAL: &str = "highlevel.instrumental.value";
    pub const LIVE: &str = "highlevel.live.value";
    pub const SPEECHINESS: &str = "highlevel.speechiness.value";
    pub const AVERAGE_LOUDNESS: &str = "lowlevel.average_loudness";
    /// Track length in seconds
    pub const LENGTH: &str = "metadata.audio_properties.length";
}

/// Pitch classes, sharps only
const PITCH_CLASSES: [&str; 12] = [
    "c", "c#", "d", "d#", "e", "f", "f#", "g", "g#", "a", "a#", "b",
];

/// Numeric descriptor value, or `default`
///
/// Accepts a number, a boolean (1.0/0.0), numeric text, or a sequence whose
/// first element is one of those.
pub fn number(pool: &DescriptorPool, key: &str, default: f64) -> f64 {
    pool.get(key).and_then(value_as_number).unwrap_or(default)
}

/// Text descriptor value, or `default`
pub fn string(pool: &DescriptorPool, key: &str, default: &str) -> String {
    pool.get(key)
        .and_then(value_as_string)
        .unwrap_or_else(|| default.to_string())
}

fn value_as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        Value::String(s) => s.trim().parse().ok(),
        Value::Array(items) => items.first().and_then(value_as_number),
        _ => None,
    }
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => items.first().and_then(value_as_string),
        Value::Null | Value::Object(_) => None,
    }
}

/// Pitch class of a key name (C=0 … B=11), -1 when unrecognized
pub fn key_to_index(key: &str) -> i64 {
    let key = key.trim().to_ascii_lowercase();
    PITCH_CLASSES
        .iter()
        .position(|pc| *pc == key)
        .map(|i| i as i64)
        .unwrap_or(-1)
}

/// 1 for major, 0 for any other scale, -1 when no scale was detected
pub fn mode_to_index(scale: &str) -> i64 {
    match scale.trim().to_ascii_lowercase().as_str() {
        "" => -1,
        "major" => 1,
        _ => 0,
    }
}

/// Build the feature map for one analyzed track
///
/// `year` comes from tags (or its default). `duration_ms` from tags wins over
/// the analyzed length; with neither, duration is 0.
pub fn to_feature_map(pool: &DescriptorPool, year: i64, duration_ms: Option<i64>) -> FeatureMap {
    let duration_ms = duration_ms.unwrap_or_else(|| {
        let seconds = number(pool, keys::LENGTH, 0.0);
        if seconds.is_finite() && seconds > 0.0 {
            (seconds * 1000.0) as i64
        } else {
            0
        }
    });

    let entries: [(&str, Value); 15] = [
        ("valence", float(number(pool, keys::MOOD_HAPPY, 0.0))),
        ("year", json!(year)),
        ("acousticness", float(number(pool, keys::ACOUSTIC, 0.0))),
        ("danceability", float(number(pool, keys::DANCEABILITY, 0.0))),
        ("duration_ms", json!(duration_ms)),
        ("energy", float(number(pool, keys::ENERGY, 0.0))),
        ("explicit", json!(0)),
        ("instrumentalness", float(number(pool, keys::INSTRUMENTAL, 0.0))),
        ("key", json!(key_to_index(&string(pool, keys::KEY, "")))),
        ("liveness", float(number(pool, keys::LIVE, 0.0))),
        ("loudness", float(number(pool, keys::AVERAGE_LOUDNESS, 0.0))),
        ("mode", json!(mode_to_index(&string(pool, keys::SCALE, "")))),
        ("popularity", json!(0)),
        ("speechiness", float(number(pool, keys::SPEECHINESS, 0.0))),
        ("tempo", float(number(pool, keys::BPM, 0.0))),
    ];

    entries
        .into_iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(column, value)| (column.to_string(), value))
        .collect()
}

/// JSON number for a float; NaN and infinities have no JSON form and become null
fn float(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}
