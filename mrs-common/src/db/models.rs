//! Persisted data models

use crate::features::FeatureMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Artist/album/genre used when tags give nothing
pub const UNKNOWN: &str = "Unknown";

/// Year used when tags give nothing
pub const DEFAULT_YEAR: i64 = 2000;

/// Extracted features for one song
///
/// Keyed by `song_id`. A record exists only after a successful extraction;
/// writing it again replaces every field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureRecord {
    pub song_id: String,
    /// URL the audio was last fetched from
    pub file: String,
    pub metadata: SongMetadata,
    pub features: FeatureMap,
    pub updated_at: DateTime<Utc>,
}

/// Best-effort tag data stored alongside features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongMetadata {
    pub name: String,
    pub artist: String,
    pub album: String,
    pub year: i64,
    pub genre: String,
    #[serde(default)]
    pub duration_ms: Option<i64>,
}

impl SongMetadata {
    /// Metadata with only a display name; everything else at defaults
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            artist: UNKNOWN.to_string(),
            album: UNKNOWN.to_string(),
            year: DEFAULT_YEAR,
            genre: UNKNOWN.to_string(),
            duration_ms: None,
        }
    }
}

/// A user's favorite song
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteRecord {
    pub user_id: String,
    pub song: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metadata_defaults() {
        let metadata = SongMetadata::with_name("track01");
        assert_eq!(metadata.name, "track01");
        assert_eq!(metadata.artist, "Unknown");
        assert_eq!(metadata.album, "Unknown");
        assert_eq!(metadata.genre, "Unknown");
        assert_eq!(metadata.year, 2000);
        assert_eq!(metadata.duration_ms, None);
    }

    #[test]
    fn test_metadata_json_uses_camel_case() {
        let mut metadata = SongMetadata::with_name("Song");
        metadata.duration_ms = Some(215_000);

        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(value["durationMs"], json!(215_000));
        assert!(value.get("duration_ms").is_none());
    }

    #[test]
    fn test_metadata_without_duration_deserializes() {
        let metadata: SongMetadata = serde_json::from_value(json!({
            "name": "a", "artist": "b", "album": "c", "year": 1999, "genre": "d"
        }))
        .unwrap();
        assert_eq!(metadata.duration_ms, None);
        assert_eq!(metadata.year, 1999);
    }
}
