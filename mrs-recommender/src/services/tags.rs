//! Basic tag reading with lofty

use lofty::file::TaggedFileExt;
use lofty::prelude::*;
use lofty::probe::Probe;
use mrs_common::db::SongMetadata;
use std::path::Path;
use thiserror::Error;

/// Tag read errors
#[derive(Debug, Error)]
pub enum TagError {
    /// File could not be opened or parsed
    #[error("Failed to read tags: {0}")]
    Read(String),
}

/// Read display metadata from an audio file
///
/// `fallback_name` is used when the file carries no title and has no usable
/// stem. Missing tag fields take the [`SongMetadata`] defaults. Duration
/// comes from the audio properties and is `None` when unknown.
pub fn read_song_metadata(audio_path: &Path, fallback_name: &str) -> Result<SongMetadata, TagError> {
    let tagged_file = Probe::open(audio_path)
        .map_err(|e| TagError::Read(e.to_string()))?
        .read()
        .map_err(|e| TagError::Read(e.to_string()))?;

    let file_stem = audio_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| fallback_name.to_string());

    let mut metadata = SongMetadata::with_name(file_stem);

    if let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
        if let Some(title) = non_empty(tag.title().as_deref()) {
            metadata.name = title;
        }
        if let Some(artist) = non_empty(tag.artist().as_deref()) {
            metadata.artist = artist;
        }
        if let Some(album) = non_empty(tag.album().as_deref()) {
            metadata.album = album;
        }
        if let Some(genre) = non_empty(tag.genre().as_deref()) {
            metadata.genre = genre;
        }
        if let Some(year) = tag.year().filter(|y| *y > 0) {
            metadata.year = i64::from(year);
        }
    }

    let duration = tagged_file.properties().duration();
    if !duration.is_zero() {
        metadata.duration_ms = Some(duration.as_millis() as i64);
    }

    Ok(metadata)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreadable_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.mp3");
        std::fs::write(&path, b"definitely not an mpeg stream").unwrap();

        assert!(read_song_metadata(&path, "noise").is_err());
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_song_metadata(&dir.path().join("absent.flac"), "absent").is_err());
    }

    #[test]
    fn test_non_empty_trims() {
        assert_eq!(non_empty(Some("  Blue  ")), Some("Blue".to_string()));
        assert_eq!(non_empty(Some("   ")), None);
        assert_eq!(non_empty(None), None);
    }
}
