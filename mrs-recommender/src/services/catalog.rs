//! Song catalog source
//!
//! The backfill scheduler needs every song the music service knows about.
//! [`HttpSongCatalog`] reads `GET {music_service_url}/api/song/list`.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Catalog errors
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Request failed (connect, timeout, body read)
    #[error("Catalog request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Service answered with a non-success status
    #[error("Catalog returned status {0}")]
    Status(u16),

    /// Service answered but reported failure
    #[error("Catalog reported failure")]
    Rejected,
}

/// One catalog entry
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CatalogSong {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    /// Audio URL; songs without one cannot be extracted
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
}

impl CatalogSong {
    /// Audio URL when present and non-blank
    pub fn audio_url(&self) -> Option<&str> {
        self.file.as_deref().map(str::trim).filter(|f| !f.is_empty())
    }
}

/// Lists every known song
#[async_trait]
pub trait SongCatalog: Send + Sync {
    async fn list_songs(&self) -> Result<Vec<CatalogSong>, CatalogError>;
}

#[derive(Debug, Deserialize)]
struct SongListResponse {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    songs: Vec<CatalogSong>,
}

fn default_success() -> bool {
    true
}

/// Catalog backed by the music service HTTP API
pub struct HttpSongCatalog {
    client: Client,
    base_url: String,
}

impl HttpSongCatalog {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, CatalogError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SongCatalog for HttpSongCatalog {
    async fn list_songs(&self) -> Result<Vec<CatalogSong>, CatalogError> {
        let url = format!("{}/api/song/list", self.base_url);
        tracing::debug!(url = %url, "Fetching song catalog");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status(status.as_u16()));
        }

        let body: SongListResponse = response.json().await?;
        if !body.success {
            return Err(CatalogError::Rejected);
        }

        Ok(body.songs)
    }
}
