//! Audio download
//!
//! Streams the response body to disk chunk by chunk. A non-success status is
//! a hard failure; there are no retries.

use reqwest::{Client, Url};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// Download errors
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Source URL could not be parsed
    #[error("Invalid URL {0}: {1}")]
    InvalidUrl(String, String),

    /// Request failed (connect, timeout, body read)
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("Audio download failed with status {0}")]
    Status(u16),

    /// Writing the file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP audio fetcher
#[derive(Clone)]
pub struct Downloader {
    client: Client,
}

impl Downloader {
    /// Create a downloader whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("mrs-recommender/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// Fetch `url` into `target`, returning bytes written
    pub async fn download(&self, url: &str, target: &Path) -> Result<u64, DownloadError> {
        let mut response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status(status.as_u16()));
        }

        let mut file = tokio::fs::File::create(target).await?;
        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(written)
    }
}

/// Rewrite the URL's `host:port` when it exactly matches an alias
///
/// Only explicit ports match. URLs that fail to parse or match no alias are
/// returned unchanged.
pub fn normalize_url(url: &str, aliases: &BTreeMap<String, String>) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };
    let (Some(host), Some(port)) = (parsed.host_str(), parsed.port()) else {
        return url.to_string();
    };

    let authority = format!("{}:{}", host, port);
    let Some(replacement) = aliases.get(&authority) else {
        return url.to_string();
    };
    let Some((new_host, new_port)) = replacement.rsplit_once(':') else {
        return url.to_string();
    };
    let Ok(new_port) = new_port.parse::<u16>() else {
        return url.to_string();
    };

    if parsed.set_host(Some(new_host)).is_err() || parsed.set_port(Some(new_port)).is_err() {
        return url.to_string();
    }
    parsed.to_string()
}

/// File name for the downloaded audio: the URL's last path segment, else
/// `<song_id>.audio`
pub fn audio_file_name(url: &str, song_id: &str) -> String {
    last_segment(url)
        .filter(|name| name != "." && name != "..")
        .unwrap_or_else(|| format!("{}.audio", song_id))
}

/// Last path segment without its extension
pub fn url_stem(url: &str) -> Option<String> {
    let name = last_segment(url)?;
    let stem = Path::new(&name).file_stem()?.to_string_lossy().to_string();
    (!stem.is_empty()).then_some(stem)
}

fn last_segment(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.last()?.to_string();
    (!segment.is_empty()).then_some(segment)
}

/// Default local-development aliases
pub fn default_url_aliases() -> BTreeMap<String, String> {
    [
        ("localhost:4000", "music-service:4000"),
        ("127.0.0.1:4000", "music-service:4000"),
    ]
    .into_iter()
    .map(|(from, to)| (from.to_string(), to.to_string()))
    .collect()
}
