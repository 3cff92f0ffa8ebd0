//! External collaborators of the extraction pipeline
//!
//! - Audio download with URL alias rewriting
//! - Basic tag reading
//! - Song catalog listing from the music service

pub mod catalog;
pub mod downloader;
pub mod tags;

pub use catalog::{CatalogError, CatalogSong, HttpSongCatalog, SongCatalog};
pub use downloader::{audio_file_name, normalize_url, url_stem, DownloadError, Downloader};
pub use tags::{read_song_metadata, TagError};
