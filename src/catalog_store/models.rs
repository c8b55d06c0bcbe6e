//! Catalog record types.

use serde::{Deserialize, Serialize};

/// An album row. Album names are unique across the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Album {
    pub id: i64,
    pub name: String,
    /// Directory the album was indexed from, if any.
    pub directory: Option<String>,
    /// Creation time as fractional unix seconds.
    pub created_at: f64,
}

/// A song row. Every song belongs to exactly one album.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: i64,
    pub album_id: i64,
    pub filename: String,
    pub filepath: String,
    pub title: Option<String>,
    pub artist: Option<String>,
    /// Duration in seconds.
    pub duration: Option<f64>,
    pub track: Option<i64>,
    pub filesize: Option<i64>,
    pub created_at: f64,
}

/// An album together with its songs, ordered by track number
/// (untracked songs last) and then by filename.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumWithSongs {
    #[serde(flatten)]
    pub album: Album,
    pub songs: Vec<Song>,
}

/// Tag metadata read from an audio file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SongMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration: Option<f64>,
    pub track: Option<i64>,
}

impl SongMetadata {
    /// Metadata carrying only a title, used when a file cannot be probed.
    pub fn title_only(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }
}

/// Data needed to insert a song.
#[derive(Debug, Clone)]
pub struct NewSong {
    pub filename: String,
    pub filepath: String,
    pub metadata: SongMetadata,
}
