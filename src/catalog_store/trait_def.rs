//! CatalogStore trait definition.

use super::models::{Album, AlbumWithSongs, NewSong, Song};
use anyhow::Result;

/// Storage backend for the album/song catalog.
///
/// Implementations are called from blocking contexts; async callers should
/// go through `tokio::task::spawn_blocking`.
pub trait CatalogStore: Send + Sync {
    /// Create an album, or return the id of the existing album with the same name.
    fn create_album(&self, name: &str, directory: Option<&str>) -> Result<i64>;

    /// Insert a song into an existing album. Returns the new song id.
    fn add_song(&self, album_id: i64, song: &NewSong) -> Result<i64>;

    /// All albums, most recently created first.
    fn list_albums(&self) -> Result<Vec<Album>>;

    /// One album with its songs (track ascending, untracked last, then filename).
    fn get_album(&self, id: i64) -> Result<Option<AlbumWithSongs>>;

    fn get_song(&self, id: i64) -> Result<Option<Song>>;

    /// Delete an album; its songs are removed with it.
    fn delete_album(&self, id: i64) -> Result<bool>;

    fn get_albums_count(&self) -> usize;

    fn get_songs_count(&self) -> usize;
}
