//! SQLite-backed catalog store implementation.

use super::models::*;
use super::schema::CATALOG_VERSIONED_SCHEMAS;
use super::trait_def::CatalogStore;
use crate::sqlite_persistence::BASE_DB_VERSION;
use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

const SONG_COLUMNS: &str =
    "id, album_id, filename, filepath, title, artist, duration, track, filesize, created_at";

/// SQLite-backed catalog of albums and songs.
#[derive(Clone)]
pub struct SqliteCatalogStore {
    conn: Arc<Mutex<Connection>>,
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

fn migrate_if_needed(conn: &mut Connection) -> Result<()> {
    let db_version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    let latest_version = CATALOG_VERSIONED_SCHEMAS.len() - 1;
    let latest_schema = &CATALOG_VERSIONED_SCHEMAS[latest_version];

    let table_count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
            [],
            |r| r.get(0),
        )
        .unwrap_or(0);

    if table_count == 0 {
        info!("Creating catalog db schema at version {}", latest_version);
        latest_schema.create(conn)?;
        return Ok(());
    }

    if db_version < BASE_DB_VERSION as i64 {
        bail!(
            "Catalog database has unknown user_version {}, refusing to open it",
            db_version
        );
    }

    let mut current_version = (db_version - BASE_DB_VERSION as i64) as usize;
    if current_version < latest_version {
        let tx = conn.transaction()?;
        for schema in CATALOG_VERSIONED_SCHEMAS.iter().skip(current_version + 1) {
            if let Some(migration_fn) = schema.migration {
                info!(
                    "Migrating catalog db from version {} to {}",
                    current_version, schema.version
                );
                migration_fn(&tx)?;
            }
            current_version = schema.version;
        }
        tx.pragma_update(None, "user_version", BASE_DB_VERSION + current_version)?;
        tx.commit()?;
    }

    CATALOG_VERSIONED_SCHEMAS[current_version].validate(conn)
}

impl SqliteCatalogStore {
    /// Open (or create) the catalog database at `db_path`.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        let mut conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open catalog database: {:?}", db_path))?;
        Self::from_connection(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory catalog (for testing).
    pub fn in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        Self::from_connection(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn from_connection(conn: &mut Connection) -> Result<()> {
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        migrate_if_needed(conn)?;

        let album_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM albums", [], |r| r.get(0))
            .unwrap_or(0);
        let song_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM songs", [], |r| r.get(0))
            .unwrap_or(0);
        info!(
            "Opened catalog: {} albums, {} songs",
            album_count, song_count
        );
        Ok(())
    }

    fn row_to_album(row: &rusqlite::Row) -> rusqlite::Result<Album> {
        Ok(Album {
            id: row.get("id")?,
            name: row.get("name")?,
            directory: row.get("directory")?,
            created_at: row.get("created_at")?,
        })
    }

    fn row_to_song(row: &rusqlite::Row) -> rusqlite::Result<Song> {
        Ok(Song {
            id: row.get("id")?,
            album_id: row.get("album_id")?,
            filename: row.get("filename")?,
            filepath: row.get("filepath")?,
            title: row.get("title")?,
            artist: row.get("artist")?,
            duration: row.get("duration")?,
            track: row.get("track")?,
            filesize: row.get("filesize")?,
            created_at: row.get("created_at")?,
        })
    }

    fn count(&self, table: &str) -> usize {
        let conn = self.conn.lock().unwrap();
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| {
            r.get::<_, i64>(0)
        })
        .map(|c| c as usize)
        .unwrap_or(0)
    }
}

impl CatalogStore for SqliteCatalogStore {
    fn create_album(&self, name: &str, directory: Option<&str>) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO albums (name, directory, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO NOTHING",
            params![name, directory, now_secs()],
        )?;
        let id = conn
            .query_row(
                "SELECT id FROM albums WHERE name = ?1",
                params![name],
                |r| r.get(0),
            )
            .with_context(|| format!("Album {:?} missing after insert", name))?;
        Ok(id)
    }

    fn add_song(&self, album_id: i64, song: &NewSong) -> Result<i64> {
        let filesize = std::fs::metadata(&song.filepath)
            .ok()
            .map(|m| m.len() as i64);
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO songs (album_id, filename, filepath, title, artist, duration, track, filesize, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                album_id,
                song.filename,
                song.filepath,
                song.metadata.title,
                song.metadata.artist,
                song.metadata.duration,
                song.metadata.track,
                filesize,
                now_secs(),
            ],
        )
        .with_context(|| format!("Failed to insert song {:?}", song.filename))?;
        Ok(conn.last_insert_rowid())
    }

    fn list_albums(&self) -> Result<Vec<Album>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, name, directory, created_at FROM albums ORDER BY created_at DESC, id DESC",
        )?;
        let albums = stmt
            .query_map([], Self::row_to_album)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(albums)
    }

    fn get_album(&self, id: i64) -> Result<Option<AlbumWithSongs>> {
        let conn = self.conn.lock().unwrap();
        let album = conn
            .query_row(
                "SELECT id, name, directory, created_at FROM albums WHERE id = ?1",
                params![id],
                Self::row_to_album,
            )
            .optional()?;
        let Some(album) = album else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM songs WHERE album_id = ?1 ORDER BY track IS NULL, track, filename",
            SONG_COLUMNS
        ))?;
        let songs = stmt
            .query_map(params![id], Self::row_to_song)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Some(AlbumWithSongs { album, songs }))
    }

    fn get_song(&self, id: i64) -> Result<Option<Song>> {
        let conn = self.conn.lock().unwrap();
        let song = conn
            .query_row(
                &format!("SELECT {} FROM songs WHERE id = ?1", SONG_COLUMNS),
                params![id],
                Self::row_to_song,
            )
            .optional()?;
        Ok(song)
    }

    fn delete_album(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute("DELETE FROM albums WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    fn get_albums_count(&self) -> usize {
        self.count("albums")
    }

    fn get_songs_count(&self) -> usize {
        self.count("songs")
    }
}
