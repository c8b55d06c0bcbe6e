//! SQLite schema for the album/song catalog.

use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema,
};

const ALBUMS_TABLE: Table = Table {
    name: "albums",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("directory", &SqlType::Text),
        sqlite_column!("created_at", &SqlType::Real, non_null = true),
    ],
    indices: &[("idx_albums_created_at", "created_at")],
};

const SONGS_TABLE: Table = Table {
    name: "songs",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "album_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ForeignKey {
                foreign_table: "albums",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::Cascade,
            })
        ),
        sqlite_column!("filename", &SqlType::Text, non_null = true),
        sqlite_column!("filepath", &SqlType::Text, non_null = true),
        sqlite_column!("title", &SqlType::Text),
        sqlite_column!("artist", &SqlType::Text),
        sqlite_column!("duration", &SqlType::Real),
        sqlite_column!("track", &SqlType::Integer),
        sqlite_column!("filesize", &SqlType::Integer),
        sqlite_column!("created_at", &SqlType::Real, non_null = true),
    ],
    indices: &[("idx_songs_album", "album_id")],
};

pub const CATALOG_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[ALBUMS_TABLE, SONGS_TABLE],
    migration: None,
}];
