//! Read-only catalog routes: albums, songs and album downloads.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{error, warn};

use crate::archive;
use crate::catalog_store::{CatalogStore, Song};
use crate::conversion::sanitize_filename;
use crate::server::state::GuardedCatalogStore;

/// Run a store call on the blocking pool, mapping failures to a 500.
pub(super) async fn with_store<T, F>(store: GuardedCatalogStore, f: F) -> Result<T, Response>
where
    T: Send + 'static,
    F: FnOnce(&dyn CatalogStore) -> anyhow::Result<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(move || f(store.as_ref())).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            error!("Catalog query failed: {:#}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
        Err(e) => {
            error!("Catalog task failed: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
    }
}

/// `Content-Disposition` for a download, with an RFC 5987 UTF-8 name for
/// clients that support it.
pub(super) fn attachment_disposition(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .map(|c| if c.is_ascii() && c != '"' { c } else { '_' })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii,
        urlencoding::encode(filename)
    )
}

pub async fn list_albums(State(store): State<GuardedCatalogStore>) -> Response {
    match with_store(store, |s| s.list_albums()).await {
        Ok(albums) => Json(albums).into_response(),
        Err(resp) => resp,
    }
}

pub async fn get_album(State(store): State<GuardedCatalogStore>, Path(id): Path<i64>) -> Response {
    match with_store(store, move |s| s.get_album(id)).await {
        Ok(Some(album)) => Json(album).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(resp) => resp,
    }
}

pub async fn get_song(State(store): State<GuardedCatalogStore>, Path(id): Path<i64>) -> Response {
    match with_store(store, move |s| s.get_song(id)).await {
        Ok(Some(song)) => Json(song).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(resp) => resp,
    }
}

/// `name (2).ext`, `name (3).ext`, ... for the `n`th song sharing a filename.
fn numbered_filename(filename: &str, n: usize) -> String {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{} ({}).{}", stem, n, ext),
        _ => format!("{} ({})", filename, n),
    }
}

/// Zip entries for an album's songs under `folder`. Songs whose file is gone
/// are skipped, a file listed twice is added once, and songs sharing a
/// filename get numbered names.
fn album_entries(folder: &str, songs: &[Song]) -> Vec<(String, PathBuf)> {
    let mut seen_paths = HashSet::new();
    let mut used_names = HashSet::new();
    let mut entries = Vec::new();

    for song in songs {
        let path = PathBuf::from(&song.filepath);
        if !seen_paths.insert(path.clone()) {
            continue;
        }
        if !path.is_file() {
            warn!("Song {} file missing: {:?}", song.id, path);
            continue;
        }

        let mut name = format!("{}/{}", folder, song.filename);
        let mut n = 1;
        while !used_names.insert(name.clone()) {
            n += 1;
            name = format!("{}/{}", folder, numbered_filename(&song.filename, n));
        }
        entries.push((name, path));
    }
    entries
}

/// Zip the album's songs on the fly. Songs whose file is gone are skipped.
pub async fn download_album(
    State(store): State<GuardedCatalogStore>,
    Path(id): Path<i64>,
) -> Response {
    let album = match with_store(store, move |s| s.get_album(id)).await {
        Ok(Some(album)) => album,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(resp) => return resp,
    };

    let folder = sanitize_filename(&album.album.name);
    let entries = album_entries(&folder, &album.songs);

    let bytes = match tokio::task::spawn_blocking(move || archive::zip_files(&entries)).await {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(e)) => {
            error!("Failed to build archive for album {}: {}", id, e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
        Err(e) => {
            error!("Archive task for album {} failed: {}", id, e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    (
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                attachment_disposition(&format!("{}.zip", folder)),
            ),
        ],
        bytes,
    )
        .into_response()
}
