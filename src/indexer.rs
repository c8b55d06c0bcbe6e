//! Registers the audio files produced by a job into the catalog.
//!
//! Every immediate subdirectory of the work dir is an album named after the
//! directory; audio files found anywhere inside it become its songs. Audio
//! files sitting directly in the work dir go to a per-job album `job-{id}`.

use crate::catalog_store::{CatalogStore, NewSong, SongMetadata};
use crate::conversion::MetadataProbe;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub const AUDIO_EXTENSIONS: &[&str] = &["m4a", "mp3", "aac", "opus", "ogg", "flac", "wav"];

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Failed to list {path:?}: {source}")]
    ListDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create album {name:?}: {source}")]
    CreateAlbum {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

/// A single file that could not be added.
#[derive(Debug)]
pub struct IndexFailure {
    pub path: PathBuf,
    pub error: String,
}

impl std::fmt::Display for IndexFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to index {}: {}", self.path.display(), self.error)
    }
}

#[derive(Debug, Default)]
pub struct IndexReport {
    pub albums: usize,
    pub songs: usize,
    pub failures: Vec<IndexFailure>,
}

pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| AUDIO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Audio files under `dir`, recursively, in a stable order.
fn audio_files_under(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("Skipping unreadable entry under {:?}: {}", dir, err);
                None
            }
        })
        .filter(|e| e.file_type().is_file() && is_audio_file(e.path()))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

fn add_songs(
    store: &dyn CatalogStore,
    probe: &dyn MetadataProbe,
    album_id: i64,
    files: &[PathBuf],
    report: &mut IndexReport,
) {
    for path in files {
        let metadata = match probe.probe(path) {
            Some(mut meta) => {
                if meta.title.is_none() {
                    meta.title = Some(file_stem(path));
                }
                meta
            }
            None => SongMetadata::title_only(file_stem(path)),
        };
        let song = NewSong {
            filename: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            filepath: path.to_string_lossy().into_owned(),
            metadata,
        };
        match store.add_song(album_id, &song) {
            Ok(id) => {
                debug!("Indexed {:?} as song {}", path, id);
                report.songs += 1;
            }
            Err(e) => {
                warn!("Failed to index {:?}: {:#}", path, e);
                report.failures.push(IndexFailure {
                    path: path.clone(),
                    error: format!("{:#}", e),
                });
            }
        }
    }
}

fn create_album(
    store: &dyn CatalogStore,
    name: &str,
    directory: &Path,
) -> Result<i64, IndexError> {
    store
        .create_album(name, Some(&directory.to_string_lossy()))
        .map_err(|source| IndexError::CreateAlbum {
            name: name.to_string(),
            source,
        })
}

/// Index the contents of a job's work dir.
pub fn index(
    work_dir: &Path,
    job_id: &str,
    store: &dyn CatalogStore,
    probe: &dyn MetadataProbe,
) -> Result<IndexReport, IndexError> {
    let list_err = |source| IndexError::ListDir {
        path: work_dir.to_path_buf(),
        source,
    };

    let mut subdirs = Vec::new();
    let mut loose_files = Vec::new();
    for entry in std::fs::read_dir(work_dir).map_err(list_err)? {
        let path = entry.map_err(list_err)?.path();
        if path.is_dir() {
            subdirs.push(path);
        } else if is_audio_file(&path) {
            loose_files.push(path);
        }
    }
    subdirs.sort();
    loose_files.sort();

    let mut report = IndexReport::default();

    for dir in subdirs {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let files = audio_files_under(&dir);
        if files.is_empty() {
            debug!("No audio in {:?}, skipping", dir);
            continue;
        }
        let album_id = create_album(store, &name, &dir)?;
        report.albums += 1;
        add_songs(store, probe, album_id, &files, &mut report);
    }

    if !loose_files.is_empty() {
        let album_id = create_album(store, &format!("job-{}", job_id), work_dir)?;
        report.albums += 1;
        add_songs(store, probe, album_id, &loose_files, &mut report);
    }

    info!(
        "Indexed job {}: {} albums, {} songs, {} failures",
        job_id,
        report.albums,
        report.songs,
        report.failures.len()
    );
    Ok(report)
}
