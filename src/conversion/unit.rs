//! Runs one work item through a [`MediaConverter`] and reports on it.

use super::converter::{ConvertProgress, MediaConverter};
use crate::jobs::ProgressMessage;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{error, info, warn};
use walkdir::WalkDir;

/// Appended to on every successful item: `"{title}\t{item}"`.
pub const PROCESSED_LOG_FILE: &str = "archive.txt";
/// Appended to on every failed item: `"{item}\t{error}"`.
pub const ERROR_LOG_FILE: &str = "error.txt";

const THUMBNAIL_EXTENSIONS: &[&str] = &["webp", "jpg", "jpeg", "png"];

/// Grace window for thumbnail mtimes, filesystems with coarse timestamps may
/// round down past the run start.
const THUMBNAIL_MTIME_SLACK: Duration = Duration::from_secs(1);

pub fn to_progress_message(progress: ConvertProgress) -> ProgressMessage {
    match progress {
        ConvertProgress::Downloading {
            downloaded_bytes,
            total_bytes,
            speed,
            eta,
        } => {
            let fraction_complete = match total_bytes {
                Some(total) if total > 0 => (downloaded_bytes as f64 / total as f64).min(1.0),
                _ => 0.0,
            };
            ProgressMessage::Downloading {
                fraction_complete,
                bytes_done: downloaded_bytes,
                bytes_total: total_bytes,
                speed,
                eta,
            }
        }
        ConvertProgress::Finished { filename } => ProgressMessage::ItemFinished {
            output_path: filename,
        },
        ConvertProgress::Status(label) => ProgressMessage::StatusChanged { label },
    }
}

fn append_line(path: &Path, line: &str) {
    let result = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut file| writeln!(file, "{}", line));
    if let Err(e) = result {
        warn!("Failed to write to {:?}: {}", path, e);
    }
}

/// Remove thumbnails left behind in `work_dir` that were written at or after
/// `since`. Errors are ignored.
fn remove_fresh_thumbnails(work_dir: &Path, since: SystemTime) {
    let threshold = since
        .checked_sub(THUMBNAIL_MTIME_SLACK)
        .unwrap_or(SystemTime::UNIX_EPOCH);

    for entry in WalkDir::new(work_dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let is_thumbnail = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| THUMBNAIL_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if !is_thumbnail {
            continue;
        }
        let fresh = entry
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .map(|mtime| mtime >= threshold)
            .unwrap_or(false);
        if fresh {
            let _ = std::fs::remove_file(entry.path());
        }
    }
}

/// Wraps a converter call for a single item: translates its progress into
/// feed messages, keeps the per-job processed/error logs and cleans up
/// thumbnails. Never fails, the outcome is the returned flag.
#[derive(Clone)]
pub struct ConversionUnit {
    converter: Arc<dyn MediaConverter>,
}

impl ConversionUnit {
    pub fn new(converter: Arc<dyn MediaConverter>) -> Self {
        Self { converter }
    }

    pub fn run(&self, item: &str, work_dir: &Path, mut emit: impl FnMut(ProgressMessage)) -> bool {
        let started = SystemTime::now();
        let mut on_progress = |progress: ConvertProgress| emit(to_progress_message(progress));

        let ok = match self.converter.convert(item, work_dir, &mut on_progress) {
            Ok(media) => {
                info!("Converted {} ({})", item, media.title);
                append_line(
                    &work_dir.join(PROCESSED_LOG_FILE),
                    &format!("{}\t{}", media.title, item),
                );
                true
            }
            Err(e) => {
                error!("Conversion of {} failed: {}", item, e);
                append_line(
                    &work_dir.join(ERROR_LOG_FILE),
                    &format!("{}\t{}", item, e),
                );
                false
            }
        };

        remove_fresh_thumbnails(work_dir, started);
        ok
    }
}
