//! The media conversion seam.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors a converter can report for one work item.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read source info: {0}")]
    ProbeFailed(String),

    #[error("download failed: {0}")]
    DownloadFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Native progress notifications emitted while an item converts.
#[derive(Debug, Clone, PartialEq)]
pub enum ConvertProgress {
    Downloading {
        downloaded_bytes: u64,
        total_bytes: Option<u64>,
        /// Bytes per second.
        speed: Option<f64>,
        /// Seconds remaining.
        eta: Option<u64>,
    },
    Finished {
        filename: String,
    },
    Status(String),
}

/// Result of a successful conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedMedia {
    /// Human readable name of what was converted (playlist or video title).
    pub title: String,
    /// Directory the produced files were written to.
    pub output_dir: PathBuf,
}

/// Turns one source link into local audio files under `work_dir`.
///
/// Implementations block the calling thread until the item is done and may
/// call `on_progress` any number of times before returning.
pub trait MediaConverter: Send + Sync {
    fn convert(
        &self,
        item: &str,
        work_dir: &Path,
        on_progress: &mut dyn FnMut(ConvertProgress),
    ) -> Result<ConvertedMedia, ConvertError>;
}
