//! Turning source links into audio files.

mod converter;
mod metadata;
mod unit;
mod ytdlp;

pub use converter::{ConvertError, ConvertProgress, ConvertedMedia, MediaConverter};
pub use metadata::{FfprobeMetadataProbe, MetadataProbe};
pub use unit::{to_progress_message, ConversionUnit, ERROR_LOG_FILE, PROCESSED_LOG_FILE};
pub use ytdlp::{sanitize_filename, YtDlpConverter, YtDlpOptions};
