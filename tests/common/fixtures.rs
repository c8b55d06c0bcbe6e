//! Fake converter and metadata probe used by the test server
//!
//! The fake converter never touches the network; it writes small files into
//! the job work dir the same way yt-dlp lays out singles and playlists.

use super::constants::*;
use musicconvert_server::catalog_store::SongMetadata;
use musicconvert_server::conversion::{
    ConvertError, ConvertProgress, ConvertedMedia, MediaConverter, MetadataProbe,
};
use std::fs;
use std::path::Path;

pub struct FakeConverter;

impl FakeConverter {
    fn write_song(
        dir: &Path,
        filename: &str,
        on_progress: &mut dyn FnMut(ConvertProgress),
    ) -> Result<(), ConvertError> {
        let total = FAKE_AUDIO_BYTES.len() as u64;
        on_progress(ConvertProgress::Downloading {
            downloaded_bytes: total / 2,
            total_bytes: Some(total),
            speed: Some(1024.0),
            eta: Some(1),
        });
        on_progress(ConvertProgress::Downloading {
            downloaded_bytes: total,
            total_bytes: Some(total),
            speed: Some(1024.0),
            eta: Some(0),
        });
        fs::write(dir.join(filename), FAKE_AUDIO_BYTES)?;
        on_progress(ConvertProgress::Finished {
            filename: filename.to_string(),
        });
        Ok(())
    }
}

impl MediaConverter for FakeConverter {
    fn convert(
        &self,
        item: &str,
        work_dir: &Path,
        on_progress: &mut dyn FnMut(ConvertProgress),
    ) -> Result<ConvertedMedia, ConvertError> {
        match item {
            LINK_SINGLE => {
                Self::write_song(work_dir, "Single Song.m4a", on_progress)?;
                Ok(ConvertedMedia {
                    title: "Single Song".to_string(),
                    output_dir: work_dir.to_path_buf(),
                })
            }
            LINK_PLAYLIST => {
                let album_dir = work_dir.join(PLAYLIST_ALBUM);
                fs::create_dir_all(&album_dir)?;
                for song in PLAYLIST_SONGS {
                    Self::write_song(&album_dir, song, on_progress)?;
                }
                Ok(ConvertedMedia {
                    title: PLAYLIST_ALBUM.to_string(),
                    output_dir: album_dir,
                })
            }
            other => Err(ConvertError::DownloadFailed(format!(
                "{} is unavailable",
                other
            ))),
        }
    }
}

/// Reads the track number from a `NN - ` filename prefix, like tags written by
/// the real converter would.
pub struct StubProbe;

impl MetadataProbe for StubProbe {
    fn probe(&self, path: &Path) -> Option<SongMetadata> {
        let stem = path.file_stem()?.to_string_lossy().into_owned();
        let (track, title) = match stem.split_once(" - ") {
            Some((number, title)) => (number.parse::<i64>().ok(), title.to_string()),
            None => (None, stem),
        };
        Some(SongMetadata {
            title: Some(title),
            artist: Some("Test Artist".to_string()),
            album: None,
            duration: Some(42.0),
            track,
        })
    }
}
