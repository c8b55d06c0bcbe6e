//! Tag metadata extraction using ffprobe.

use crate::catalog_store::SongMetadata;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// Reads tag metadata from a finished audio file.
pub trait MetadataProbe: Send + Sync {
    /// Returns `None` when the file cannot be probed.
    fn probe(&self, path: &Path) -> Option<SongMetadata>;
}

/// ffprobe JSON output structure.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

/// Parse a track tag such as `"3"` or `"3/12"`.
fn parse_track(raw: &str) -> Option<i64> {
    raw.split('/').next()?.trim().parse().ok()
}

fn parse_ffprobe_json(json: &[u8]) -> Option<SongMetadata> {
    let output: FfprobeOutput = serde_json::from_slice(json).ok()?;
    let format = output.format?;

    // Tag key casing differs between containers (`title` vs `TITLE`).
    let tags: HashMap<String, String> = format
        .tags
        .into_iter()
        .map(|(k, v)| (k.to_lowercase(), v))
        .filter(|(_, v)| !v.trim().is_empty())
        .collect();

    let track = tags
        .get("track")
        .or_else(|| tags.get("tracknumber"))
        .and_then(|t| parse_track(t));

    Some(SongMetadata {
        title: tags.get("title").cloned(),
        artist: tags.get("artist").cloned(),
        album: tags.get("album").cloned(),
        duration: format.duration.as_deref().and_then(|d| d.parse().ok()),
        track,
    })
}

pub struct FfprobeMetadataProbe {
    program: PathBuf,
}

impl FfprobeMetadataProbe {
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }
}

impl Default for FfprobeMetadataProbe {
    fn default() -> Self {
        Self::new(PathBuf::from("ffprobe"))
    }
}

impl MetadataProbe for FfprobeMetadataProbe {
    fn probe(&self, path: &Path) -> Option<SongMetadata> {
        let output = Command::new(&self.program)
            .args(["-v", "quiet", "-print_format", "json", "-show_format"])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output();

        match output {
            Ok(output) if output.status.success() => parse_ffprobe_json(&output.stdout),
            Ok(output) => {
                debug!("ffprobe exited with {} for {:?}", output.status, path);
                None
            }
            Err(e) => {
                debug!("Failed to run ffprobe for {:?}: {}", path, e);
                None
            }
        }
    }
}
