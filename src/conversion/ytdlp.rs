//! `yt-dlp` backed converter.
//!
//! Each item is first probed (`-J --flat-playlist`) to find out whether it is a
//! single video or a playlist. Playlists get their own sanitized folder under
//! the work dir and numbered file names; singles land directly in the work dir.
//! Progress is read from stdout through a custom `--progress-template`.

use super::converter::{ConvertError, ConvertProgress, ConvertedMedia, MediaConverter};
use regex::Regex;
use serde::Deserialize;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::LazyLock;
use tracing::{debug, info, warn};

const PROGRESS_PREFIX: &str = "__progress__ ";

const PROGRESS_TEMPLATE: &str = "download:__progress__ %(progress.status)s|%(progress.downloaded_bytes)s|%(progress.total_bytes)s|%(progress.total_bytes_estimate)s|%(progress.speed)s|%(progress.eta)s|%(progress.filename)s";

/// Max bytes of stderr kept for error reporting.
const STDERR_TAIL_BYTES: usize = 4096;

static PATH_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\\/]+").expect("separator regex is valid"));
static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[:*?"<>|\x00-\x1f]"#).expect("unsafe char regex is valid"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex is valid"));

/// Return a filesystem-safe version of `name`.
pub fn sanitize_filename(name: &str) -> String {
    let name = name.trim();
    let name = PATH_SEPARATORS.replace_all(name, "-");
    let name = UNSAFE_CHARS.replace_all(&name, "");
    WHITESPACE.replace_all(&name, " ").into_owned()
}

#[derive(Debug, Clone)]
pub struct YtDlpOptions {
    pub program: PathBuf,
    /// Target audio container/codec passed to `--audio-format`.
    pub audio_format: String,
    /// Passed to `--audio-quality`, e.g. `256K`.
    pub audio_quality: String,
}

impl Default for YtDlpOptions {
    fn default() -> Self {
        Self {
            program: PathBuf::from("yt-dlp"),
            audio_format: "m4a".to_string(),
            audio_quality: "256K".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SourceInfo {
    #[serde(rename = "_type")]
    kind: Option<String>,
    title: Option<String>,
    playlist_title: Option<String>,
    entries: Option<serde_json::Value>,
}

#[derive(Debug, PartialEq)]
enum SourceLayout {
    Single { title: String },
    Playlist { title: String, folder: String },
}

impl SourceInfo {
    fn layout(&self) -> SourceLayout {
        let is_playlist = self.kind.as_deref() == Some("playlist") || self.entries.is_some();
        if is_playlist {
            let title = self
                .title
                .clone()
                .or_else(|| self.playlist_title.clone())
                .unwrap_or_else(|| "playlist".to_string());
            let folder = sanitize_filename(&title);
            SourceLayout::Playlist { title, folder }
        } else {
            SourceLayout::Single {
                title: self.title.clone().unwrap_or_else(|| "video".to_string()),
            }
        }
    }
}

fn parse_optional<T: std::str::FromStr>(field: &str) -> Option<T> {
    match field.trim() {
        "" | "NA" | "None" => None,
        s => s.parse().ok(),
    }
}

/// Parse one stdout line produced by [`PROGRESS_TEMPLATE`].
fn parse_progress_line(line: &str) -> Option<ConvertProgress> {
    let payload = line.trim_end().strip_prefix(PROGRESS_PREFIX)?;
    let mut fields = payload.splitn(7, '|');
    let status = fields.next()?.trim();
    let downloaded = fields.next().unwrap_or("");
    let total = fields.next().unwrap_or("");
    let total_estimate = fields.next().unwrap_or("");
    let speed = fields.next().unwrap_or("");
    let eta = fields.next().unwrap_or("");
    let filename = fields.next().unwrap_or("");

    let progress = match status {
        "downloading" => ConvertProgress::Downloading {
            downloaded_bytes: parse_optional::<f64>(downloaded).unwrap_or(0.0) as u64,
            total_bytes: parse_optional::<f64>(total)
                .or_else(|| parse_optional::<f64>(total_estimate))
                .map(|t| t as u64),
            speed: parse_optional(speed),
            eta: parse_optional::<f64>(eta).map(|e| e as u64),
        },
        "finished" => ConvertProgress::Finished {
            filename: filename.to_string(),
        },
        other => ConvertProgress::Status(other.to_string()),
    };
    Some(progress)
}

fn tail(bytes: &[u8]) -> String {
    let start = bytes.len().saturating_sub(STDERR_TAIL_BYTES);
    String::from_utf8_lossy(&bytes[start..]).trim().to_string()
}

pub struct YtDlpConverter {
    options: YtDlpOptions,
}

impl YtDlpConverter {
    pub fn new(options: YtDlpOptions) -> Self {
        Self { options }
    }

    fn command(&self) -> Command {
        Command::new(&self.options.program)
    }

    fn spawn_error(&self, source: std::io::Error) -> ConvertError {
        ConvertError::Spawn {
            program: self.options.program.display().to_string(),
            source,
        }
    }

    fn probe(&self, item: &str) -> Result<SourceInfo, ConvertError> {
        let output = self
            .command()
            .args(["-J", "--flat-playlist", "--no-warnings"])
            .arg(item)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(ConvertError::ProbeFailed(tail(&output.stderr)));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| ConvertError::ProbeFailed(format!("JSON parse error: {}", e)))
    }

    fn download_args(&self, output_template: &Path) -> Vec<String> {
        vec![
            "-f".into(),
            "bestaudio/best".into(),
            "-x".into(),
            "--audio-format".into(),
            self.options.audio_format.clone(),
            "--audio-quality".into(),
            self.options.audio_quality.clone(),
            "--write-thumbnail".into(),
            "--embed-thumbnail".into(),
            "--add-metadata".into(),
            "--prefer-ffmpeg".into(),
            "--postprocessor-args".into(),
            "ffmpeg:-movflags +faststart".into(),
            "--ignore-errors".into(),
            "--yes-playlist".into(),
            "--newline".into(),
            "--progress".into(),
            "--progress-template".into(),
            PROGRESS_TEMPLATE.into(),
            "-o".into(),
            output_template.to_string_lossy().into_owned(),
        ]
    }
}

impl MediaConverter for YtDlpConverter {
    fn convert(
        &self,
        item: &str,
        work_dir: &Path,
        on_progress: &mut dyn FnMut(ConvertProgress),
    ) -> Result<ConvertedMedia, ConvertError> {
        let info = self.probe(item)?;
        let (title, output_dir, template) = match info.layout() {
            SourceLayout::Playlist { title, folder } => {
                let dir = work_dir.join(folder);
                let template = dir.join("%(playlist_index)s - %(title)s.%(ext)s");
                (title, dir, template)
            }
            SourceLayout::Single { title } => {
                let template = work_dir.join("%(title)s.%(ext)s");
                (title, work_dir.to_path_buf(), template)
            }
        };
        std::fs::create_dir_all(&output_dir)?;

        info!("Starting download: {} -> {:?}", item, output_dir);
        let mut child = self
            .command()
            .args(self.download_args(&template))
            .arg(item)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        // Drain stderr on its own thread so a chatty child can't fill the pipe
        // while stdout is being read here.
        let stderr_reader = child.stderr.take().map(|mut stderr| {
            std::thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = stderr.read_to_end(&mut buf);
                buf
            })
        });

        if let Some(stdout) = child.stdout.take() {
            for line in BufReader::new(stdout).lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!("Failed to read yt-dlp output: {}", e);
                        break;
                    }
                };
                match parse_progress_line(&line) {
                    Some(progress) => on_progress(progress),
                    None => debug!("yt-dlp: {}", line),
                }
            }
        }

        let status = child.wait()?;
        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if !status.success() {
            let detail = tail(&stderr);
            return Err(ConvertError::DownloadFailed(if detail.is_empty() {
                format!("yt-dlp exited with {}", status)
            } else {
                detail
            }));
        }

        info!("Download finished for {}", item);
        Ok(ConvertedMedia { title, output_dir })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_separators_and_strips_unsafe_chars() {
        assert_eq!(sanitize_filename("  AC/DC: Live  "), "AC-DC Live");
        assert_eq!(sanitize_filename(r"a\\//b"), "a-b");
        assert_eq!(sanitize_filename("what? <now> \"|*\""), "what now ");
        assert_eq!(sanitize_filename("tab\tand\nnewline"), "tabandnewline");
        assert_eq!(sanitize_filename("many    spaces"), "many spaces");
    }

    #[test]
    fn parses_downloading_line() {
        let line = "__progress__ downloading|1024|4096|NA|512.5|6|/tmp/a.webm";
        assert_eq!(
            parse_progress_line(line),
            Some(ConvertProgress::Downloading {
                downloaded_bytes: 1024,
                total_bytes: Some(4096),
                speed: Some(512.5),
                eta: Some(6),
            })
        );
    }

    #[test]
    fn falls_back_to_total_estimate() {
        let line = "__progress__ downloading|10|NA|100.0|NA|NA|x";
        assert_eq!(
            parse_progress_line(line),
            Some(ConvertProgress::Downloading {
                downloaded_bytes: 10,
                total_bytes: Some(100),
                speed: None,
                eta: None,
            })
        );
    }

    #[test]
    fn parses_finished_line_keeping_pipes_in_filename() {
        let line = "__progress__ finished|4096|4096|NA|NA|NA|/tmp/x|y.webm\n";
        assert_eq!(
            parse_progress_line(line),
            Some(ConvertProgress::Finished {
                filename: "/tmp/x|y.webm".to_string()
            })
        );
    }

    #[test]
    fn other_statuses_become_status_labels() {
        assert_eq!(
            parse_progress_line("__progress__ error|NA|NA|NA|NA|NA|NA"),
            Some(ConvertProgress::Status("error".to_string()))
        );
    }

    #[test]
    fn ignores_unrelated_output() {
        assert_eq!(parse_progress_line("[youtube] Extracting URL"), None);
    }

    #[test]
    fn detects_playlist_layout() {
        let info: SourceInfo = serde_json::from_str(
            r#"{"_type": "playlist", "title": "Best of: 2020/2021", "entries": []}"#,
        )
        .unwrap();
        assert_eq!(
            info.layout(),
            SourceLayout::Playlist {
                title: "Best of: 2020/2021".to_string(),
                folder: "Best of 2020-2021".to_string(),
            }
        );
    }

    #[test]
    fn detects_single_layout_with_default_title() {
        let info: SourceInfo = serde_json::from_str(r#"{"_type": "video"}"#).unwrap();
        assert_eq!(
            info.layout(),
            SourceLayout::Single {
                title: "video".to_string()
            }
        );
    }

    #[test]
    fn missing_executable_is_a_spawn_error() {
        let converter = YtDlpConverter::new(YtDlpOptions {
            program: PathBuf::from("/nonexistent/yt-dlp-binary"),
            ..Default::default()
        });
        let dir = tempfile::TempDir::new().unwrap();
        let result = converter.convert("https://example.com/v", dir.path(), &mut |_| {});
        assert!(matches!(result, Err(ConvertError::Spawn { .. })));
    }
}
