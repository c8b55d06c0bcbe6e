mod file_config;

pub use file_config::{ConverterConfig, FileConfig};

use crate::conversion::YtDlpOptions;
use crate::jobs::MAX_RETENTION_HOURS;
use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_OUTPUT_ROOT: &str = "web_output";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub output_root: Option<PathBuf>,
    pub catalog_db: Option<PathBuf>,
    pub host: String,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub log_file: Option<PathBuf>,
    pub poll_interval_ms: u64,
    pub job_retention_hours: u64,
    pub prune_interval_hours: u64,
    pub yt_dlp_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            output_root: None,
            catalog_db: None,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            logging_level: RequestsLoggingLevel::default(),
            frontend_dir_path: None,
            log_file: None,
            poll_interval_ms: 100,
            job_retention_hours: 0,
            prune_interval_hours: 24,
            yt_dlp_path: None,
            ffprobe_path: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConverterSettings {
    pub yt_dlp_path: PathBuf,
    pub audio_format: String,
    pub audio_quality: String,
    pub ffprobe_path: PathBuf,
}

impl Default for ConverterSettings {
    fn default() -> Self {
        Self {
            yt_dlp_path: PathBuf::from("yt-dlp"),
            audio_format: "m4a".to_string(),
            audio_quality: "256K".to_string(),
            ffprobe_path: PathBuf::from("ffprobe"),
        }
    }
}

impl ConverterSettings {
    pub fn yt_dlp_options(&self) -> YtDlpOptions {
        YtDlpOptions {
            program: self.yt_dlp_path.clone(),
            audio_format: self.audio_format.clone(),
            audio_quality: self.audio_quality.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Parent of every job work dir and job archive.
    pub output_root: PathBuf,
    pub catalog_db: PathBuf,
    pub host: String,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub log_file: Option<PathBuf>,
    pub poll_interval: Duration,
    /// 0 keeps jobs for the life of the process.
    pub job_retention_hours: u64,
    pub prune_interval_hours: u64,
    pub converter: ConverterSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let output_root = file
            .output_root
            .map(PathBuf::from)
            .or_else(|| cli.output_root.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_ROOT));
        if output_root.exists() && !output_root.is_dir() {
            bail!("output_root is not a directory: {:?}", output_root);
        }

        let catalog_db = file
            .catalog_db
            .map(PathBuf::from)
            .or_else(|| cli.catalog_db.clone())
            .unwrap_or_else(|| output_root.join("catalog.db"));

        let host = file.host.unwrap_or_else(|| cli.host.clone());
        let port = file.port.unwrap_or(cli.port);

        let logging_level = match file.logging_level {
            Some(s) => match parse_logging_level(&s) {
                Some(level) => level,
                None => bail!("Invalid logging_level: {:?}", s),
            },
            None => cli.logging_level.clone(),
        };

        let frontend_dir_path = file
            .frontend_dir_path
            .or_else(|| cli.frontend_dir_path.clone());
        let log_file = file
            .log_file
            .map(PathBuf::from)
            .or_else(|| cli.log_file.clone());

        let poll_interval_ms = file.poll_interval_ms.unwrap_or(cli.poll_interval_ms);
        if poll_interval_ms == 0 {
            bail!("poll_interval_ms must be greater than 0");
        }

        let job_retention_hours = file
            .job_retention_hours
            .unwrap_or(cli.job_retention_hours);
        let prune_interval_hours = file
            .prune_interval_hours
            .unwrap_or(cli.prune_interval_hours);
        if job_retention_hours > 0 && prune_interval_hours == 0 {
            bail!("prune_interval_hours must be greater than 0 when job retention is enabled");
        }
        if job_retention_hours > MAX_RETENTION_HOURS || prune_interval_hours > MAX_RETENTION_HOURS {
            bail!(
                "job_retention_hours and prune_interval_hours must not exceed {}",
                MAX_RETENTION_HOURS
            );
        }

        let defaults = ConverterSettings::default();
        let conv_file = file.converter.unwrap_or_default();
        let converter = ConverterSettings {
            yt_dlp_path: conv_file
                .yt_dlp_path
                .map(PathBuf::from)
                .or_else(|| cli.yt_dlp_path.clone())
                .unwrap_or(defaults.yt_dlp_path),
            audio_format: conv_file.audio_format.unwrap_or(defaults.audio_format),
            audio_quality: conv_file.audio_quality.unwrap_or(defaults.audio_quality),
            ffprobe_path: conv_file
                .ffprobe_path
                .map(PathBuf::from)
                .or_else(|| cli.ffprobe_path.clone())
                .unwrap_or(defaults.ffprobe_path),
        };
        if converter.audio_format.trim().is_empty() {
            bail!("converter.audio_format must not be empty");
        }

        Ok(Self {
            output_root,
            catalog_db,
            host,
            port,
            logging_level,
            frontend_dir_path,
            log_file,
            poll_interval: Duration::from_millis(poll_interval_ms),
            job_retention_hours,
            prune_interval_hours,
            converter,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
