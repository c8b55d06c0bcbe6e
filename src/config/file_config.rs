use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub output_root: Option<String>,
    pub catalog_db: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub logging_level: Option<String>,
    pub frontend_dir_path: Option<String>,
    pub log_file: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub job_retention_hours: Option<u64>,
    pub prune_interval_hours: Option<u64>,

    pub converter: Option<ConverterConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ConverterConfig {
    pub yt_dlp_path: Option<String>,
    pub audio_format: Option<String>,
    pub audio_quality: Option<String>,
    pub ffprobe_path: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
