use anyhow::{Context, Result};
use clap::Parser;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use musicconvert_server::config::{AppConfig, CliConfig, FileConfig};
use musicconvert_server::conversion::{ConversionUnit, FfprobeMetadataProbe, YtDlpConverter};
use musicconvert_server::jobs::{spawn_pruning, JobContext, JobManager, JobRegistry};
use musicconvert_server::server::ServerConfig;
use musicconvert_server::{run_server, RequestsLoggingLevel, SqliteCatalogStore};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to a TOML config file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory holding job work directories and job archives.
    #[clap(long, value_parser = parse_path)]
    pub output_root: Option<PathBuf>,

    /// Path to the SQLite catalog database file. Defaults to catalog.db in the output root.
    #[clap(long, value_parser = parse_path)]
    pub catalog_db: Option<PathBuf>,

    /// The address to bind.
    #[clap(long, env = "WEB_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// The port to listen on.
    #[clap(short, long, env = "WEB_PORT", default_value_t = 8000)]
    pub port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,

    /// Also append logs to this file.
    #[clap(long, value_parser = parse_path)]
    pub log_file: Option<PathBuf>,

    /// How often the progress forwarder drains a job's channel, in milliseconds.
    #[clap(long, default_value_t = 100)]
    pub poll_interval_ms: u64,

    /// Hours to keep completed jobs before pruning. Set to 0 to disable pruning.
    #[clap(long, default_value_t = 0)]
    pub job_retention_hours: u64,

    /// Interval in hours between pruning runs. Only used if job_retention_hours > 0.
    #[clap(long, default_value_t = 24)]
    pub prune_interval_hours: u64,

    /// yt-dlp executable.
    #[clap(long)]
    pub yt_dlp_path: Option<PathBuf>,

    /// ffprobe executable.
    #[clap(long)]
    pub ffprobe_path: Option<PathBuf>,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            output_root: self.output_root.clone(),
            catalog_db: self.catalog_db.clone(),
            host: self.host.clone(),
            port: self.port,
            logging_level: self.logging_level.clone(),
            frontend_dir_path: self.frontend_dir_path.clone(),
            log_file: self.log_file.clone(),
            poll_interval_ms: self.poll_interval_ms,
            job_retention_hours: self.job_retention_hours,
            prune_interval_hours: self.prune_interval_hours,
            yt_dlp_path: self.yt_dlp_path.clone(),
            ffprobe_path: self.ffprobe_path.clone(),
        }
    }
}

fn init_logging(log_file: Option<&PathBuf>) -> Result<()> {
    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {:?}", path))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    init_logging(config.log_file.as_ref())?;

    std::fs::create_dir_all(&config.output_root)
        .with_context(|| format!("Failed to create output root {:?}", config.output_root))?;
    info!("Writing job output under {:?}", config.output_root);

    info!("Opening SQLite catalog database at {:?}...", config.catalog_db);
    let catalog_store = Arc::new(SqliteCatalogStore::new(&config.catalog_db)?);

    let converter = Arc::new(YtDlpConverter::new(config.converter.yt_dlp_options()));
    let probe = Arc::new(FfprobeMetadataProbe::new(
        config.converter.ffprobe_path.clone(),
    ));

    let registry = Arc::new(JobRegistry::new());
    let job_manager = Arc::new(JobManager::new(JobContext {
        registry: registry.clone(),
        unit: ConversionUnit::new(converter),
        catalog: catalog_store.clone(),
        probe,
        output_root: config.output_root.clone(),
        poll_interval: config.poll_interval,
    }));

    if config.job_retention_hours > 0 {
        spawn_pruning(
            registry,
            config.job_retention_hours,
            config.prune_interval_hours,
        );
    }

    let server_config = ServerConfig {
        requests_logging_level: config.logging_level.clone(),
        port: config.port,
        frontend_dir_path: config.frontend_dir_path.clone(),
    };

    info!("Ready to serve at {}!", config.bind_address());
    run_server(
        server_config,
        &config.host,
        catalog_store,
        job_manager,
        shutdown_signal(),
    )
    .await
}
