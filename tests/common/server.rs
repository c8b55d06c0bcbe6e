//! Test server lifecycle management
//!
//! Spawns an isolated server on a random port with a fake converter, a
//! throwaway output root and a fresh catalog database.

use super::constants::*;
use super::fixtures::{FakeConverter, StubProbe};
use musicconvert_server::catalog_store::{CatalogStore, SqliteCatalogStore};
use musicconvert_server::conversion::ConversionUnit;
use musicconvert_server::jobs::{JobContext, JobManager, JobRegistry};
use musicconvert_server::server::{make_app, ServerConfig};
use musicconvert_server::RequestsLoggingLevel;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// A running test server instance
///
/// The server is shut down and its temporary directories removed when this
/// is dropped.
pub struct TestServer {
    /// Base URL for HTTP requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// Base URL for WebSocket connections (e.g., "ws://127.0.0.1:12345")
    pub ws_url: String,

    /// Port the server is listening on
    #[allow(dead_code)]
    pub port: u16,

    /// Directory holding job work dirs and archives
    #[allow(dead_code)]
    pub output_root: PathBuf,

    /// Direct access to the catalog for seeding and assertions
    #[allow(dead_code)]
    pub catalog: Arc<SqliteCatalogStore>,

    // Private fields - kept alive for the lifetime of the server
    _temp_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a new test server with a fresh catalog and an empty job registry
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory, catalog or listener cannot be
    /// created, or if the server doesn't become ready within timeout.
    pub async fn spawn() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let output_root = temp_dir.path().join("output");
        std::fs::create_dir_all(&output_root).expect("Failed to create output root");

        let catalog = Arc::new(
            SqliteCatalogStore::new(temp_dir.path().join("catalog.db"))
                .expect("Failed to open catalog store"),
        );

        let job_manager = Arc::new(JobManager::new(JobContext {
            registry: Arc::new(JobRegistry::new()),
            unit: ConversionUnit::new(Arc::new(FakeConverter)),
            catalog: catalog.clone(),
            probe: Arc::new(StubProbe),
            output_root: output_root.clone(),
            poll_interval: Duration::from_millis(FEED_POLL_INTERVAL_MS),
        }));

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");

        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        // Create shutdown channel
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            frontend_dir_path: None,
        };

        let app = make_app(
            config,
            catalog.clone() as Arc<dyn CatalogStore>,
            job_manager,
        );

        // Spawn server in background task with graceful shutdown
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url: format!("http://127.0.0.1:{}", port),
            ws_url: format!("ws://127.0.0.1:{}", port),
            port,
            output_root,
            catalog,
            _temp_dir: temp_dir,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Waits for the server to become ready by polling the stats endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => {
                    return;
                }
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Send shutdown signal
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
        // TempDir will be cleaned up automatically
    }
}
