use anyhow::{Context, Result};
use std::future::Future;
use std::time::Duration;

use tower_http::services::ServeDir;
use tracing::info;

use axum::{
    extract::State,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use super::{
    catalog_routes, job_routes, log_requests, state::*, stream_song::stream_song,
    websocket::ws_job_handler, ServerConfig,
};

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub version: String,
    pub active_jobs: usize,
    pub total_jobs: usize,
    pub albums: usize,
    pub songs: usize,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(State(state): State<ServerState>) -> Response {
    let counts = catalog_routes::with_store(state.catalog_store.clone(), |s| {
        Ok((s.get_albums_count(), s.get_songs_count()))
    })
    .await;
    let (albums, songs) = match counts {
        Ok(counts) => counts,
        Err(resp) => return resp,
    };

    let registry = state.job_manager.registry();
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        version: env!("CARGO_PKG_VERSION").to_string(),
        active_jobs: registry.active_count(),
        total_jobs: registry.len(),
        albums,
        songs,
    };
    Json(stats).into_response()
}

pub fn make_app(
    config: ServerConfig,
    catalog_store: GuardedCatalogStore,
    job_manager: GuardedJobManager,
) -> Router {
    let state = ServerState::new(config.clone(), catalog_store, job_manager);

    let job_router: Router = Router::new()
        .route("/enqueue", post(job_routes::enqueue))
        .route("/ws/{job_id}", get(ws_job_handler))
        .route("/download/{job_id}", get(job_routes::download_job_archive))
        .route("/v1/jobs/{job_id}", get(job_routes::get_job_status))
        .with_state(state.clone());

    let catalog_router: Router = Router::new()
        .route("/albums", get(catalog_routes::list_albums))
        .route("/albums/{id}", get(catalog_routes::get_album))
        .route("/albums/{id}/download", get(catalog_routes::download_album))
        .route("/songs/{id}", get(catalog_routes::get_song))
        .route("/songs/{id}/download", get(stream_song))
        .with_state(state.clone());

    let home_router: Router = match config.frontend_dir_path {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new().route("/", get(home)).with_state(state.clone()),
    };

    home_router
        .merge(job_router)
        .nest("/v1", catalog_router)
        .layer(middleware::from_fn_with_state(state, log_requests))
}

pub async fn run_server<F>(
    config: ServerConfig,
    host: &str,
    catalog_store: GuardedCatalogStore,
    job_manager: GuardedJobManager,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let address = format!("{}:{}", host, config.port);
    let app = make_app(config, catalog_store, job_manager);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("Listening on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server error")
}
