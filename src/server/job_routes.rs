//! Job submission, status and archive download routes.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::io::ReaderStream;
use tracing::{error, warn};

use crate::jobs::{JobId, SubmitError};
use crate::server::state::{GuardedJobManager, GuardedJobRegistry};

#[derive(Debug, Deserialize)]
pub struct EnqueueForm {
    /// Links separated by commas or newlines.
    #[serde(default)]
    pub links: String,
}

#[derive(Debug, Serialize)]
pub struct EnqueueResponse {
    pub job_id: String,
}

fn status_response(code: StatusCode, status: &str) -> Response {
    (code, Json(json!({ "status": status }))).into_response()
}

pub async fn enqueue(
    State(job_manager): State<GuardedJobManager>,
    Form(form): Form<EnqueueForm>,
) -> Response {
    match job_manager.submit(&form.links) {
        Ok(job_id) => Json(EnqueueResponse {
            job_id: job_id.to_string(),
        })
        .into_response(),
        Err(SubmitError::NoLinks) => status_response(StatusCode::OK, "no links"),
        Err(e) => {
            error!("Failed to enqueue job: {}", e);
            status_response(StatusCode::INTERNAL_SERVER_ERROR, "error")
        }
    }
}

pub async fn get_job_status(
    State(registry): State<GuardedJobRegistry>,
    Path(job_id): Path<String>,
) -> Response {
    match registry.get(&JobId::from(job_id)) {
        Some(job) => Json(job.status()).into_response(),
        None => status_response(StatusCode::NOT_FOUND, "not_found"),
    }
}

pub async fn download_job_archive(
    State(registry): State<GuardedJobRegistry>,
    Path(job_id): Path<String>,
) -> Response {
    let Some(job) = registry.get(&JobId::from(job_id)) else {
        return status_response(StatusCode::NOT_FOUND, "not_found");
    };
    let (Some(path), Some(name)) = (job.archive(), job.archive_name()) else {
        return status_response(StatusCode::ACCEPTED, "not_ready");
    };

    let file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) => {
            warn!("Archive {:?} for job {} unavailable: {}", path, job.id, e);
            return status_response(StatusCode::NOT_FOUND, "not_found");
        }
    };
    let length = match file.metadata().await {
        Ok(m) => m.len(),
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    };

    let body = Body::from_stream(ReaderStream::new(file));
    (
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_LENGTH, length.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", name),
            ),
        ],
        body,
    )
        .into_response()
}
