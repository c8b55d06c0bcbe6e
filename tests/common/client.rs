//! HTTP and WebSocket client for end-to-end tests
//!
//! Wraps reqwest and tokio-tungstenite with one method per server endpoint.
//! When API routes or request formats change, update only this file.

use super::constants::*;
use futures::StreamExt;
use reqwest::{Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message};

pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
    /// The WebSocket base URL of the test server
    pub ws_url: String,
}

impl TestClient {
    pub fn new(base_url: String, ws_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self {
            client,
            base_url,
            ws_url,
        }
    }

    // ========================================================================
    // Job Endpoints
    // ========================================================================

    /// POST /enqueue with a form-encoded `links` field
    pub async fn enqueue(&self, links: &str) -> Response {
        self.client
            .post(format!("{}/enqueue", self.base_url))
            .form(&[("links", links)])
            .send()
            .await
            .expect("Enqueue request failed")
    }

    /// Enqueues `links` and returns the new job id
    ///
    /// # Panics
    ///
    /// Panics if the server did not accept the batch.
    pub async fn enqueue_job(&self, links: &str) -> String {
        let response = self.enqueue(links).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.json().await.expect("Enqueue response not JSON");
        body["job_id"]
            .as_str()
            .unwrap_or_else(|| panic!("No job_id in enqueue response: {}", body))
            .to_string()
    }

    /// GET /v1/jobs/{job_id}
    pub async fn get_job(&self, job_id: &str) -> Response {
        self.client
            .get(format!("{}/v1/jobs/{}", self.base_url, job_id))
            .send()
            .await
            .expect("Job status request failed")
    }

    /// GET /download/{job_id}
    pub async fn download_job(&self, job_id: &str) -> Response {
        self.client
            .get(format!("{}/download/{}", self.base_url, job_id))
            .send()
            .await
            .expect("Download request failed")
    }

    /// Polls the job status until its state is `completed`
    pub async fn wait_for_completion(&self, job_id: &str) -> Value {
        let result = timeout(Duration::from_millis(JOB_COMPLETION_TIMEOUT_MS), async {
            loop {
                let response = self.get_job(job_id).await;
                assert_eq!(response.status(), StatusCode::OK);
                let status: Value = response.json().await.expect("Job status not JSON");
                if status["state"]["name"] == "completed" {
                    return status;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await;

        result.unwrap_or_else(|_| panic!("Job {} did not complete in time", job_id))
    }

    // ========================================================================
    // WebSocket
    // ========================================================================

    /// Connects to /ws/{job_id}
    pub async fn connect_ws(&self, job_id: &str) -> WsStream {
        let (ws_stream, _) = connect_async(format!("{}/ws/{}", self.ws_url, job_id))
            .await
            .expect("Failed to connect to WebSocket");
        ws_stream
    }

    /// Reads every JSON text frame until the server closes the connection
    pub async fn collect_ws_messages(&self, job_id: &str) -> Vec<Value> {
        let mut ws = self.connect_ws(job_id).await;
        let result = timeout(Duration::from_millis(JOB_COMPLETION_TIMEOUT_MS), async {
            let mut messages = Vec::new();
            while let Some(Ok(msg)) = ws.next().await {
                match msg {
                    Message::Text(text) => messages.push(
                        serde_json::from_str::<Value>(&text).expect("WebSocket frame not JSON"),
                    ),
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            messages
        })
        .await;

        result.unwrap_or_else(|_| panic!("WebSocket for job {} never closed", job_id))
    }

    // ========================================================================
    // Catalog Endpoints
    // ========================================================================

    /// GET /v1/albums
    pub async fn list_albums(&self) -> Response {
        self.get(&format!("{}/v1/albums", self.base_url)).await
    }

    /// GET /v1/albums/{id}
    pub async fn get_album(&self, id: i64) -> Response {
        self.get(&format!("{}/v1/albums/{}", self.base_url, id))
            .await
    }

    /// GET /v1/albums/{id}/download
    pub async fn download_album(&self, id: i64) -> Response {
        self.get(&format!("{}/v1/albums/{}/download", self.base_url, id))
            .await
    }

    /// GET /v1/songs/{id}
    pub async fn get_song(&self, id: i64) -> Response {
        self.get(&format!("{}/v1/songs/{}", self.base_url, id))
            .await
    }

    /// GET /v1/songs/{id}/download, with an optional `Range` header
    pub async fn download_song(&self, id: i64, range: Option<&str>) -> Response {
        let mut request = self
            .client
            .get(format!("{}/v1/songs/{}/download", self.base_url, id));
        if let Some(range) = range {
            request = request.header("Range", range);
        }
        request.send().await.expect("Song download request failed")
    }

    /// GET / (server stats)
    pub async fn get_stats(&self) -> Response {
        self.get(&format!("{}/", self.base_url)).await
    }

    async fn get(&self, url: &str) -> Response {
        self.client
            .get(url)
            .send()
            .await
            .unwrap_or_else(|e| panic!("GET {} failed: {}", url, e))
    }
}
