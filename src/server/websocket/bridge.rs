//! WebSocket route streaming one job's feed to a client.
//!
//! The bridge replays the feed from its first message, follows it live until
//! `done`, announces the archive when there is one, then closes. A client
//! going away only ends this connection; the job keeps running.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error};

use super::messages::BridgeMessage;
use crate::jobs::{Job, JobId};
use crate::server::state::GuardedJobRegistry;

type WsSink = futures::stream::SplitSink<WebSocket, Message>;

/// Handler for `GET /ws/{job_id}`.
pub async fn ws_job_handler(
    ws: WebSocketUpgrade,
    State(registry): State<GuardedJobRegistry>,
    Path(job_id): Path<String>,
) -> Response {
    let job = registry.get(&JobId::from(job_id.as_str()));
    debug!("WebSocket subscription for job {}", job_id);
    ws.on_upgrade(move |socket| handle_socket(socket, job_id, job))
}

async fn handle_socket(socket: WebSocket, job_id: String, job: Option<Arc<Job>>) {
    let (mut ws_sink, mut ws_stream) = socket.split();

    // Drain client frames so pings and close frames are handled; the bridge
    // does not accept commands.
    let incoming = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_stream.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    });

    match job {
        None => {
            debug!("WebSocket subscription for unknown job {}", job_id);
            let _ = send_json(&mut ws_sink, &BridgeMessage::UnknownJob { job_id }).await;
        }
        Some(job) => forward_feed(&mut ws_sink, &job).await,
    }

    let _ = ws_sink.send(Message::Close(None)).await;
    let _ = ws_sink.close().await;
    incoming.abort();
}

async fn forward_feed(ws_sink: &mut WsSink, job: &Job) {
    let mut cursor = job.feed().subscribe();
    while let Some(message) = cursor.next().await {
        let done = message.is_done();
        if send_json(ws_sink, &message).await.is_err() {
            debug!("Subscriber for job {} went away", job.id);
            return;
        }
        if done {
            break;
        }
    }

    if let Some(name) = job.archive_name() {
        let announce = BridgeMessage::download_available(job.id.as_str(), name);
        let _ = send_json(ws_sink, &announce).await;
    }
    debug!("Feed for job {} fully delivered", job.id);
}

async fn send_json<T: Serialize>(ws_sink: &mut WsSink, msg: &T) -> Result<(), axum::Error> {
    match serde_json::to_string(msg) {
        Ok(json) => ws_sink.send(Message::Text(json.into())).await,
        Err(e) => {
            error!("Failed to serialize WebSocket message: {}", e);
            Ok(())
        }
    }
}
