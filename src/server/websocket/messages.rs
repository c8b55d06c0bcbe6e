//! Messages the subscriber bridge sends on its own behalf, next to the
//! forwarded job feed.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeMessage {
    /// The requested job id is not registered.
    UnknownJob { job_id: String },
    /// Sent after `done` when the job produced an archive.
    DownloadAvailable { name: String, url: String },
}

impl BridgeMessage {
    pub fn download_available(job_id: &str, name: String) -> Self {
        Self::DownloadAvailable {
            name,
            url: format!("/download/{}", job_id),
        }
    }
}
