//! Messages published on a job's progress feed.

use serde::{Deserialize, Serialize};

/// One event on a job's feed, serialized to subscribers as a JSON object
/// tagged with `"type"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressMessage {
    Downloading {
        /// In `[0.0, 1.0]`; 0.0 while the total size is unknown.
        fraction_complete: f64,
        bytes_done: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bytes_total: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        speed: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        eta: Option<u64>,
    },
    ItemFinished {
        output_path: String,
    },
    StatusChanged {
        label: String,
    },
    Lifecycle {
        text: String,
    },
    IndexingStarted,
    IndexingFinished,
    IndexingError {
        text: String,
    },
    ArchiveReady {
        name: String,
    },
    /// Always the last message of a job.
    Done,
}

impl ProgressMessage {
    pub fn lifecycle(text: impl Into<String>) -> Self {
        Self::Lifecycle { text: text.into() }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}
