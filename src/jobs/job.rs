use super::feed::Feed;
use super::messages::ProgressMessage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

/// Opaque job identifier, a hyphenated random UUID.
///
/// Ids are unguessable and double as the capability to watch and download a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum JobState {
    Started,
    Converting { current: usize, total: usize },
    Packaging,
    Indexing,
    Completed,
}

#[derive(Debug)]
struct JobProgress {
    state: JobState,
    outcomes: Vec<bool>,
    completed_at: Option<DateTime<Utc>>,
}

/// Serializable view of a job for the status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: JobId,
    pub state: JobState,
    pub links: Vec<String>,
    pub outcomes: Vec<bool>,
    pub archive: Option<String>,
    pub messages: usize,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// One submitted batch of links.
pub struct Job {
    pub id: JobId,
    pub links: Vec<String>,
    /// `<output_root>/<id>`, exclusive to this job.
    pub work_dir: PathBuf,
    pub created_at: DateTime<Utc>,
    feed: Arc<Feed>,
    progress: Mutex<JobProgress>,
    archive: OnceLock<PathBuf>,
}

impl Job {
    pub fn new(id: JobId, links: Vec<String>, work_dir: PathBuf) -> Self {
        Self {
            id,
            links,
            work_dir,
            created_at: Utc::now(),
            feed: Feed::new(),
            progress: Mutex::new(JobProgress {
                state: JobState::Started,
                outcomes: Vec::new(),
                completed_at: None,
            }),
            archive: OnceLock::new(),
        }
    }

    pub fn feed(&self) -> &Arc<Feed> {
        &self.feed
    }

    pub fn emit(&self, message: ProgressMessage) {
        self.feed.push(message);
    }

    pub fn state(&self) -> JobState {
        self.progress.lock().unwrap().state
    }

    pub(super) fn set_state(&self, state: JobState) {
        self.progress.lock().unwrap().state = state;
    }

    pub fn outcomes(&self) -> Vec<bool> {
        self.progress.lock().unwrap().outcomes.clone()
    }

    pub(super) fn record_outcome(&self, ok: bool) {
        self.progress.lock().unwrap().outcomes.push(ok);
    }

    pub(super) fn mark_completed(&self) {
        let mut progress = self.progress.lock().unwrap();
        progress.state = JobState::Completed;
        progress.completed_at = Some(Utc::now());
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.progress.lock().unwrap().completed_at
    }

    pub fn is_completed(&self) -> bool {
        self.state() == JobState::Completed
    }

    pub fn archive(&self) -> Option<&Path> {
        self.archive.get().map(PathBuf::as_path)
    }

    /// Store the archive location. Returns false if one was already set.
    pub(super) fn set_archive(&self, path: PathBuf) -> bool {
        self.archive.set(path).is_ok()
    }

    pub fn archive_name(&self) -> Option<String> {
        self.archive()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
    }

    pub fn status(&self) -> JobStatus {
        let progress = self.progress.lock().unwrap();
        JobStatus {
            job_id: self.id.clone(),
            state: progress.state,
            links: self.links.clone(),
            outcomes: progress.outcomes.clone(),
            archive: self.archive_name(),
            messages: self.feed.len(),
            created_at: self.created_at,
            completed_at: progress.completed_at,
        }
    }
}
