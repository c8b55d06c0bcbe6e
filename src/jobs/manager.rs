//! Job submission.

use super::job::{Job, JobId};
use super::registry::JobRegistry;
use super::runner::{JobContext, JobRunner};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("no links")]
    NoLinks,

    #[error("Failed to create work directory: {0}")]
    WorkDir(#[from] std::io::Error),
}

/// Split a raw batch on commas and newlines. Entries are trimmed; blanks and
/// `#` comments are dropped.
pub fn parse_links(raw: &str) -> Vec<String> {
    raw.split(|c| c == ',' || c == '\n')
        .map(str::trim)
        .filter(|link| !link.is_empty() && !link.starts_with('#'))
        .map(String::from)
        .collect()
}

pub struct JobManager {
    ctx: JobContext,
}

impl JobManager {
    pub fn new(ctx: JobContext) -> Self {
        Self { ctx }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.ctx.registry
    }

    /// Create and start a job for `raw_links`, returning its id immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, raw_links: &str) -> Result<JobId, SubmitError> {
        let links = parse_links(raw_links);
        if links.is_empty() {
            return Err(SubmitError::NoLinks);
        }

        let id = JobId::generate();
        let work_dir = self.ctx.output_root.join(id.as_str());
        std::fs::create_dir_all(&work_dir)?;

        info!("Enqueued job {} with {} link(s)", id, links.len());
        let job = self.ctx.registry.register(Job::new(id.clone(), links, work_dir));
        tokio::spawn(JobRunner::new(job, self.ctx.clone()).run());
        Ok(id)
    }
}
