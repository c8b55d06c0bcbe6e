//! Drives one job from its first link to the terminal `Done`.

use super::channel::{forward, progress_channel};
use super::job::{Job, JobState};
use super::messages::ProgressMessage;
use super::registry::JobRegistry;
use crate::archive;
use crate::catalog_store::CatalogStore;
use crate::conversion::{ConversionUnit, MetadataProbe};
use crate::indexer;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Everything a runner needs besides the job itself. Shared by all jobs.
#[derive(Clone)]
pub struct JobContext {
    pub registry: Arc<JobRegistry>,
    pub unit: ConversionUnit,
    pub catalog: Arc<dyn CatalogStore>,
    pub probe: Arc<dyn MetadataProbe>,
    pub output_root: PathBuf,
    pub poll_interval: Duration,
}

pub fn archive_file_name(job: &Job) -> String {
    format!("music_{}.zip", job.id)
}

pub struct JobRunner {
    job: Arc<Job>,
    ctx: JobContext,
}

impl JobRunner {
    pub fn new(job: Arc<Job>, ctx: JobContext) -> Self {
        Self { job, ctx }
    }

    /// Run every link in order, then package and index the results.
    ///
    /// Item, packaging and indexing failures are reported on the feed and
    /// never abort the job. `Done` is always the last message.
    pub async fn run(self) {
        let job = &self.job;
        let total = job.links.len();
        info!("Job {} started with {} link(s)", job.id, total);
        job.emit(ProgressMessage::lifecycle(format!(
            "Job {} started, {} link(s)",
            job.id, total
        )));

        for (index, link) in job.links.iter().enumerate() {
            let current = index + 1;
            job.set_state(JobState::Converting { current, total });
            job.emit(ProgressMessage::lifecycle(format!(
                "[{}/{}] Starting: {}",
                current, total, link
            )));

            let ok = self.convert(link).await;
            job.record_outcome(ok);

            job.emit(ProgressMessage::lifecycle(format!(
                "[{}/{}] Finished: {} -> {}",
                current,
                total,
                link,
                if ok { "OK" } else { "FAILED" }
            )));
        }

        job.set_state(JobState::Packaging);
        self.package().await;

        job.set_state(JobState::Indexing);
        self.index().await;

        job.mark_completed();
        job.emit(ProgressMessage::Done);
        info!(
            "Job {} completed: {}/{} link(s) succeeded",
            job.id,
            job.outcomes().iter().filter(|ok| **ok).count(),
            total
        );
    }

    async fn convert(&self, link: &str) -> bool {
        let (sender, receiver) = progress_channel();
        let forwarder = tokio::spawn(forward(
            receiver,
            Arc::clone(self.job.feed()),
            self.ctx.poll_interval,
        ));

        let unit = self.ctx.unit.clone();
        let item = link.to_string();
        let work_dir = self.job.work_dir.clone();
        // The sender lives in this closure and is dropped when it returns or
        // unwinds, which ends the forwarder.
        let worker = tokio::task::spawn_blocking(move || {
            unit.run(&item, &work_dir, |message| sender.send(message))
        });

        let ok = match worker.await {
            Ok(ok) => ok,
            Err(e) => {
                error!("Worker for {} in job {} panicked: {}", link, self.job.id, e);
                false
            }
        };

        if let Err(e) = forwarder.await {
            warn!("Progress forwarder for job {} failed: {}", self.job.id, e);
        }
        ok
    }

    async fn package(&self) {
        let job = &self.job;
        job.emit(ProgressMessage::lifecycle("Creating archive..."));

        let name = archive_file_name(job);
        let dest = self.ctx.output_root.join(&name);
        let work_dir = job.work_dir.clone();
        let dest_for_worker = dest.clone();
        let result = tokio::task::spawn_blocking(move || {
            archive::zip_directory(&work_dir, &dest_for_worker)
        })
        .await;

        let err = match result {
            Ok(Ok(count)) => {
                info!("Job {} archived {} file(s) to {:?}", job.id, count, dest);
                self.ctx.registry.set_archive(&job.id, dest);
                job.emit(ProgressMessage::ArchiveReady { name });
                return;
            }
            Ok(Err(e)) => e.to_string(),
            Err(e) => e.to_string(),
        };
        error!("Failed to create archive for job {}: {}", job.id, err);
        job.emit(ProgressMessage::lifecycle(format!(
            "Failed to create archive: {}",
            err
        )));
    }

    async fn index(&self) {
        let job = &self.job;
        job.emit(ProgressMessage::IndexingStarted);

        let work_dir = job.work_dir.clone();
        let job_id = job.id.to_string();
        let catalog = Arc::clone(&self.ctx.catalog);
        let probe = Arc::clone(&self.ctx.probe);
        let result = tokio::task::spawn_blocking(move || {
            indexer::index(&work_dir, &job_id, catalog.as_ref(), probe.as_ref())
        })
        .await;

        let err = match result {
            Ok(Ok(report)) => {
                for failure in &report.failures {
                    job.emit(ProgressMessage::IndexingError {
                        text: failure.to_string(),
                    });
                }
                job.emit(ProgressMessage::IndexingFinished);
                return;
            }
            Ok(Err(e)) => e.to_string(),
            Err(e) => e.to_string(),
        };
        error!("Indexing failed for job {}: {}", job.id, err);
        job.emit(ProgressMessage::IndexingError { text: err });
    }
}
