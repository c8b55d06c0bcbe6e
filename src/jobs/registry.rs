//! Process-wide table of jobs.

use super::job::{Job, JobId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tracing::warn;

#[derive(Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, Arc<Job>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, job: Job) -> Arc<Job> {
        let job = Arc::new(job);
        self.jobs
            .write()
            .unwrap()
            .insert(job.id.clone(), Arc::clone(&job));
        job
    }

    pub fn get(&self, id: &JobId) -> Option<Arc<Job>> {
        self.jobs.read().unwrap().get(id).cloned()
    }

    /// Record the archive of a job. The location can only be set once; later
    /// writes are ignored and return false.
    pub fn set_archive(&self, id: &JobId, path: PathBuf) -> bool {
        let Some(job) = self.get(id) else {
            warn!("Archive {:?} set for unknown job {}", path, id);
            return false;
        };
        if job.set_archive(path.clone()) {
            true
        } else {
            warn!(
                "Job {} already has archive {:?}, ignoring {:?}",
                id,
                job.archive(),
                path
            );
            false
        }
    }

    pub fn archive_path(&self, id: &JobId) -> Option<PathBuf> {
        self.get(id).and_then(|job| job.archive().map(PathBuf::from))
    }

    pub fn len(&self) -> usize {
        self.jobs.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Jobs that have not reached `Completed` yet.
    pub fn active_count(&self) -> usize {
        self.jobs
            .read()
            .unwrap()
            .values()
            .filter(|job| !job.is_completed())
            .count()
    }

    /// Drop completed jobs whose completion time is before `cutoff`.
    pub fn remove_completed_before(&self, cutoff: DateTime<Utc>) -> Vec<Arc<Job>> {
        let mut jobs = self.jobs.write().unwrap();
        let expired: Vec<JobId> = jobs
            .values()
            .filter(|job| job.completed_at().is_some_and(|at| at < cutoff))
            .map(|job| job.id.clone())
            .collect();
        expired
            .into_iter()
            .filter_map(|id| jobs.remove(&id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn job(id: &str) -> Job {
        Job::new(JobId::from(id), vec!["a".to_string()], PathBuf::from("/tmp").join(id))
    }

    #[test]
    fn register_and_get() {
        let registry = JobRegistry::new();
        assert!(registry.is_empty());

        registry.register(job("one"));

        assert_eq!(registry.len(), 1);
        assert!(registry.get(&JobId::from("one")).is_some());
        assert!(registry.get(&JobId::from("two")).is_none());
        assert_eq!(registry.active_count(), 1);
    }

    #[test]
    fn set_archive_is_write_once() {
        let registry = JobRegistry::new();
        let id = JobId::from("one");
        registry.register(job("one"));

        assert!(registry.set_archive(&id, PathBuf::from("/out/music_one.zip")));
        assert!(!registry.set_archive(&id, PathBuf::from("/out/second.zip")));
        assert_eq!(
            registry.archive_path(&id),
            Some(PathBuf::from("/out/music_one.zip"))
        );
    }

    #[test]
    fn set_archive_for_unknown_job_fails() {
        let registry = JobRegistry::new();
        assert!(!registry.set_archive(&JobId::from("ghost"), PathBuf::from("/x.zip")));
        assert!(registry.archive_path(&JobId::from("ghost")).is_none());
    }

    #[test]
    fn removes_only_completed_jobs_older_than_cutoff() {
        let registry = JobRegistry::new();
        let done = registry.register(job("done"));
        registry.register(job("running"));
        done.mark_completed();

        let removed = registry.remove_completed_before(Utc::now() - Duration::hours(1));
        assert!(removed.is_empty());

        let removed = registry.remove_completed_before(Utc::now() + Duration::seconds(1));
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id, JobId::from("done"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.active_count(), 1);
    }
}
