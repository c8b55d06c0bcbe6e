//! Optional pruning of completed jobs.

use super::registry::JobRegistry;
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Upper bound for both the retention and the prune interval, ten years.
pub const MAX_RETENTION_HOURS: u64 = 24 * 365 * 10;

/// Oldest completion time kept when retaining `retention_hours`.
fn retention_cutoff(now: DateTime<Utc>, retention_hours: u64) -> DateTime<Utc> {
    let hours = retention_hours.min(MAX_RETENTION_HOURS) as i64;
    TimeDelta::try_hours(hours)
        .and_then(|retention| now.checked_sub_signed(retention))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn prune_interval(interval_hours: u64) -> Duration {
    Duration::from_secs(interval_hours.clamp(1, MAX_RETENTION_HOURS) * 60 * 60)
}

/// Remove jobs completed before `cutoff` along with their archive files.
/// Work directories are left in place, catalog songs point into them.
pub fn prune_completed_before(registry: &JobRegistry, cutoff: DateTime<Utc>) -> usize {
    let removed = registry.remove_completed_before(cutoff);
    for job in &removed {
        if let Some(archive) = job.archive() {
            match std::fs::remove_file(archive) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => error!("Failed to delete archive {:?}: {}", archive, e),
            }
        }
    }
    removed.len()
}

/// Prune every `interval_hours`, dropping jobs completed more than
/// `retention_hours` ago.
pub fn spawn_pruning(
    registry: Arc<JobRegistry>,
    retention_hours: u64,
    interval_hours: u64,
) -> JoinHandle<()> {
    info!(
        "Job pruning enabled: retaining {} hours, pruning every {} hours",
        retention_hours, interval_hours
    );

    tokio::spawn(async move {
        let interval = prune_interval(interval_hours);
        let mut ticker = tokio::time::interval(interval);

        // Skip the first immediate tick, wait for the first interval
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let cutoff = retention_cutoff(Utc::now(), retention_hours);
            let count = prune_completed_before(&registry, cutoff);
            if count > 0 {
                info!("Pruned {} completed job(s)", count);
            }
        }
    })
}
