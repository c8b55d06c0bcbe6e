//! Job orchestration: submission, sequential item processing and progress
//! streaming to subscribers.

mod channel;
mod feed;
mod job;
mod manager;
mod messages;
mod registry;
mod retention;
mod runner;

pub use channel::{
    forward, progress_channel, ChannelEvent, ProgressReceiver, ProgressSender,
    DEFAULT_POLL_INTERVAL,
};
pub use feed::{Feed, FeedCursor};
pub use job::{Job, JobId, JobState, JobStatus};
pub use manager::{parse_links, JobManager, SubmitError};
pub use messages::ProgressMessage;
pub use registry::JobRegistry;
pub use retention::{prune_completed_before, spawn_pruning, MAX_RETENTION_HOURS};
pub use runner::{archive_file_name, JobContext, JobRunner};
