//! Music Convert Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod archive;
pub mod catalog_store;
pub mod config;
pub mod conversion;
pub mod indexer;
pub mod jobs;
pub mod server;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use catalog_store::{CatalogStore, SqliteCatalogStore};
pub use conversion::{FfprobeMetadataProbe, MediaConverter, MetadataProbe, YtDlpConverter};
pub use jobs::{JobManager, JobRegistry, ProgressMessage};
pub use server::{run_server, RequestsLoggingLevel};
