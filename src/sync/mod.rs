mod dedupe;
mod orchestrator;
mod source;
mod stats;
mod watcher;

pub use dedupe::{DedupeTracker, FailurePolicy};
pub use orchestrator::{
    OrchestratorOptions, ReconcileSummary, SyncOrchestrator, SyncState, WatchHandle,
};
pub use source::{FolderSource, LocalFolderSource, Uploader};
pub use stats::SyncStats;
pub use watcher::{wait_until_stable, FolderWatcher, WatchEvent, WatchOptions};
