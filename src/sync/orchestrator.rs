use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::fs;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::server_client::{SyncFolderSpec, UploadError, UploadReceipt};

use super::dedupe::{DedupeTracker, FailurePolicy};
use super::source::{FolderSource, Uploader};
use super::stats::SyncStats;
use super::watcher::{FolderWatcher, WatchEvent, WatchOptions};

/// Lifecycle of a [`SyncOrchestrator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Timing and policy knobs, injected so tests can shrink them.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub poll_interval: Duration,
    pub watch: WatchOptions,
    pub failure_policy: FailurePolicy,
    /// Where to write the status snapshot, if anywhere.
    pub status_path: Option<PathBuf>,
}

impl From<&Settings> for OrchestratorOptions {
    fn from(settings: &Settings) -> Self {
        let failure_policy = if settings.retry_failed_uploads {
            FailurePolicy::Evict {
                max_retries: settings.max_retries,
            }
        } else {
            FailurePolicy::Retain
        };
        Self {
            poll_interval: settings.poll_interval(),
            watch: WatchOptions::from(settings),
            failure_policy,
            status_path: None,
        }
    }
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

/// An active watch for one project.
#[derive(Debug)]
pub struct WatchHandle {
    pub project_id: String,
    pub project_name: String,
    pub folder_path: PathBuf,
    /// Increments every time a watcher is (re)created.
    pub watch_id: u64,
    watcher: FolderWatcher,
}

impl WatchHandle {
    pub fn is_open(&self) -> bool {
        self.watcher.is_open()
    }
}

/// What one reconciliation pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub retained: Vec<String>,
    pub skipped: Vec<String>,
}

type UploadOutcome = (String, PathBuf, Result<UploadReceipt, UploadError>);

/// Owns the per-project watchers and routes their events through
/// dedupe and upload.
pub struct SyncOrchestrator {
    source: Arc<dyn FolderSource>,
    uploader: Arc<dyn Uploader>,
    options: OrchestratorOptions,
    state: SyncState,
    watchers: HashMap<String, WatchHandle>,
    dedupe: DedupeTracker,
    stats: SyncStats,
    next_watch_id: u64,
    events_tx: mpsc::UnboundedSender<WatchEvent>,
    events_rx: mpsc::UnboundedReceiver<WatchEvent>,
    uploads: JoinSet<UploadOutcome>,
}

impl SyncOrchestrator {
    pub fn new(
        source: Arc<dyn FolderSource>,
        uploader: Arc<dyn Uploader>,
        options: OrchestratorOptions,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            source,
            uploader,
            dedupe: DedupeTracker::new(options.failure_policy),
            options,
            state: SyncState::Stopped,
            watchers: HashMap::new(),
            stats: SyncStats::default(),
            next_watch_id: 0,
            events_tx,
            events_rx,
            uploads: JoinSet::new(),
        }
    }

    /// Record the server this instance talks to, for the status snapshot.
    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.stats.server_url = Some(url.into());
        self
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    pub fn dedupe(&self) -> &DedupeTracker {
        &self.dedupe
    }

    pub fn watch_handle(&self, project_id: &str) -> Option<&WatchHandle> {
        self.watchers.get(project_id)
    }

    /// Project ids currently watched, sorted.
    pub fn active_projects(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.watchers.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Stopped -> Starting -> Running: first poll and initial watchers.
    pub async fn start(&mut self) {
        if self.state != SyncState::Stopped {
            warn!(state = ?self.state, "Start requested while not stopped");
            return;
        }
        self.state = SyncState::Starting;
        info!("Starting sync");
        self.refresh().await;
        self.state = SyncState::Running;
        info!(projects = self.watchers.len(), "Sync running");
    }

    /// Drive the event loop until `shutdown` resolves, then stop. A poll in
    /// progress is abandoned as soon as `shutdown` fires.
    pub async fn run_until<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        if self.state == SyncState::Stopped {
            let interrupted = tokio::select! {
                biased;
                _ = &mut shutdown => true,
                _ = self.start() => false,
            };
            if interrupted {
                info!("Shutdown requested during startup");
                self.stop().await;
                return;
            }
        }

        let period = self.options.poll_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                Some(event) = self.events_rx.recv() => {
                    self.handle_event(event).await;
                }
                Some(done) = self.uploads.join_next(), if !self.uploads.is_empty() => {
                    match done {
                        Ok(outcome) => self.record_upload(outcome).await,
                        Err(err) => error!(error = %err, "Upload task failed"),
                    }
                }
                _ = ticker.tick() => {
                    let interrupted = tokio::select! {
                        biased;
                        _ = &mut shutdown => true,
                        _ = self.refresh() => false,
                    };
                    if interrupted {
                        info!("Shutdown requested while polling");
                        break;
                    }
                }
            }
        }

        self.stop().await;
    }

    /// Running -> Stopping -> Stopped. Closes every watcher; in-flight uploads
    /// are left to finish on their own.
    pub async fn stop(&mut self) {
        if self.state == SyncState::Stopped {
            return;
        }
        self.state = SyncState::Stopping;
        info!(watchers = self.watchers.len(), "Stopping sync");

        for (_, handle) in self.watchers.drain() {
            handle.watcher.close();
        }
        if !self.uploads.is_empty() {
            warn!(in_flight = self.uploads.len(), "Abandoning in-flight uploads");
            self.uploads.detach_all();
        }
        self.dedupe.clear();
        self.stats.watched_projects = 0;
        self.write_status().await;

        self.state = SyncState::Stopped;
        info!("Sync stopped");
    }

    /// Poll the folder source and reconcile. A failed poll leaves the
    /// current watchers untouched.
    pub async fn refresh(&mut self) {
        match self.source.active_folders().await {
            Ok(specs) => {
                let summary = self.reconcile(specs).await;
                if !summary.added.is_empty() || !summary.removed.is_empty() {
                    info!(
                        added = ?summary.added,
                        removed = ?summary.removed,
                        retained = summary.retained.len(),
                        "Reconciled sync folders"
                    );
                }
                self.stats.last_poll_error = None;
            }
            Err(err) => {
                warn!(error = %err, "Failed to poll sync folders, keeping current watchers");
                self.stats.last_poll_error = Some(err.to_string());
            }
        }
        self.stats.last_poll_at = Some(Utc::now());
        self.write_status().await;
    }

    /// Diff `specs` against the active watchers, keyed by project id.
    pub async fn reconcile(&mut self, specs: Vec<SyncFolderSpec>) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();

        let mut wanted: Vec<SyncFolderSpec> = Vec::with_capacity(specs.len());
        let mut seen = HashSet::new();
        for spec in specs {
            if seen.insert(spec.project_id.clone()) {
                wanted.push(spec);
            } else {
                warn!(project = %spec.project_id, "Project listed twice, ignoring duplicate");
            }
        }

        let current: Vec<(String, PathBuf)> = self
            .watchers
            .values()
            .map(|handle| (handle.project_id.clone(), handle.folder_path.clone()))
            .collect();
        let mut stale = Vec::new();
        for (project_id, folder_path) in current {
            let listed = wanted
                .iter()
                .any(|spec| spec.project_id == project_id && spec.folder_path == folder_path);
            if !listed || !is_dir(&folder_path).await {
                stale.push(project_id);
            }
        }
        for project_id in stale {
            if let Some(handle) = self.watchers.remove(&project_id) {
                info!(project = %project_id, path = %handle.folder_path.display(), "Stopped watching folder");
                handle.watcher.close();
                summary.removed.push(project_id);
            }
        }

        for spec in wanted {
            if self.watchers.contains_key(&spec.project_id) {
                summary.retained.push(spec.project_id);
                continue;
            }
            if !is_dir(&spec.folder_path).await {
                warn!(
                    project = %spec.project_id,
                    path = %spec.folder_path.display(),
                    "Sync folder does not exist, skipping"
                );
                summary.skipped.push(spec.project_id);
                continue;
            }

            match FolderWatcher::start(
                spec.project_id.clone(),
                &spec.folder_path,
                self.options.watch.clone(),
                self.events_tx.clone(),
            ) {
                Ok(watcher) => {
                    self.next_watch_id += 1;
                    summary.added.push(spec.project_id.clone());
                    self.watchers.insert(
                        spec.project_id.clone(),
                        WatchHandle {
                            project_id: spec.project_id,
                            project_name: spec.project_name,
                            folder_path: spec.folder_path,
                            watch_id: self.next_watch_id,
                            watcher,
                        },
                    );
                }
                Err(err) => {
                    warn!(project = %spec.project_id, error = %err, "Failed to start watcher");
                    summary.skipped.push(spec.project_id);
                }
            }
        }

        self.stats.watched_projects = self.watchers.len();
        summary
    }

    async fn handle_event(&mut self, event: WatchEvent) {
        match event {
            WatchEvent::FileAdded {
                project_id,
                path,
                detected_at,
            } => {
                let current = match self.watchers.get(&project_id) {
                    Some(handle) => path.starts_with(&handle.folder_path),
                    None => {
                        debug!(project = %project_id, path = %path.display(), "Event for unwatched project");
                        return;
                    }
                };
                if !current {
                    debug!(project = %project_id, path = %path.display(), "Event from a replaced watcher");
                    return;
                }
                if !is_file(&path).await {
                    debug!(path = %path.display(), "File no longer on disk");
                    return;
                }
                if !self.dedupe.admit(&project_id, &path) {
                    debug!(project = %project_id, path = %path.display(), "Already admitted, skipping");
                    self.stats.skipped_duplicates += 1;
                    return;
                }

                self.stats.detected += 1;
                info!(
                    project = %project_id,
                    path = %path.display(),
                    detected_at = %detected_at,
                    "Uploading new file"
                );
                let uploader = self.uploader.clone();
                self.uploads.spawn(async move {
                    let result = uploader.upload(&project_id, &path).await;
                    (project_id, path, result)
                });
            }
            WatchEvent::Failed {
                project_id,
                folder_path,
                error,
            } => {
                let replaced = self
                    .watchers
                    .get(&project_id)
                    .map(|handle| handle.folder_path != folder_path)
                    .unwrap_or(true);
                if replaced {
                    return;
                }
                warn!(project = %project_id, path = %folder_path.display(), error = %error, "Watcher failed, removing");
                if let Some(handle) = self.watchers.remove(&project_id) {
                    handle.watcher.close();
                }
                self.stats.watched_projects = self.watchers.len();
            }
        }
    }

    async fn record_upload(&mut self, (project_id, path, result): UploadOutcome) {
        match result {
            Ok(_) => {
                self.stats.uploaded += 1;
            }
            Err(err) => {
                self.stats.failed += 1;
                match &err {
                    UploadError::Unauthorized => error!(
                        project = %project_id,
                        path = %path.display(),
                        "Upload rejected: authentication required, log into the web app and try again"
                    ),
                    _ => error!(
                        project = %project_id,
                        path = %path.display(),
                        status = ?err.http_status(),
                        error = %err,
                        "Upload failed"
                    ),
                }
                if self.dedupe.record_failure(&project_id, &path) {
                    info!(path = %path.display(), "File will be retried on its next change");
                }
            }
        }
        self.write_status().await;
    }

    async fn write_status(&mut self) {
        let Some(path) = self.options.status_path.clone() else {
            return;
        };
        self.stats.updated_at = Some(Utc::now());
        if let Err(err) = self.stats.write_to(&path).await {
            warn!(path = %path.display(), error = %err, "Failed to write status file");
        }
    }
}

async fn is_dir(path: &Path) -> bool {
    fs::metadata(path).await.map(|meta| meta.is_dir()).unwrap_or(false)
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path).await.map(|meta| meta.is_file()).unwrap_or(false)
}
