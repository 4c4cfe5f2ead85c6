//! Folder watching with quiescence gating.
//!
//! Each [`FolderWatcher`] owns one non-recursive `notify` watcher and a task that
//! turns raw notifications into [`WatchEvent`]s. A new image is only reported once
//! its size and modification time have stopped changing for the stability window,
//! so half-written files never reach the uploader.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use chrono::{DateTime, Utc};
use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::fs;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::server_client::{has_supported_extension, is_hidden};
use crate::types::SyncError;

/// Timing and filtering knobs for a watcher.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub stability_window: Duration,
    pub stability_poll: Duration,
    pub debounce_delay: Duration,
    pub supported_formats: Vec<String>,
}

impl From<&Settings> for WatchOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            stability_window: settings.stability_window(),
            stability_poll: settings.stability_poll(),
            debounce_delay: settings.debounce_delay(),
            supported_formats: settings.supported_formats.clone(),
        }
    }
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A new image appeared and has stopped changing.
    FileAdded {
        project_id: String,
        path: PathBuf,
        detected_at: DateTime<Utc>,
    },
    /// The watcher can no longer observe its folder.
    Failed {
        project_id: String,
        folder_path: PathBuf,
        error: String,
    },
}

struct WatchContext {
    project_id: String,
    folder_path: PathBuf,
    /// Canonical form, as reported by some backends.
    canonical_path: PathBuf,
    options: WatchOptions,
    events: mpsc::UnboundedSender<WatchEvent>,
}

impl WatchContext {
    fn is_root(&self, path: &Path) -> bool {
        path == self.folder_path || path == self.canonical_path
    }

    fn in_folder(&self, path: &Path) -> bool {
        path.parent()
            .map(|parent| self.is_root(parent))
            .unwrap_or(false)
    }

    fn report_failure(&self, error: String) {
        let _ = self.events.send(WatchEvent::Failed {
            project_id: self.project_id.clone(),
            folder_path: self.folder_path.clone(),
            error,
        });
    }
}

/// Watches one folder for new image files.
pub struct FolderWatcher {
    project_id: String,
    folder_path: PathBuf,
    watcher: Option<RecommendedWatcher>,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for FolderWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FolderWatcher")
            .field("project_id", &self.project_id)
            .field("folder_path", &self.folder_path)
            .field("open", &self.is_open())
            .finish()
    }
}

impl FolderWatcher {
    /// Start watching `folder_path`. Fails without side effects when the
    /// folder is missing or the OS watch cannot be installed.
    pub fn start(
        project_id: impl Into<String>,
        folder_path: &Path,
        options: WatchOptions,
        events: mpsc::UnboundedSender<WatchEvent>,
    ) -> Result<Self, SyncError> {
        let project_id = project_id.into();
        if !folder_path.is_dir() {
            return Err(SyncError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("folder does not exist: {}", folder_path.display()),
            )));
        }

        let (raw_tx, raw_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = raw_tx.send(res);
        })?;
        watcher.watch(folder_path, RecursiveMode::NonRecursive)?;

        let context = Arc::new(WatchContext {
            project_id: project_id.clone(),
            folder_path: folder_path.to_path_buf(),
            canonical_path: std::fs::canonicalize(folder_path)
                .unwrap_or_else(|_| folder_path.to_path_buf()),
            options,
            events,
        });
        let task = tokio::spawn(run_event_loop(context, raw_rx));

        info!(project = %project_id, path = %folder_path.display(), "Watching folder");
        Ok(Self {
            project_id,
            folder_path: folder_path.to_path_buf(),
            watcher: Some(watcher),
            task,
        })
    }

    pub fn is_open(&self) -> bool {
        self.watcher.is_some() && !self.task.is_finished()
    }

    /// Release the OS watch and stop any stabilization still running.
    pub fn close(mut self) {
        self.shutdown();
        debug!(project = %self.project_id, path = %self.folder_path.display(), "Closed watcher");
    }

    fn shutdown(&mut self) {
        self.watcher.take();
        self.task.abort();
    }
}

impl Drop for FolderWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_event_loop(
    context: Arc<WatchContext>,
    mut raw_rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
) {
    // Dropping the set aborts stabilizations still in progress.
    let mut stabilizing: JoinSet<PathBuf> = JoinSet::new();
    let mut pending: HashSet<PathBuf> = HashSet::new();

    loop {
        tokio::select! {
            raw = raw_rx.recv() => {
                let Some(raw) = raw else { break };
                let event = match raw {
                    Ok(event) => event,
                    Err(err) => {
                        warn!(project = %context.project_id, error = %err, "Watcher reported an error");
                        context.report_failure(err.to_string());
                        break;
                    }
                };

                if root_removed(&context, &event) {
                    warn!(
                        project = %context.project_id,
                        path = %context.folder_path.display(),
                        "Watched folder disappeared"
                    );
                    context.report_failure("watched folder was removed".to_string());
                    break;
                }

                for path in candidate_paths(&context, &event) {
                    if !pending.insert(path.clone()) {
                        continue;
                    }
                    debug!(project = %context.project_id, path = %path.display(), "New file, waiting for writes to settle");
                    stabilizing.spawn(stabilize_and_emit(context.clone(), path, Utc::now()));
                }
            }
            Some(done) = stabilizing.join_next(), if !stabilizing.is_empty() => {
                if let Ok(path) = done {
                    pending.remove(&path);
                }
            }
        }
    }
}

fn root_removed(context: &WatchContext, event: &Event) -> bool {
    let touches_root = matches!(
        event.kind,
        EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_))
    ) && event.paths.iter().any(|path| context.is_root(path));
    touches_root && !context.folder_path.exists()
}

/// Paths that newly appeared in the folder and look like uploadable images.
fn candidate_paths(context: &WatchContext, event: &Event) -> Vec<PathBuf> {
    let appeared: Vec<&PathBuf> = match event.kind {
        EventKind::Create(CreateKind::File)
        | EventKind::Create(CreateKind::Any)
        | EventKind::Create(CreateKind::Other) => event.paths.iter().collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event.paths.iter().collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            event.paths.last().into_iter().collect()
        }
        _ => Vec::new(),
    };

    appeared
        .into_iter()
        .filter(|path| context.in_folder(path))
        .filter(|path| !is_hidden(path))
        .filter(|path| has_supported_extension(path, &context.options.supported_formats))
        // report under the configured folder, not the backend's canonical form
        .filter_map(|path| path.file_name().map(|name| context.folder_path.join(name)))
        .collect()
}

async fn stabilize_and_emit(
    context: Arc<WatchContext>,
    path: PathBuf,
    detected_at: DateTime<Utc>,
) -> PathBuf {
    let options = &context.options;
    match wait_until_stable(&path, options.stability_window, options.stability_poll).await {
        Ok(true) => {
            if !options.debounce_delay.is_zero() {
                tokio::time::sleep(options.debounce_delay).await;
            }
            if fs::metadata(&path).await.is_ok() {
                let _ = context.events.send(WatchEvent::FileAdded {
                    project_id: context.project_id.clone(),
                    path: path.clone(),
                    detected_at,
                });
            }
        }
        Ok(false) => {
            debug!(path = %path.display(), "File vanished before it settled");
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Could not inspect new file");
        }
    }
    path
}

/// Wait until `(len, mtime)` of `path` stays unchanged for `window`, sampling
/// every `poll`. Returns false when the path disappears or is not a file.
pub async fn wait_until_stable(path: &Path, window: Duration, poll: Duration) -> io::Result<bool> {
    let Some(mut last) = file_fingerprint(path).await? else {
        return Ok(false);
    };
    let mut stable_since = Instant::now();

    loop {
        if stable_since.elapsed() >= window {
            return Ok(true);
        }
        tokio::time::sleep(poll).await;

        let Some(current) = file_fingerprint(path).await? else {
            return Ok(false);
        };
        if current != last {
            last = current;
            stable_since = Instant::now();
        }
    }
}

async fn file_fingerprint(path: &Path) -> io::Result<Option<(u64, Option<SystemTime>)>> {
    match fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(Some((meta.len(), meta.modified().ok()))),
        Ok(_) => Ok(None),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}
