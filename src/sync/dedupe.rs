use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::debug;

/// What happens to an admitted file whose upload failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Keep the pair admitted; the file is not uploaded again this process.
    #[default]
    Retain,
    /// Forget the pair so a later watcher event may retry, at most `max_retries` times.
    Evict { max_retries: u32 },
}

/// Per-project set of paths already admitted for upload.
///
/// Owned by the orchestrator's event loop, so admission needs no locking.
#[derive(Debug, Default)]
pub struct DedupeTracker {
    policy: FailurePolicy,
    processed: HashMap<String, HashSet<PathBuf>>,
    retries: HashMap<(String, PathBuf), u32>,
}

impl DedupeTracker {
    pub fn new(policy: FailurePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// True exactly once per (project, path) until the pair is evicted.
    pub fn admit(&mut self, project_id: &str, file_path: &Path) -> bool {
        self.processed
            .entry(project_id.to_string())
            .or_default()
            .insert(file_path.to_path_buf())
    }

    pub fn is_admitted(&self, project_id: &str, file_path: &Path) -> bool {
        self.processed
            .get(project_id)
            .map(|paths| paths.contains(file_path))
            .unwrap_or(false)
    }

    /// Apply the failure policy after an upload failed. Returns true when the
    /// pair was evicted and may be admitted again.
    pub fn record_failure(&mut self, project_id: &str, file_path: &Path) -> bool {
        let FailurePolicy::Evict { max_retries } = self.policy else {
            return false;
        };

        let attempts = self
            .retries
            .entry((project_id.to_string(), file_path.to_path_buf()))
            .or_insert(0);
        if *attempts >= max_retries {
            debug!(
                project = %project_id,
                path = %file_path.display(),
                "Retry budget exhausted, keeping file admitted"
            );
            return false;
        }
        *attempts += 1;

        if let Some(paths) = self.processed.get_mut(project_id) {
            paths.remove(file_path);
        }
        true
    }

    pub fn len(&self) -> usize {
        self.processed.values().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.processed.clear();
        self.retries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_each_pair_once() {
        let mut tracker = DedupeTracker::default();
        let path = Path::new("/photos/a.jpg");

        assert!(tracker.admit("p1", path));
        assert!(!tracker.admit("p1", path));
        assert!(!tracker.admit("p1", path));
        // same path under another project is a different pair
        assert!(tracker.admit("p2", path));
        assert!(tracker.admit("p1", Path::new("/photos/b.jpg")));
        assert_eq!(tracker.len(), 3);
    }

    #[test]
    fn retain_policy_never_evicts() {
        let mut tracker = DedupeTracker::new(FailurePolicy::Retain);
        let path = Path::new("/photos/a.jpg");
        assert!(tracker.admit("p1", path));
        assert!(!tracker.record_failure("p1", path));
        assert!(tracker.is_admitted("p1", path));
        assert!(!tracker.admit("p1", path));
    }

    #[test]
    fn evict_policy_allows_bounded_retries() {
        let mut tracker = DedupeTracker::new(FailurePolicy::Evict { max_retries: 2 });
        let path = Path::new("/photos/a.jpg");

        assert!(tracker.admit("p1", path));
        assert!(tracker.record_failure("p1", path));
        assert!(tracker.admit("p1", path));
        assert!(tracker.record_failure("p1", path));
        assert!(tracker.admit("p1", path));
        // budget spent: stays admitted
        assert!(!tracker.record_failure("p1", path));
        assert!(!tracker.admit("p1", path));
    }

    #[test]
    fn clear_releases_everything() {
        let mut tracker = DedupeTracker::default();
        tracker.admit("p1", Path::new("/a.jpg"));
        tracker.clear();
        assert!(tracker.is_empty());
        assert!(tracker.admit("p1", Path::new("/a.jpg")));
    }
}
