use std::path::{Path, PathBuf};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use rustc_hash::FxHashSet;

/// Watch-root consistency manager.
///
/// - Recursive roots (the page source tree) are attached at startup and
///   re-attached when removed and recreated.
/// - Single files outside every root are attached on request, as the build
///   discovers that pages read them.
pub(super) struct WatchRoots {
    roots: Vec<PathBuf>,
    files: Vec<PathBuf>,
    attached: FxHashSet<PathBuf>,
}

impl WatchRoots {
    pub(super) fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            files: Vec::new(),
            attached: FxHashSet::default(),
        }
    }

    pub(super) fn attach_existing(&mut self, watcher: &mut RecommendedWatcher) -> notify::Result<()> {
        for path in &self.roots {
            if !path.exists() {
                continue;
            }
            watcher.watch(path, RecursiveMode::Recursive)?;
            self.attached.insert(path.clone());
        }
        Ok(())
    }

    /// Whether a recursive root already delivers events for `path`.
    pub(super) fn covers(&self, path: &Path) -> bool {
        self.roots.iter().any(|root| path.starts_with(root))
    }

    /// Start observing a single file. No-op when already covered.
    pub(super) fn add_file(&mut self, path: PathBuf, watcher: &mut RecommendedWatcher) {
        if self.covers(&path) || self.files.contains(&path) {
            return;
        }
        if path.exists() && watcher.watch(&path, RecursiveMode::NonRecursive).is_ok() {
            self.attached.insert(path.clone());
        }
        crate::debug!("watch"; "observe {}", path.display());
        self.files.push(path);
    }

    pub(super) fn maintain(&mut self, watcher: &mut RecommendedWatcher) {
        // Drop stale handles for paths that no longer exist.
        self.attached.retain(|path| path.exists());

        for (path, mode) in self
            .roots
            .iter()
            .map(|p| (p, RecursiveMode::Recursive))
            .chain(self.files.iter().map(|p| (p, RecursiveMode::NonRecursive)))
        {
            if self.attached.contains(path) || !path.exists() {
                continue;
            }
            if watcher.watch(path, mode).is_ok() {
                self.attached.insert(path.clone());
                crate::debug!("watch"; "re-attached watch: {}", path.display());
            }
        }
    }
}
