//! Watch graph: which pages depend on which files.
//!
//! Bidirectional mapping between source files and the pages that read them
//! during their latest build. A page is detached from every file at the start
//! of its rebuild and re-attached, stage by stage, to the files it actually
//! reads. A file the page stopped importing therefore stops triggering it.
//!
//! # Invariants
//! - Forward and reverse mappings are always consistent
//! - Paths are normalized for reliable matching
//! - Every path ever attached has been handed to the observer exactly once

use rustc_hash::{FxHashMap, FxHashSet};
use std::path::{Path, PathBuf};

use crate::core::UrlPath;
use crate::utils::path::normalize_path;

type PageSet = FxHashSet<UrlPath>;
type PathSet = FxHashSet<PathBuf>;

/// Filesystem observation primitive used by the graph.
///
/// `observe` is called once per path, on its first attachment.
pub trait Observer: Send {
    fn observe(&mut self, path: &Path);
}

/// Observer that watches nothing (one-shot builds).
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn observe(&mut self, _path: &Path) {}
}

pub struct WatchGraph {
    /// Forward: page → files it read in its latest build
    forward: FxHashMap<UrlPath, PathSet>,
    /// Reverse: file → pages that read it
    reverse: FxHashMap<PathBuf, PageSet>,
    /// Every path handed to the observer.
    observed: PathSet,
    observer: Box<dyn Observer>,
}

impl WatchGraph {
    pub fn new(observer: Box<dyn Observer>) -> Self {
        Self {
            forward: FxHashMap::default(),
            reverse: FxHashMap::default(),
            observed: PathSet::default(),
            observer,
        }
    }

    /// Record that `page` read `path`. Idempotent.
    pub fn attach(&mut self, path: &Path, page: &UrlPath) {
        let path = normalize_path(path);

        if self.observed.insert(path.clone()) {
            crate::debug!("watch"; "observing {}", path.display());
            self.observer.observe(&path);
        }

        self.reverse
            .entry(path.clone())
            .or_default()
            .insert(page.clone());
        self.forward.entry(page.clone()).or_default().insert(path);
    }

    /// Disconnect `page` from every file. Run before its pipeline starts.
    pub fn detach_all(&mut self, page: &UrlPath) {
        let Some(old) = self.forward.remove(page) else {
            return;
        };

        for path in old {
            if let Some(dependents) = self.reverse.get_mut(&path) {
                dependents.remove(page);
                if dependents.is_empty() {
                    self.reverse.remove(&path);
                }
            }
        }
    }

    /// Pages that read `path` during their latest build, sorted.
    pub fn resolve_affected(&self, path: &Path) -> Vec<UrlPath> {
        let path = normalize_path(path);
        let mut pages: Vec<_> = self
            .reverse
            .get(&path)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        pages.sort();
        pages
    }

    /// Files `page` read during its latest build.
    #[cfg(test)]
    pub fn dependencies(&self, page: &UrlPath) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self
            .forward
            .get(page)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        paths.sort();
        paths
    }

    /// Number of files with at least one dependent page.
    pub fn watched_count(&self) -> usize {
        self.reverse.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Records every observed path.
    #[derive(Clone, Default)]
    struct Recording(Arc<Mutex<Vec<PathBuf>>>);

    impl Observer for Recording {
        fn observe(&mut self, path: &Path) {
            self.0.lock().push(path.to_path_buf());
        }
    }

    fn page(route: &str) -> UrlPath {
        UrlPath::from_route(route)
    }

    fn path(s: &str) -> PathBuf {
        PathBuf::from(s)
    }

    fn graph() -> (WatchGraph, Recording) {
        let recording = Recording::default();
        (WatchGraph::new(Box::new(recording.clone())), recording)
    }

    mod attach {
        use super::*;

        #[test]
        fn new_graph_is_empty() {
            let (graph, _) = graph();
            assert!(graph.resolve_affected(&path("/any.js")).is_empty());
            assert_eq!(graph.watched_count(), 0);
        }

        #[test]
        fn attach_is_idempotent() {
            let (mut graph, observed) = graph();
            let p = page("about");
            graph.attach(&path("/site/src/about-html.html"), &p);
            graph.attach(&path("/site/src/about-html.html"), &p);

            assert_eq!(graph.resolve_affected(&path("/site/src/about-html.html")), vec![p.clone()]);
            assert_eq!(graph.dependencies(&p).len(), 1);
            assert_eq!(observed.0.lock().len(), 1);
        }

        #[test]
        fn first_attachment_starts_observation_once() {
            let (mut graph, observed) = graph();
            let shared = path("/site/lib/shared.js");
            graph.attach(&shared, &page("a"));
            graph.attach(&shared, &page("b"));
            graph.detach_all(&page("a"));
            graph.detach_all(&page("b"));
            graph.attach(&shared, &page("a"));

            assert_eq!(*observed.0.lock(), vec![shared]);
        }

        #[test]
        fn shared_dependency_affects_all_readers() {
            let (mut graph, _) = graph();
            let shared = path("/site/lib/nav.html");
            graph.attach(&shared, &page("a"));
            graph.attach(&shared, &page("index"));

            assert_eq!(graph.resolve_affected(&shared), vec![page("index"), page("a")]);
        }
    }

    mod invalidation {
        use super::*;

        #[test]
        fn change_affects_only_readers() {
            let (mut graph, _) = graph();
            let p1 = page("one");
            let p2 = page("two");
            graph.attach(&path("/site/a.js"), &p1);
            graph.attach(&path("/site/b.js"), &p2);

            assert_eq!(graph.resolve_affected(&path("/site/a.js")), vec![p1]);
        }

        #[test]
        fn detach_all_drops_stale_dependencies() {
            let (mut graph, _) = graph();
            let p = page("index");
            let dropped = path("/site/old.js");
            let kept = path("/site/kept.js");

            // build N reads both files
            graph.attach(&dropped, &p);
            graph.attach(&kept, &p);

            // build N+1 only reads `kept`
            graph.detach_all(&p);
            graph.attach(&kept, &p);

            assert!(graph.resolve_affected(&dropped).is_empty());
            assert_eq!(graph.resolve_affected(&kept), vec![p.clone()]);
            assert_eq!(graph.dependencies(&p), vec![kept]);
        }

        #[test]
        fn detach_unknown_page_is_noop() {
            let (mut graph, _) = graph();
            graph.detach_all(&page("ghost"));
            assert_eq!(graph.watched_count(), 0);
        }

        #[test]
        fn detach_keeps_other_pages() {
            let (mut graph, _) = graph();
            let shared = path("/site/shared.css");
            graph.attach(&shared, &page("a"));
            graph.attach(&shared, &page("b"));
            graph.detach_all(&page("a"));

            assert_eq!(graph.resolve_affected(&shared), vec![page("b")]);
        }
    }
}
