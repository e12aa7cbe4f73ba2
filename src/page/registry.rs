//! Page registry keyed by URI, with a reverse index from source files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

use super::Page;
use crate::core::{PageFile, UrlPath};
use crate::utils::path::{is_ignored_file, normalize_path, relative_slash};

/// Result of removing a page source file.
#[derive(Debug)]
pub enum Removal {
    /// The page lost one source and still exists.
    Updated(UrlPath),
    /// The last source is gone; the page was dropped.
    Forgotten(Page),
}

/// Paths are stored normalized, so a source root reached through a symlink
/// matches the paths the watcher reports.
#[derive(Debug)]
pub struct PageRegistry {
    source_root: PathBuf,
    output_root: PathBuf,
    pages: BTreeMap<UrlPath, Page>,
    by_file: FxHashMap<PathBuf, UrlPath>,
}

impl PageRegistry {
    pub fn new(source_root: &Path, output_root: &Path) -> Self {
        Self {
            source_root: normalize_path(source_root),
            output_root: output_root.to_path_buf(),
            pages: BTreeMap::new(),
            by_file: FxHashMap::default(),
        }
    }

    /// Match `path` against the page naming convention.
    pub fn classify(&self, path: &Path) -> Option<PageFile> {
        if is_ignored_file(path) {
            return None;
        }
        let rel = relative_slash(&normalize_path(path), &self.source_root)?;
        PageFile::parse(&rel)
    }

    /// Register a page source file. Returns the owning page, created if new.
    pub fn add_file(&mut self, path: &Path) -> Option<UrlPath> {
        let path = normalize_path(path);
        let file = self.classify(&path)?;
        let uri = UrlPath::from_route(&file.route);
        let output_root = &self.output_root;
        let page = self
            .pages
            .entry(uri.clone())
            .or_insert_with(|| Page::new(&file.route, output_root));
        crate::debug!("page"; "{} {} source: {}", uri, file.kind.label(), path.display());
        page.set_source(file.kind, path.clone());
        self.by_file.insert(path, uri.clone());
        Some(uri)
    }

    /// Unregister a page source file, forgetting the page with its last source.
    pub fn remove_file(&mut self, path: &Path) -> Option<Removal> {
        let path = normalize_path(path);
        let uri = self.by_file.remove(&path)?;
        let file = self.classify(&path)?;
        let page = self.pages.get_mut(&uri)?;
        page.clear_source(file.kind);
        if page.is_orphan() {
            return self.pages.remove(&uri).map(Removal::Forgotten);
        }
        Some(Removal::Updated(uri))
    }

    pub fn get(&self, uri: &UrlPath) -> Option<&Page> {
        self.pages.get(uri)
    }

    pub fn get_mut(&mut self, uri: &UrlPath) -> Option<&mut Page> {
        self.pages.get_mut(uri)
    }

    pub fn uris(&self) -> Vec<UrlPath> {
        self.pages.keys().cloned().collect()
    }

    /// Pages that cannot build: no markup source.
    pub fn missing_markup(&self) -> Vec<&Page> {
        self.pages.values().filter(|p| p.markup.is_none()).collect()
    }

    /// Pages whose latest build failed, with the build number it failed in.
    pub fn failing(&self) -> Vec<(&UrlPath, u64)> {
        self.pages
            .values()
            .filter(|p| p.current.failed)
            .map(|p| (&p.uri, p.current.build))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}
