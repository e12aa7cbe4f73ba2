//! Pages: the stable rebuild keys of the engine.
//!
//! A page is identified by its URI path and exists while at least one of its
//! three source files (client, markup, config) exists.

mod registry;
mod scan;

pub use registry::{PageRegistry, Removal};
pub use scan::scan_sources;

use std::path::{Path, PathBuf};

use crate::core::{PageFile, PageFileKind, UrlPath};

/// Outcome of the page's latest build.
#[derive(Debug, Clone, Default)]
pub struct BuildRecord {
    /// Build number, 0 before the first build.
    pub build: u64,
    pub failed: bool,
    /// Files written for this page.
    pub outputs: Vec<PathBuf>,
    /// Scoped style classes emitted into the page.
    pub classes: usize,
}

#[derive(Debug, Clone)]
pub struct Page {
    pub uri: UrlPath,
    pub route: String,
    pub output_dir: PathBuf,
    /// `<name>.html`
    pub output_file: String,
    pub client: Option<PathBuf>,
    pub markup: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub current: BuildRecord,
}

impl Page {
    pub fn new(route: &str, output_root: &Path) -> Self {
        let (output_dir, output_file) = PageFile::output_location(route, output_root);
        Self {
            uri: UrlPath::from_route(route),
            route: route.to_string(),
            output_dir,
            output_file,
            client: None,
            markup: None,
            config: None,
            current: BuildRecord::default(),
        }
    }

    #[cfg(test)]
    pub fn source(&self, kind: PageFileKind) -> Option<&Path> {
        match kind {
            PageFileKind::Client => self.client.as_deref(),
            PageFileKind::Markup => self.markup.as_deref(),
            PageFileKind::Config => self.config.as_deref(),
        }
    }

    fn slot(&mut self, kind: PageFileKind) -> &mut Option<PathBuf> {
        match kind {
            PageFileKind::Client => &mut self.client,
            PageFileKind::Markup => &mut self.markup,
            PageFileKind::Config => &mut self.config,
        }
    }

    pub fn set_source(&mut self, kind: PageFileKind, path: PathBuf) {
        *self.slot(kind) = Some(path);
    }

    pub fn clear_source(&mut self, kind: PageFileKind) {
        *self.slot(kind) = None;
    }

    /// No source file left: the page should be forgotten.
    pub fn is_orphan(&self) -> bool {
        self.client.is_none() && self.markup.is_none() && self.config.is_none()
    }

    pub fn output_markup(&self) -> PathBuf {
        self.output_dir.join(&self.output_file)
    }

    /// Sibling `<name>.js` referenced from the page markup.
    pub fn script_name(&self) -> String {
        let stem = self.output_file.trim_end_matches(".html");
        format!("{stem}.js")
    }

    pub fn output_script(&self) -> PathBuf {
        self.output_dir.join(self.script_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_outputs() {
        let page = Page::new("blog/index", Path::new("/out"));
        assert_eq!(page.uri.as_str(), "/blog/");
        assert_eq!(page.output_markup(), PathBuf::from("/out/blog/index.html"));
        assert_eq!(page.output_script(), PathBuf::from("/out/blog/index.js"));
        assert_eq!(page.script_name(), "index.js");
    }

    #[test]
    fn test_page_sources() {
        let mut page = Page::new("about", Path::new("/out"));
        assert!(page.is_orphan());

        page.set_source(PageFileKind::Markup, "/src/about-html.html".into());
        assert_eq!(
            page.source(PageFileKind::Markup),
            Some(Path::new("/src/about-html.html"))
        );
        assert!(!page.is_orphan());

        page.clear_source(PageFileKind::Markup);
        assert!(page.is_orphan());
    }
}
