//! Page file naming convention and page URI paths.
//!
//! A source tree contains `<route>-client.<ext>`, `<route>-html.<ext>` and
//! `<route>-config.<ext>` files. `<route>` is the slash-separated path
//! relative to the source root, e.g. `blog/index-html.html` has route
//! `blog/index`, URI `/blog/` and output file `blog/index.html`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Decoded page URI path. Always starts with `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UrlPath(Arc<str>);

impl UrlPath {
    /// `/` + route, with a trailing `index` segment collapsed.
    pub fn from_route(route: &str) -> Self {
        let route = route.trim_matches('/');
        if route == "index" || route.is_empty() {
            return Self(Arc::from("/"));
        }
        match route.strip_suffix("/index") {
            Some(dir) => Self(Arc::from(format!("/{dir}/"))),
            None => Self(Arc::from(format!("/{route}"))),
        }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UrlPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for UrlPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Which of the three page source roles a file plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageFileKind {
    Client,
    Markup,
    Config,
}

impl PageFileKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Markup => "html",
            Self::Config => "config",
        }
    }
}

/// A source file recognised by the page naming convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFile {
    pub route: String,
    pub kind: PageFileKind,
}

impl PageFile {
    /// Match `rel` (slash-separated, relative to the source root).
    pub fn parse(rel: &str) -> Option<Self> {
        let (dir, name) = match rel.rsplit_once('/') {
            Some((dir, name)) => (Some(dir), name),
            None => (None, rel),
        };
        let (stem, ext) = name.rsplit_once('.')?;
        if ext.is_empty() {
            return None;
        }

        let (base, kind) = [
            ("-client", PageFileKind::Client),
            ("-html", PageFileKind::Markup),
            ("-config", PageFileKind::Config),
        ]
        .into_iter()
        .find_map(|(suffix, kind)| stem.strip_suffix(suffix).map(|base| (base, kind)))?;

        if base.is_empty() {
            return None;
        }

        let route = match dir {
            Some(dir) if !dir.is_empty() => format!("{dir}/{base}"),
            _ => base.to_string(),
        };
        Some(Self { route, kind })
    }

    /// Output location of a route's markup: (directory, file name).
    pub fn output_location(route: &str, output_root: &Path) -> (PathBuf, String) {
        let (dir, name) = match route.rsplit_once('/') {
            Some((dir, name)) => (output_root.join(dir), name),
            None => (output_root.to_path_buf(), route),
        };
        (dir, format!("{name}.html"))
    }
}
