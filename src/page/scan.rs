//! Initial source-tree scan.

use std::path::PathBuf;

use jwalk::WalkDir;

use super::PageRegistry;
use crate::config::{ConfigError, SiteConfig};
use crate::utils::path::normalize_path;

/// Walk `build.source` and register every page source file.
///
/// A page with a client or config file but no markup file is a
/// configuration error here; in dev mode the same situation later only
/// aborts that page.
pub fn scan_sources(config: &SiteConfig) -> Result<PageRegistry, ConfigError> {
    let source = &config.build.source;
    let mut registry = PageRegistry::new(source, &config.build.output);

    let mut files: Vec<PathBuf> = WalkDir::new(source)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| normalize_path(&e.path()))
        .collect();
    files.sort();

    for file in &files {
        registry.add_file(file);
    }

    if let Some(page) = registry.missing_markup().first() {
        return Err(ConfigError::Page {
            route: page.route.clone(),
            message: format!(
                "has no `{}-html.*` markup source",
                page.route.rsplit('/').next().unwrap_or(&page.route)
            ),
        });
    }

    crate::debug!("scan"; "{} pages in {}", registry.len(), source.display());
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn site(files: &[&str]) -> (TempDir, SiteConfig) {
        let dir = TempDir::new().unwrap();
        let root = normalize_path(dir.path());
        for file in files {
            let path = root.join("src").join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, "").unwrap();
        }
        fs::create_dir_all(root.join("src")).unwrap();

        let mut config = SiteConfig::default();
        config.build.source = root.join("src");
        config.build.output = root.join("public");
        (dir, config)
    }

    #[test]
    fn test_scan_finds_pages() {
        let (_dir, config) = site(&[
            "index-html.html",
            "index-client.js",
            "blog/post-html.html",
            "blog/post-config.toml",
            "lib/util.js",
        ]);
        let registry = scan_sources(&config).unwrap();
        let uris: Vec<_> = registry.uris().iter().map(|u| u.to_string()).collect();
        assert_eq!(uris, vec!["/", "/blog/post"]);
    }

    #[test]
    fn test_scan_rejects_page_without_markup() {
        let (_dir, config) = site(&["index-html.html", "about-client.js"]);
        let err = scan_sources(&config).unwrap_err();
        assert!(matches!(err, ConfigError::Page { ref route, .. } if route == "about"));
    }
}
