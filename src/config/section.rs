//! `[build]` and `[dev]` sections.
//!
//! ```toml
//! [build]
//! source = "src"
//! output = "public"
//! global_styles = "styles/global.css"
//! minify = true
//! workers = 2
//!
//! [build.cache]
//! transform_capacity = 1024
//! canonical_capacity = 4096
//!
//! [dev]
//! debounce_ms = 100
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Page source tree.
    pub source: PathBuf,
    /// Output root.
    pub output: PathBuf,
    /// Hand-authored stylesheet emitted ahead of every page's scoped styles.
    /// Its class names are never allocated to scoped styles.
    pub global_styles: Option<PathBuf>,
    /// Minify client scripts in production builds.
    pub minify: bool,
    /// Render worker pool size.
    pub workers: usize,
    pub cache: CacheConfig,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            source: "src".into(),
            output: "public".into(),
            global_styles: None,
            minify: true,
            workers: 2,
            cache: CacheConfig::default(),
        }
    }
}

impl BuildConfig {
    pub fn validate(&self, problems: &mut Vec<String>) {
        if self.workers == 0 {
            problems.push("build.workers must be at least 1".into());
        }
        if !self.source.is_dir() {
            problems.push(format!(
                "build.source `{}` is not a directory",
                self.source.display()
            ));
        }
        if self.output == self.source || self.output.starts_with(&self.source) {
            problems.push(format!(
                "build.output `{}` must not be inside build.source",
                self.output.display()
            ));
        }
        if let Some(styles) = &self.global_styles
            && !styles.is_file()
        {
            problems.push(format!(
                "build.global_styles `{}` not found",
                styles.display()
            ));
        }
        self.cache.validate(problems);
    }
}

/// Bounded cache capacities (entries).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub transform_capacity: usize,
    pub canonical_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            transform_capacity: 1024,
            canonical_capacity: 4096,
        }
    }
}

impl CacheConfig {
    fn validate(&self, problems: &mut Vec<String>) {
        if self.transform_capacity == 0 || self.canonical_capacity == 0 {
            problems.push("build.cache capacities must be greater than 0".into());
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DevConfig {
    /// Quiet period before a batch of filesystem events is processed.
    pub debounce_ms: u64,
}

impl Default for DevConfig {
    fn default() -> Self {
        Self { debounce_ms: 100 }
    }
}

impl DevConfig {
    pub fn validate(&self, problems: &mut Vec<String>) {
        if self.debounce_ms > 10_000 {
            problems.push("dev.debounce_ms must be at most 10000".into());
        }
    }
}
