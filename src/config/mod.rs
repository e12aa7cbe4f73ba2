//! Project configuration management for `weft.toml`.
//!
//! ```text
//! config/
//! ├── section.rs   # [build], [build.cache], [dev]
//! ├── page.rs      # per-page `<route>-config.{toml,json}`
//! ├── error.rs     # ConfigError
//! └── util.rs      # config file discovery
//! ```
//!
//! Configuration errors are fatal: they surface before any build starts.

mod error;
mod page;
mod section;
mod util;

pub use error::ConfigError;
pub use page::PageConfig;
pub use section::{BuildConfig, DevConfig};

use crate::cli::{BuildArgs, Cli};
use crate::log;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use util::find_config_file;

/// Root configuration structure representing `weft.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Absolute path to the config file
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory (parent of the config file)
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub dev: DevConfig,
}

impl SiteConfig {
    /// Load, normalize and validate configuration for a CLI invocation.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let config_path =
            find_config_file(&cli.config).ok_or_else(|| ConfigError::NotFound(cli.config.clone()))?;

        let mut config = Self::from_path(&config_path)?;
        config.config_path = crate::utils::path::normalize_path(&config_path);
        let root = config
            .config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        config.apply_build_args(cli.command.build_args());
        config.normalize_paths(&root);
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string (no normalization).
    #[cfg(test)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let (config, ignored) = Self::parse_with_ignored(content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, Path::new("weft.toml"));
        }
        Ok(config)
    }

    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }
        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "ignoring unknown fields in {}: {}", display_path, fields.join(", "));
    }

    pub fn get_root(&self) -> &Path {
        &self.root
    }

    pub fn set_root(&mut self, path: &Path) {
        self.root = path.to_path_buf();
    }

    /// Path relative to the project root, for display.
    pub fn root_relative(&self, path: impl AsRef<Path>) -> PathBuf {
        path.as_ref()
            .strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.as_ref().to_path_buf())
    }

    // ========================================================================
    // CLI overrides
    // ========================================================================

    fn apply_build_args(&mut self, args: &BuildArgs) {
        crate::logger::set_verbose(args.verbose);

        Self::update_option(&mut self.build.source, args.source.as_ref());
        Self::update_option(&mut self.build.output, args.output.as_ref());
        Self::update_option(&mut self.build.workers, args.workers.as_ref());
        Self::update_option(&mut self.build.minify, args.minify.as_ref());
    }

    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    // ========================================================================
    // Normalization and validation
    // ========================================================================

    /// Resolve every configured path against the project root.
    pub fn normalize_paths(&mut self, root: &Path) {
        use crate::utils::path::normalize_path;

        let root = normalize_path(root);
        self.build.source = normalize_path(&root.join(&self.build.source));
        self.build.output = normalize_path(&root.join(&self.build.output));
        if let Some(styles) = self.build.global_styles.take() {
            self.build.global_styles = Some(normalize_path(&root.join(styles)));
        }
        self.set_root(&root);
    }

    /// Collect every problem, then fail once with all of them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();
        self.build.validate(&mut problems);
        self.dev.validate(&mut problems);

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(problems))
        }
    }

    /// Cache directory for persisted diagnostics.
    pub fn cache_dir(&self) -> PathBuf {
        self.root.join(crate::cache::CACHE_DIR)
    }
}

/// Parse config and fail on unknown fields (catches typos in tests).
#[cfg(test)]
pub fn test_parse_config(content: &str) -> SiteConfig {
    let (parsed, ignored) = SiteConfig::parse_with_ignored(content).unwrap();
    assert!(ignored.is_empty(), "test config has unknown fields: {ignored:?}");
    parsed
}
