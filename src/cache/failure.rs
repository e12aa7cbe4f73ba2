//! Build diagnostics (page errors and style warnings) persistence.
//!
//! The error set of the latest build is written to `.weft/diagnostics.json`
//! so a later `weft build` or editor integration can show what failed
//! without rebuilding.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::CACHE_DIR;

/// Diagnostics state file name
const DIAGNOSTICS_FILE: &str = "diagnostics.json";

/// A single persisted page error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedError {
    pub uri: String,
    pub stage: String,
    pub error: String,
}

impl PersistedError {
    pub fn new(uri: impl Into<String>, stage: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            stage: stage.into(),
            error: error.into(),
        }
    }
}

/// A single persisted style warning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedWarning {
    pub uri: String,
    pub warning: String,
}

/// Errors and warnings of the latest build, keyed by page URI.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PersistedDiagnostics {
    errors: Vec<PersistedError>,
    warnings: Vec<PersistedWarning>,
}

impl PersistedDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an error, replacing any existing error for the same page.
    pub fn push_error(&mut self, error: PersistedError) {
        self.errors.retain(|e| e.uri != error.uri);
        self.errors.push(error);
    }

    /// Replace the warnings recorded for a page.
    pub fn set_warnings(&mut self, uri: &str, warnings: &[String]) {
        self.warnings.retain(|w| w.uri != uri);
        self.warnings
            .extend(warnings.iter().map(|warning| PersistedWarning {
                uri: uri.to_string(),
                warning: warning.clone(),
            }));
    }

    /// Forget everything recorded for a page (it rebuilt cleanly or was removed).
    pub fn clear_for(&mut self, uri: &str) {
        self.errors.retain(|e| e.uri != uri);
        self.warnings.retain(|w| w.uri != uri);
    }

    #[cfg(test)]
    pub fn errors(&self) -> impl Iterator<Item = &PersistedError> {
        self.errors.iter()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Drop entries for pages that no longer exist.
    pub fn retain_pages(&mut self, keep: impl Fn(&str) -> bool) {
        self.errors.retain(|e| keep(&e.uri));
        self.warnings.retain(|w| keep(&w.uri));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

/// Check if file content is the same as new content
fn file_content_matches(path: &Path, content: &str) -> bool {
    path.exists() && fs::read_to_string(path).is_ok_and(|existing| existing == content)
}

/// Persist diagnostics to disk. An empty state removes the file.
pub fn persist_diagnostics(state: &PersistedDiagnostics, root: &Path) -> std::io::Result<()> {
    let cache_dir = root.join(CACHE_DIR);
    let path = cache_dir.join(DIAGNOSTICS_FILE);

    if state.is_empty() {
        if path.exists() {
            fs::remove_file(&path)?;
        }
        return Ok(());
    }

    fs::create_dir_all(&cache_dir)?;
    let json = serde_json::to_string_pretty(state)?;

    if file_content_matches(&path, &json) {
        crate::debug!("persist"; "diagnostics unchanged, skipping write");
        return Ok(());
    }

    fs::write(&path, &json)?;
    crate::debug!("persist"; "saved {} errors, {} warnings", state.error_count(), state.warning_count());
    Ok(())
}

/// Restore diagnostics from disk
pub fn restore_diagnostics(root: &Path) -> std::io::Result<PersistedDiagnostics> {
    let path = root.join(CACHE_DIR).join(DIAGNOSTICS_FILE);

    if !path.exists() {
        return Ok(PersistedDiagnostics::new());
    }

    let json = fs::read_to_string(&path)?;
    let state: PersistedDiagnostics = serde_json::from_str(&json)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    crate::debug!("persist"; "restored {} errors, {} warnings", state.error_count(), state.warning_count());
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_push_error_replaces_same_page() {
        let mut state = PersistedDiagnostics::new();
        state.push_error(PersistedError::new("/a", "render", "first"));
        state.push_error(PersistedError::new("/a", "style", "second"));
        state.push_error(PersistedError::new("/b", "write", "other"));

        assert_eq!(state.error_count(), 2);
        let a = state.errors().find(|e| e.uri == "/a").unwrap();
        assert_eq!(a.error, "second");
    }

    #[test]
    fn test_clear_for_removes_errors_and_warnings() {
        let mut state = PersistedDiagnostics::new();
        state.push_error(PersistedError::new("/a", "render", "boom"));
        state.set_warnings("/a", &["undeclared --x".to_string()]);
        state.clear_for("/a");
        assert!(state.is_empty());
    }

    #[test]
    fn test_retain_pages_drops_unknown() {
        let mut state = PersistedDiagnostics::new();
        state.push_error(PersistedError::new("/gone", "render", "boom"));
        state.set_warnings("/kept", &["w".to_string()]);
        state.retain_pages(|uri| uri == "/kept");
        assert_eq!(state.error_count(), 0);
        assert_eq!(state.warning_count(), 1);
    }

    #[test]
    fn test_persist_and_restore() {
        let temp = TempDir::new().unwrap();
        let mut state = PersistedDiagnostics::new();
        state.push_error(PersistedError::new("/", "markup", "missing file"));
        state.set_warnings("/about", &["w1".to_string(), "w2".to_string()]);

        persist_diagnostics(&state, temp.path()).unwrap();
        let restored = restore_diagnostics(temp.path()).unwrap();
        assert_eq!(restored.error_count(), 1);
        assert_eq!(restored.warning_count(), 2);
        assert_eq!(restored.errors().next().unwrap().stage, "markup");
    }

    #[test]
    fn test_persist_empty_removes_file() {
        let temp = TempDir::new().unwrap();
        let mut state = PersistedDiagnostics::new();
        state.push_error(PersistedError::new("/", "markup", "x"));
        persist_diagnostics(&state, temp.path()).unwrap();

        state.clear_for("/");
        persist_diagnostics(&state, temp.path()).unwrap();
        assert!(!temp.path().join(CACHE_DIR).join(DIAGNOSTICS_FILE).exists());
        assert!(restore_diagnostics(temp.path()).unwrap().is_empty());
    }
}
