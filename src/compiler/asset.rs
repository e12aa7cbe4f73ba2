//! Asset-import resolution, consulted by the bundler before module lookup.

use std::path::{Path, PathBuf};

use super::transform::TransformError;
use crate::utils::path::lexical_clean;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// The import is satisfied by this text; `file` is watched.
    Content { text: String, file: PathBuf },
    /// Not an asset: the bundler resolves it as a module.
    Delegated,
}

pub trait AssetResolver: Send + Sync {
    fn resolve(&self, specifier: &str, importer: &Path) -> Result<Resolved, TransformError>;
}

/// Resolves `?raw` imports to the text of the referenced file.
#[derive(Debug, Default)]
pub struct RawAssets;

const RAW_SUFFIX: &str = "?raw";

impl AssetResolver for RawAssets {
    fn resolve(&self, specifier: &str, importer: &Path) -> Result<Resolved, TransformError> {
        let Some(target) = specifier.strip_suffix(RAW_SUFFIX) else {
            return Ok(Resolved::Delegated);
        };
        let file = resolve_relative(importer, target).ok_or_else(|| TransformError::Unresolved {
            importer: importer.to_path_buf(),
            specifier: specifier.to_string(),
        })?;
        let text = std::fs::read_to_string(&file).map_err(|e| TransformError::io(&file, &e))?;
        Ok(Resolved::Content { text, file })
    }
}

/// Resolve a specifier against the importing file's directory.
///
/// Bare specifiers (`lodash`) are not resolvable.
pub fn resolve_relative(importer: &Path, specifier: &str) -> Option<PathBuf> {
    if !(specifier.starts_with("./") || specifier.starts_with("../")) {
        return None;
    }
    let base = importer.parent()?;
    Some(lexical_clean(&base.join(specifier)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_relative() {
        let importer = Path::new("/site/src/blog/post-client.js");
        assert_eq!(
            resolve_relative(importer, "../lib/a.js"),
            Some(PathBuf::from("/site/src/lib/a.js"))
        );
        assert_eq!(
            resolve_relative(importer, "./b.js"),
            Some(PathBuf::from("/site/src/blog/b.js"))
        );
        assert_eq!(resolve_relative(importer, "lodash"), None);
    }

    #[test]
    fn test_raw_import_reads_file() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("notes.txt"), "hello\n").unwrap();
        let importer = temp.path().join("index-client.js");

        let resolved = RawAssets.resolve("./notes.txt?raw", &importer).unwrap();
        assert_eq!(
            resolved,
            Resolved::Content {
                text: "hello\n".into(),
                file: lexical_clean(&temp.path().join("notes.txt")),
            }
        );
    }

    #[test]
    fn test_non_raw_delegated() {
        assert_eq!(
            RawAssets.resolve("./a.js", Path::new("/x/y.js")).unwrap(),
            Resolved::Delegated
        );
    }

    #[test]
    fn test_missing_raw_file_is_io_error() {
        let err = RawAssets
            .resolve("./missing.txt?raw", Path::new("/nonexistent/a.js"))
            .unwrap_err();
        assert!(matches!(err, TransformError::Io { .. }));
    }
}
