//! Filesystem path helpers.

use std::path::{Component, Path, PathBuf};

/// Normalize a path to absolute form for reliable map lookups.
///
/// Canonicalizes when the file exists. Otherwise folds `.`/`..` lexically and
/// canonicalizes the deepest existing ancestor, so a deleted file still
/// matches the entry recorded while it existed.
pub fn normalize_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    };
    let absolute = lexical_clean(&absolute);

    let mut tail = Vec::new();
    let mut cursor = absolute.as_path();
    while let (Some(parent), Some(name)) = (cursor.parent(), cursor.file_name()) {
        tail.push(name);
        if let Ok(mut resolved) = parent.canonicalize() {
            resolved.extend(tail.iter().rev());
            return resolved;
        }
        cursor = parent;
    }
    absolute
}

/// Fold `.` and `..` components without touching the filesystem.
pub fn lexical_clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Editor artifacts and dotfiles never take part in a build.
pub fn is_ignored_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

/// Path relative to `base` with `/` separators, if `path` is inside it.
pub fn relative_slash(path: &Path, base: &Path) -> Option<String> {
    let rel = path.strip_prefix(base).ok()?;
    let parts: Vec<_> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}
