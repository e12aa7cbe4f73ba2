//! Bundler: follow a page entry's imports and produce one chunk.
//!
//! - Scripts are concatenated depth-first, dependencies ahead of their
//!   importers, each module emitted once (a cycle's back edge is skipped).
//! - Markup includes are spliced in place; a file already on the include
//!   stack splices to nothing.
//!
//! Every file read, including asset files, is reported as a watch file.
//! Markup bundles also carry a `SourceMap` from bundle offsets back to the
//! file and line each spliced span came from.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use super::asset::{AssetResolver, Resolved, resolve_relative};
use super::transform::{Binding, Import, SourceKind, Transform, TransformError};
use crate::core::BuildMode;
use crate::utils::path::normalize_path;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bundle {
    pub code: String,
    pub watch_files: Vec<PathBuf>,
    pub origins: SourceMap,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Origin {
    /// Byte offset in the bundle where the span starts.
    start: usize,
    file: PathBuf,
    /// 1-based line of `file` at `start`.
    line: usize,
}

/// Spliced spans of a markup bundle, in bundle order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceMap {
    origins: Vec<Origin>,
}

impl SourceMap {
    fn push(&mut self, start: usize, file: &Path, line: usize) {
        let origin = Origin {
            start,
            file: file.to_path_buf(),
            line,
        };
        match self.origins.last_mut() {
            Some(last) if last.start == start => *last = origin,
            _ => self.origins.push(origin),
        }
    }

    /// File and line of byte `offset` in `code`, the bundle this map describes.
    pub fn locate<'a>(&'a self, code: &str, offset: usize) -> Option<(&'a Path, usize)> {
        let index = self.origins.partition_point(|o| o.start <= offset).checked_sub(1)?;
        let origin = &self.origins[index];
        let line = origin.line + code.get(origin.start..offset)?.matches('\n').count();
        Some((&origin.file, line))
    }
}

#[derive(Clone)]
pub struct Bundler {
    transform: Arc<dyn Transform>,
    assets: Arc<dyn AssetResolver>,
}

/// State of one `bundle` call.
#[derive(Default)]
struct Walk {
    out: String,
    watch_files: Vec<PathBuf>,
    seen_files: FxHashSet<PathBuf>,
    /// Script modules already emitted, with their default export binding.
    emitted: FxHashMap<PathBuf, Option<String>>,
    /// Markup include stack.
    stack: Vec<PathBuf>,
    origins: SourceMap,
}

impl Walk {
    fn push_text(&mut self, file: &Path, line: usize, text: &str) {
        if text.is_empty() {
            return;
        }
        self.origins.push(self.out.len(), file, line);
        self.out.push_str(text);
    }

    fn read(&mut self, path: &Path) -> Result<String, TransformError> {
        self.watch(path);
        fs::read_to_string(path).map_err(|e| TransformError::io(path, &e))
    }

    fn watch(&mut self, path: &Path) {
        if self.seen_files.insert(path.to_path_buf()) {
            self.watch_files.push(path.to_path_buf());
        }
    }
}

impl Bundler {
    pub fn new(transform: Arc<dyn Transform>, assets: Arc<dyn AssetResolver>) -> Self {
        Self { transform, assets }
    }

    /// Bundle the entry at `entry` and run the `render_chunk` hook.
    ///
    /// On failure the files read so far are still returned, so the caller
    /// can keep watching them and rebuild once the problem is fixed.
    pub fn bundle(&self, entry: &Path, mode: BuildMode) -> Result<Bundle, (TransformError, Vec<PathBuf>)> {
        let entry = normalize_path(entry);
        let mut walk = Walk::default();

        let result = match SourceKind::of(&entry) {
            SourceKind::Markup => self.splice(&entry, &mut walk),
            _ => self.emit_script(&entry, &mut walk).map(|_| ()),
        }
        .and_then(|()| self.transform.render_chunk(&entry, &walk.out, mode));

        match result {
            Ok(code) => {
                // Offsets only hold while the chunk hook leaves the text as is.
                let origins = if code == walk.out {
                    walk.origins
                } else {
                    SourceMap::default()
                };
                Ok(Bundle {
                    code,
                    watch_files: walk.watch_files,
                    origins,
                })
            }
            Err(err) => Err((err, walk.watch_files)),
        }
    }

    fn resolve_module(importer: &Path, specifier: &str) -> Result<PathBuf, TransformError> {
        resolve_relative(importer, specifier).ok_or_else(|| TransformError::Unresolved {
            importer: importer.to_path_buf(),
            specifier: specifier.to_string(),
        })
    }

    /// Emit `path` and its dependencies into `walk.out`, returning the
    /// module's default export binding.
    fn emit_script(&self, path: &Path, walk: &mut Walk) -> Result<Option<String>, TransformError> {
        if let Some(default) = walk.emitted.get(path) {
            return Ok(default.clone());
        }
        // Mark before descending so cycles terminate.
        walk.emitted.insert(path.to_path_buf(), None);

        let source = walk.read(path)?;
        let module = self.transform.transform(path, &source)?;

        let mut bindings = String::new();
        for import in &module.imports {
            self.emit_import(path, import, walk, &mut bindings)?;
        }

        walk.out.push_str(&bindings);
        walk.out.push_str(&module.code);
        if !module.code.ends_with('\n') {
            walk.out.push('\n');
        }

        walk.emitted
            .insert(path.to_path_buf(), module.default_export.clone());
        Ok(module.default_export)
    }

    fn emit_import(
        &self,
        importer: &Path,
        import: &Import,
        walk: &mut Walk,
        bindings: &mut String,
    ) -> Result<(), TransformError> {
        match self.assets.resolve(&import.specifier, importer)? {
            Resolved::Content { text, file } => {
                walk.watch(&file);
                let literal = serde_json::to_string(&text).unwrap_or_default();
                for binding in &import.bindings {
                    if let Binding::Default(local) = binding {
                        bindings.push_str(&format!("const {local} = {literal};\n"));
                    }
                }
            }
            Resolved::Delegated => {
                let dependency = Self::resolve_module(importer, &import.specifier)?;
                let default = self.emit_script(&dependency, walk)?;
                for binding in &import.bindings {
                    match binding {
                        Binding::Default(local) => {
                            let Some(name) = &default else {
                                return Err(TransformError::Unsupported {
                                    path: importer.to_path_buf(),
                                    message: format!(
                                        "`{}` has no default export (or is imported circularly)",
                                        import.specifier
                                    ),
                                });
                            };
                            bindings.push_str(&format!("const {local} = {name};\n"));
                        }
                        Binding::Named { imported, local } => {
                            bindings.push_str(&format!("const {local} = {imported};\n"));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Append `path` to `walk.out` with its includes spliced in place.
    fn splice(&self, path: &Path, walk: &mut Walk) -> Result<(), TransformError> {
        let source = walk.read(path)?;
        let module = self.transform.transform(path, &source)?;
        let code = module.code.as_str();

        walk.stack.push(path.to_path_buf());
        let mut cursor = 0;
        let mut line = 1;
        for import in &module.imports {
            let Some(slot) = &import.slot else {
                continue;
            };
            let Some(found) = code[cursor..].find(slot.as_str()) else {
                continue;
            };
            let at = cursor + found;
            let before = &code[cursor..at];
            walk.push_text(path, line, before);
            line += before.matches('\n').count();

            match self.assets.resolve(&import.specifier, path)? {
                Resolved::Content { text, file } => {
                    walk.watch(&file);
                    walk.push_text(&file, 1, &text);
                }
                Resolved::Delegated => {
                    let specifier = if import.specifier.starts_with('.') {
                        import.specifier.clone()
                    } else {
                        format!("./{}", import.specifier)
                    };
                    let include = Self::resolve_module(path, &specifier)?;
                    if !walk.stack.contains(&include) {
                        self.splice(&include, walk)?;
                    }
                }
            }
            line += slot.matches('\n').count();
            cursor = at + slot.len();
        }
        walk.push_text(path, line, &code[cursor..]);
        walk.stack.pop();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{RawAssets, SourceTransform};
    use tempfile::TempDir;

    fn bundler() -> Bundler {
        Bundler::new(Arc::new(SourceTransform), Arc::new(RawAssets))
    }

    fn write(dir: &Path, rel: &str, content: &str) -> PathBuf {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        normalize_path(&path)
    }

    #[test]
    fn test_script_dependencies_hoisted_once() {
        let temp = TempDir::new().unwrap();
        let util = write(temp.path(), "lib/util.js", "export const base = 1;\n");
        write(
            temp.path(),
            "lib/a.js",
            "import { base } from './util.js';\nexport const a = base + 1;\n",
        );
        let entry = write(
            temp.path(),
            "index-client.js",
            "import { a } from './lib/a.js';\nimport { base } from './lib/util.js';\nconsole.log(a, base);\n",
        );

        let bundle = bundler().bundle(&entry, BuildMode::DEVELOPMENT).unwrap();
        assert_eq!(bundle.code.matches("const base = 1;").count(), 1);
        let base_at = bundle.code.find("const base").unwrap();
        let a_at = bundle.code.find("const a =").unwrap();
        let log_at = bundle.code.find("console.log").unwrap();
        assert!(base_at < a_at && a_at < log_at);
        assert_eq!(bundle.watch_files.len(), 3);
        assert_eq!(bundle.watch_files[0], entry);
        assert!(bundle.watch_files.contains(&util));
    }

    #[test]
    fn test_script_cycle_terminates() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "a.js", "import { b } from './b.js';\nexport const a = 1;\n");
        write(temp.path(), "b.js", "import { a } from './a.js';\nexport const b = 2;\n");
        let entry = write(temp.path(), "index-client.js", "import { a } from './a.js';\n");

        let bundle = bundler().bundle(&entry, BuildMode::DEVELOPMENT).unwrap();
        assert_eq!(bundle.code.matches("const a = 1;").count(), 1);
        assert_eq!(bundle.code.matches("const b = 2;").count(), 1);
    }

    #[test]
    fn test_raw_asset_bound_and_watched() {
        let temp = TempDir::new().unwrap();
        let notes = write(temp.path(), "notes.txt", "a \"quoted\" line");
        let entry = write(
            temp.path(),
            "index-client.js",
            "import notes from './notes.txt?raw';\nconsole.log(notes);\n",
        );

        let bundle = bundler().bundle(&entry, BuildMode::DEVELOPMENT).unwrap();
        assert!(bundle.code.contains(r#"const notes = "a \"quoted\" line";"#));
        assert!(bundle.watch_files.contains(&notes));
    }

    #[test]
    fn test_markup_includes_spliced() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "partials/nav.html", "<nav>home</nav>");
        write(
            temp.path(),
            "partials/head.html",
            r#"<header><!--#include file="nav.html"--></header>"#,
        );
        let entry = write(
            temp.path(),
            "index-html.html",
            r#"<body><!--#include file="partials/head.html"--><main></main></body>"#,
        );

        let bundle = bundler().bundle(&entry, BuildMode::PRODUCTION).unwrap();
        assert_eq!(
            bundle.code,
            "<body><header><nav>home</nav></header><main></main></body>"
        );
        assert_eq!(bundle.watch_files.len(), 3);
    }

    #[test]
    fn test_markup_origins_point_at_included_file() {
        let temp = TempDir::new().unwrap();
        let nav = write(temp.path(), "parts/nav.html", "<nav>\n{{ missing }}</nav>");
        let entry = write(
            temp.path(),
            "index-html.html",
            "<body>\n<!--#include file=\"parts/nav.html\"-->\n<p>{{ after }}</p></body>",
        );

        let bundle = bundler().bundle(&entry, BuildMode::DEVELOPMENT).unwrap();
        let missing = bundle.code.find("{{ missing }}").unwrap();
        assert_eq!(bundle.origins.locate(&bundle.code, missing), Some((nav.as_path(), 2)));

        let after = bundle.code.find("{{ after }}").unwrap();
        assert_eq!(bundle.origins.locate(&bundle.code, after), Some((entry.as_path(), 3)));
        assert_eq!(bundle.origins.locate(&bundle.code, 0), Some((entry.as_path(), 1)));
    }

    #[test]
    fn test_markup_cycle_splices_nothing() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "a.html", r#"A<!--#include file="b.html"-->"#);
        write(temp.path(), "b.html", r#"B<!--#include file="a.html"-->"#);
        let entry = write(temp.path(), "index-html.html", r#"<!--#include file="a.html"-->"#);

        let bundle = bundler().bundle(&entry, BuildMode::DEVELOPMENT).unwrap();
        assert_eq!(bundle.code, "AB");
    }

    #[test]
    fn test_missing_dependency_keeps_partial_watch_files() {
        let temp = TempDir::new().unwrap();
        let entry = write(temp.path(), "index-client.js", "import './gone.js';\n");

        let (err, watch_files) = bundler().bundle(&entry, BuildMode::DEVELOPMENT).unwrap_err();
        assert!(matches!(err, TransformError::Io { .. }));
        assert_eq!(watch_files.len(), 2);
        assert_eq!(watch_files[0], entry);
    }

    #[test]
    fn test_bare_specifier_unresolved() {
        let temp = TempDir::new().unwrap();
        let entry = write(temp.path(), "index-client.js", "import 'lodash';\n");
        let (err, _) = bundler().bundle(&entry, BuildMode::DEVELOPMENT).unwrap_err();
        assert!(matches!(err, TransformError::Unresolved { .. }));
    }
}
