//! Transform hooks consumed by the bundler.
//!
//! Two hooks, each independently cacheable:
//! - `transform(path, source)`: one module in, rewritten code plus the
//!   imports it declares
//! - `render_chunk(path, code, mode)`: the finished bundle in, final text out
//!
//! `SourceTransform` is the default implementation: scripts go through oxc,
//! markup through `<!--#include file="..."-->` directives, anything else
//! passes through untouched.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use super::script;
use crate::core::BuildMode;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error("{}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("{}: cannot resolve `{specifier}`", importer.display())]
    Unresolved { importer: PathBuf, specifier: String },

    #[error("{}: {message}", path.display())]
    Unsupported { path: PathBuf, message: String },

    #[error("cannot read `{}`: {message}", path.display())]
    Io { path: PathBuf, message: String },
}

impl TransformError {
    pub fn io(path: &Path, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}

/// How an importing module binds a dependency's value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// `import x from "..."`
    Default(String),
    /// `import { imported as local } from "..."`, only emitted when renamed
    Named { imported: String, local: String },
}

/// One dependency declared by a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub specifier: String,
    /// Exact text in `Transformed::code` replaced by the dependency's
    /// content. `None` hoists the dependency ahead of the module.
    pub slot: Option<String>,
    pub bindings: Vec<Binding>,
}

impl Import {
    pub fn hoisted(specifier: impl Into<String>) -> Self {
        Self {
            specifier: specifier.into(),
            slot: None,
            bindings: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Transformed {
    pub code: String,
    pub imports: Vec<Import>,
    /// Local name holding the module's default export.
    pub default_export: Option<String>,
}

impl Transformed {
    pub fn passthrough(source: &str) -> Self {
        Self {
            code: source.to_string(),
            ..Self::default()
        }
    }
}

pub trait Transform: Send + Sync {
    fn transform(&self, path: &Path, source: &str) -> Result<Transformed, TransformError>;

    fn render_chunk(&self, path: &Path, code: &str, mode: BuildMode)
    -> Result<String, TransformError>;
}

/// Source category, by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Script,
    Markup,
    Other,
}

impl SourceKind {
    pub fn of(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("js" | "mjs") => Self::Script,
            Some("html" | "htm") => Self::Markup,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Default)]
pub struct SourceTransform;

impl Transform for SourceTransform {
    fn transform(&self, path: &Path, source: &str) -> Result<Transformed, TransformError> {
        match SourceKind::of(path) {
            SourceKind::Script => script::transform_module(path, source),
            SourceKind::Markup => Ok(transform_markup(source)),
            SourceKind::Other => Ok(Transformed::passthrough(source)),
        }
    }

    fn render_chunk(
        &self,
        path: &Path,
        code: &str,
        mode: BuildMode,
    ) -> Result<String, TransformError> {
        if SourceKind::of(path) == SourceKind::Script && mode.minify && !code.is_empty() {
            return script::minify(path, code);
        }
        Ok(code.to_string())
    }
}

fn include_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"<!--#include[ \t]+file="([^"]+)"[ \t]*-->"#)
            .expect("include directive pattern is valid")
    })
}

/// Collect `<!--#include file="..."-->` directives; each is spliced in place.
fn transform_markup(source: &str) -> Transformed {
    let imports = include_regex()
        .captures_iter(source)
        .map(|caps| Import {
            specifier: caps[1].to_string(),
            slot: Some(caps[0].to_string()),
            bindings: Vec::new(),
        })
        .collect();

    Transformed {
        code: source.to_string(),
        imports,
        default_export: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind() {
        assert_eq!(SourceKind::of(Path::new("a-client.js")), SourceKind::Script);
        assert_eq!(SourceKind::of(Path::new("a-client.mjs")), SourceKind::Script);
        assert_eq!(SourceKind::of(Path::new("a-html.htm")), SourceKind::Markup);
        assert_eq!(SourceKind::of(Path::new("notes.txt")), SourceKind::Other);
    }

    #[test]
    fn test_markup_includes() {
        let source = r#"<body><!--#include file="nav.html"--><main/><!--#include  file="../foot.html" --></body>"#;
        let out = SourceTransform
            .transform(Path::new("/s/index-html.html"), source)
            .unwrap();

        assert_eq!(out.code, source);
        assert_eq!(out.imports.len(), 2);
        assert_eq!(out.imports[0].specifier, "nav.html");
        assert_eq!(
            out.imports[0].slot.as_deref(),
            Some(r#"<!--#include file="nav.html"-->"#)
        );
        assert_eq!(out.imports[1].specifier, "../foot.html");
    }

    #[test]
    fn test_other_passthrough() {
        let out = SourceTransform
            .transform(Path::new("/s/data.txt"), "hello")
            .unwrap();
        assert_eq!(out, Transformed::passthrough("hello"));
    }

    #[test]
    fn test_render_chunk_identity_without_minify() {
        let code = "const a = 1;\nconsole.log(a);\n";
        let out = SourceTransform
            .render_chunk(Path::new("/s/a-client.js"), code, BuildMode::DEVELOPMENT)
            .unwrap();
        assert_eq!(out, code);
    }

    #[test]
    fn test_render_chunk_markup_never_minified() {
        let out = SourceTransform
            .render_chunk(Path::new("/s/a-html.html"), "<p>  x  </p>", BuildMode::PRODUCTION)
            .unwrap();
        assert_eq!(out, "<p>  x  </p>");
    }
}
