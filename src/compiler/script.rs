//! Script modules: oxc parse, import collection, export stripping, minify.
//!
//! Modules are concatenated by the bundler (scope hoisting), so a module's
//! own `import` statements and `export` keywords are removed here and its
//! imports reported back as hoisted dependencies.

use std::path::Path;

use oxc::allocator::Allocator;
use oxc::ast::ast::{
    ExportDefaultDeclarationKind, ImportDeclarationSpecifier, Statement,
};
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::span::{GetSpan, SourceType, Span};

use super::transform::{Binding, Import, TransformError, Transformed};
use crate::utils::hash::fingerprint;

/// Binding name for an anonymous default export of the module at `path`.
pub fn default_binding(path: &Path) -> String {
    format!("__default_{}", fingerprint(path.to_string_lossy().as_bytes()))
}

fn parse_error(path: &Path, errors: &[oxc::diagnostics::OxcDiagnostic]) -> TransformError {
    let message = errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ");
    TransformError::Parse {
        path: path.to_path_buf(),
        message,
    }
}

/// Source edits applied back to front.
struct Edits<'s> {
    source: &'s str,
    edits: Vec<(Span, String)>,
}

impl<'s> Edits<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source,
            edits: Vec::new(),
        }
    }

    fn replace(&mut self, span: Span, text: impl Into<String>) {
        self.edits.push((span, text.into()));
    }

    fn remove(&mut self, span: Span) {
        self.replace(span, "");
    }

    fn text(&self, span: Span) -> &'s str {
        &self.source[span.start as usize..span.end as usize]
    }

    fn apply(mut self) -> String {
        self.edits.sort_by_key(|(span, _)| span.start);
        let mut out = String::with_capacity(self.source.len());
        let mut cursor = 0usize;
        for (span, text) in &self.edits {
            out.push_str(&self.source[cursor..span.start as usize]);
            out.push_str(text);
            cursor = span.end as usize;
        }
        out.push_str(&self.source[cursor..]);
        out
    }
}

pub fn transform_module(path: &Path, source: &str) -> Result<Transformed, TransformError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::mjs()).parse();
    if !ret.errors.is_empty() {
        return Err(parse_error(path, &ret.errors));
    }

    let mut edits = Edits::new(source);
    let mut imports = Vec::new();
    let mut default_export = None;

    for statement in &ret.program.body {
        match statement {
            Statement::ImportDeclaration(decl) => {
                let mut import = Import::hoisted(decl.source.value.as_str());
                for specifier in decl.specifiers.iter().flatten() {
                    match specifier {
                        ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                            import
                                .bindings
                                .push(Binding::Default(s.local.name.to_string()));
                        }
                        ImportDeclarationSpecifier::ImportSpecifier(s) => {
                            let imported = s.imported.name().to_string();
                            let local = s.local.name.to_string();
                            if imported != local {
                                import.bindings.push(Binding::Named { imported, local });
                            }
                        }
                        ImportDeclarationSpecifier::ImportNamespaceSpecifier(_) => {
                            return Err(TransformError::Unsupported {
                                path: path.to_path_buf(),
                                message: format!(
                                    "namespace import of `{}` is not supported",
                                    decl.source.value
                                ),
                            });
                        }
                    }
                }
                imports.push(import);
                edits.remove(decl.span);
            }
            Statement::ExportNamedDeclaration(decl) => {
                if let Some(source) = &decl.source {
                    imports.push(Import::hoisted(source.value.as_str()));
                }
                match &decl.declaration {
                    // `export const x = 1` → `const x = 1`
                    Some(inner) => {
                        let text = edits.text(inner.span()).to_string();
                        edits.replace(decl.span, text);
                    }
                    // `export { a, b }`: names are already in the shared scope
                    None => edits.remove(decl.span),
                }
            }
            Statement::ExportAllDeclaration(decl) => {
                imports.push(Import::hoisted(decl.source.value.as_str()));
                edits.remove(decl.span);
            }
            Statement::ExportDefaultDeclaration(decl) => match &decl.declaration {
                ExportDefaultDeclarationKind::FunctionDeclaration(func)
                    if func.id.is_some() =>
                {
                    default_export = func.id.as_ref().map(|id| id.name.to_string());
                    let text = edits.text(func.span).to_string();
                    edits.replace(decl.span, text);
                }
                ExportDefaultDeclarationKind::ClassDeclaration(class) if class.id.is_some() => {
                    default_export = class.id.as_ref().map(|id| id.name.to_string());
                    let text = edits.text(class.span).to_string();
                    edits.replace(decl.span, text);
                }
                kind => {
                    let name = default_binding(path);
                    let value = edits.text(kind.span()).to_string();
                    edits.replace(decl.span, format!("const {name} = {value};"));
                    default_export = Some(name);
                }
            },
            _ => {}
        }
    }

    Ok(Transformed {
        code: edits.apply(),
        imports,
        default_export,
    })
}

/// Minify a finished script bundle.
pub fn minify(path: &Path, source: &str) -> Result<String, TransformError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::mjs()).parse();
    if !ret.errors.is_empty() {
        return Err(parse_error(path, &ret.errors));
    }
    let mut program = ret.program;
    let options = MinifierOptions {
        mangle: Some(MangleOptions::default()),
        compress: Some(CompressOptions::smallest()),
    };
    let ret = Minifier::new(options).minify(&allocator, &mut program);
    let code = Codegen::new()
        .with_options(CodegenOptions {
            minify: true,
            comments: CommentOptions::disabled(),
            ..CodegenOptions::default()
        })
        .with_scoping(ret.scoping)
        .build(&program)
        .code;
    Ok(code)
}
