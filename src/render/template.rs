//! Default markup renderer: `{{ name }}` placeholders.
//!
//! ```text
//! <title>{{ title }}</title>          escaped
//! <style>{{ common_styles | raw }}</style>   verbatim
//! ```

use super::{MarkupRenderer, RenderContext, RenderError, RenderJob};
use crate::utils::html::escape_attr;

#[derive(Debug, Default)]
pub struct TemplateRenderer;

fn line_at(source: &str, offset: usize) -> usize {
    source[..offset].matches('\n').count() + 1
}

/// File and line that `offset` in the bundle was spliced from.
fn locate(job: &RenderJob, offset: usize) -> (String, usize) {
    match job.origins.locate(&job.bundle, offset) {
        Some((file, line)) => (file.display().to_string(), line),
        None => (job.source_file.display().to_string(), line_at(&job.bundle, offset)),
    }
}

impl MarkupRenderer for TemplateRenderer {
    fn render(&mut self, job: &RenderJob, context: &mut RenderContext) -> Result<String, RenderError> {
        let source = &*job.bundle;
        let mut out = String::with_capacity(source.len());
        let mut rest = source;

        while let Some(open) = rest.find("{{") {
            out.push_str(&rest[..open]);
            let offset = source.len() - rest.len() + open;
            let after = &rest[open + 2..];
            let Some(close) = after.find("}}") else {
                let (file, line) = locate(job, offset);
                return Err(RenderError::Unclosed { file, line });
            };

            let expr = after[..close].trim();
            let (name, raw) = match expr.split_once('|') {
                Some((name, filter)) if filter.trim() == "raw" => (name.trim(), true),
                _ => (expr, false),
            };
            let Some(value) = context.lookup(name) else {
                let (file, line) = locate(job, offset);
                return Err(RenderError::UnknownVariable {
                    file,
                    line,
                    name: name.to_string(),
                });
            };
            if raw {
                out.push_str(value);
            } else {
                out.push_str(&escape_attr(value));
            }
            rest = &after[close + 2..];
        }

        out.push_str(rest);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::SourceMap;
    use crate::config::PageConfig;
    use crate::core::UrlPath;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn render(bundle: &str) -> Result<String, RenderError> {
        let job = RenderJob {
            uri: UrlPath::from_route("blog/index"),
            source_file: "blog/index-html.html".into(),
            bundle: Arc::from(bundle),
            origins: SourceMap::default(),
            development: false,
            common_style_prefix: Arc::from("a>b{color:red}"),
            page: PageConfig {
                title: Some("Tom & Jerry".into()),
                ..PageConfig::default()
            },
            vars: BTreeMap::new(),
        };
        let mut context = RenderContext::for_job(&job);
        TemplateRenderer.render(&job, &mut context)
    }

    #[test]
    fn test_substitution_escapes() {
        assert_eq!(
            render("<title>{{ title }}</title><p>{{route}}</p>").unwrap(),
            "<title>Tom &amp; Jerry</title><p>/blog/</p>"
        );
    }

    #[test]
    fn test_raw_filter() {
        assert_eq!(
            render("<style>{{ common_styles | raw }}</style>").unwrap(),
            "<style>a>b{color:red}</style>"
        );
    }

    #[test]
    fn test_no_placeholders() {
        assert_eq!(render("<p>plain</p>").unwrap(), "<p>plain</p>");
    }

    #[test]
    fn test_unknown_variable_reports_line() {
        assert_eq!(
            render("<p>\n{{ titel }}</p>").unwrap_err(),
            RenderError::UnknownVariable {
                file: "blog/index-html.html".into(),
                line: 2,
                name: "titel".into()
            }
        );
    }

    #[test]
    fn test_error_located_in_included_file() {
        use crate::compiler::{Bundler, RawAssets, SourceTransform};
        use crate::core::BuildMode;
        use std::fs;
        use tempfile::TempDir;

        let temp = TempDir::new().unwrap();
        let root = crate::utils::path::normalize_path(temp.path());
        fs::create_dir_all(root.join("parts")).unwrap();
        fs::write(root.join("parts/nav.html"), "<nav>\n{{ missing }}</nav>").unwrap();
        fs::write(
            root.join("index-html.html"),
            "<body>\n\n<!--#include file=\"parts/nav.html\"--></body>",
        )
        .unwrap();

        let bundler = Bundler::new(Arc::new(SourceTransform), Arc::new(RawAssets));
        let bundle = bundler
            .bundle(&root.join("index-html.html"), BuildMode::DEVELOPMENT)
            .unwrap();
        let job = RenderJob {
            uri: UrlPath::from_route("index"),
            source_file: root.join("index-html.html"),
            bundle: Arc::from(bundle.code),
            origins: bundle.origins,
            development: true,
            common_style_prefix: Arc::from(""),
            page: PageConfig::default(),
            vars: BTreeMap::new(),
        };
        let mut context = RenderContext::for_job(&job);

        assert_eq!(
            TemplateRenderer.render(&job, &mut context).unwrap_err(),
            RenderError::UnknownVariable {
                file: root.join("parts/nav.html").display().to_string(),
                line: 2,
                name: "missing".into()
            }
        );
    }

    #[test]
    fn test_unclosed_placeholder() {
        assert!(matches!(
            render("<p>{{ title </p>"),
            Err(RenderError::Unclosed { line: 1, .. })
        ));
    }
}
