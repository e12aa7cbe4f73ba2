//! One page's rebuild: client bundle → markup bundle → render → styles → write.
//!
//! Runs as its own task. Progress is reported to the orchestrator as
//! messages, in stage order; a failing stage ends the run with a
//! `PipelineError` and the remaining stages are skipped.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;

use super::PageState;
use crate::actor::messages::BuildMsg;
use crate::cache::{CachedTransform, FaultLog};
use crate::compiler::{Bundle, Bundler, RawAssets, SourceTransform, Transform};
use crate::config::{PageConfig, SiteConfig};
use crate::core::{BuildMode, UrlPath};
use crate::page::Page;
use crate::reload::Notifier;
use crate::render::{RenderJob, RendererFactory, WorkerPool};
use crate::style::scoped::{lift_hoisted_scripts, referenced_classes, scope_styles, stylesheet_classes};
use crate::style::{Canonicalizer, StyleSet, compress};
use crate::utils::html::{Fallback, insert_before_close};
use crate::utils::plural_count;

/// Pipeline stage a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Client,
    Markup,
    Render,
    Style,
    Write,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Markup => "markup",
            Self::Render => "render",
            Self::Style => "style",
            Self::Write => "write",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A page-local failure. Never crosses the page boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{uri} [{stage}] {message}")]
pub struct PipelineError {
    pub uri: UrlPath,
    pub stage: Stage,
    pub message: String,
}

/// What a completed page produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageOutput {
    pub outputs: Vec<PathBuf>,
    /// Scoped style classes in the page stylesheet.
    pub classes: usize,
    /// Warning-class style events.
    pub warnings: Vec<String>,
}

/// Collaborators shared by every pipeline, created once per orchestrator.
pub struct BuildContext {
    pub mode: BuildMode,
    /// Project root, for persisted diagnostics.
    pub root: PathBuf,
    pub bundler: Bundler,
    transforms: Arc<CachedTransform<SourceTransform>>,
    pub canonicalizer: Arc<Canonicalizer>,
    pub styles: Mutex<StyleSet>,
    /// Canonical global styles emitted ahead of every page's scoped styles.
    pub common_styles: Arc<str>,
    pub pool: WorkerPool,
    pub faults: Mutex<FaultLog>,
    pub notifier: Arc<dyn Notifier>,
}

impl BuildContext {
    /// Must run inside a tokio runtime (the render pool is an actor).
    pub fn new(
        config: &SiteConfig,
        mode: BuildMode,
        renderer: Arc<dyn RendererFactory>,
        notifier: Arc<dyn Notifier>,
    ) -> anyhow::Result<Self> {
        let cache = &config.build.cache;
        let canonicalizer = Arc::new(Canonicalizer::new(cache.canonical_capacity));
        let transforms = Arc::new(CachedTransform::new(SourceTransform, cache.transform_capacity));
        let bundler = Bundler::new(Arc::clone(&transforms) as Arc<dyn Transform>, Arc::new(RawAssets));

        let mut styles = StyleSet::new(Arc::clone(&canonicalizer));
        let common_styles = match &config.build.global_styles {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .map_err(|e| anyhow::anyhow!("cannot read {}: {}", path.display(), e))?;
                let canonical = canonicalizer.canonicalize(&raw)?;
                styles.reserve(stylesheet_classes(&canonical));
                canonical
            }
            None => String::new(),
        };

        let pool = WorkerPool::spawn(config.build.workers, renderer)?;
        crate::debug!("render"; "{} started", plural_count(pool.size(), "worker"));

        Ok(Self {
            mode,
            root: config.get_root().to_path_buf(),
            bundler,
            transforms,
            canonicalizer,
            styles: Mutex::new(styles),
            common_styles: Arc::from(common_styles),
            pool,
            faults: Mutex::new(FaultLog::new()),
            notifier,
        })
    }
}

impl BuildContext {
    /// Cache hit counters for the verbose build summary.
    pub fn cache_summary(&self) -> String {
        let (transform, chunk) = self.transforms.hits();
        let canonical = self.canonicalizer.cache_stats();
        format!(
            "cache hits: transform {transform}, chunk {chunk}, canonical {}/{}; {}",
            canonical.hits,
            canonical.hits + canonical.misses,
            plural_count(self.styles.lock().len(), "shared style")
        )
    }
}

/// Markup and script ready to be written.
struct Finalized {
    html: String,
    script: Option<String>,
    classes: usize,
    warnings: Vec<String>,
}

struct PageRun {
    ctx: Arc<BuildContext>,
    page: Page,
    build: u64,
    tx: mpsc::Sender<BuildMsg>,
}

pub(super) async fn run_page(ctx: Arc<BuildContext>, page: Page, build: u64, tx: mpsc::Sender<BuildMsg>) {
    let uri = page.uri.clone();
    let run = PageRun { ctx, page, build, tx };
    let result = run.stages().await;
    let _ = run.tx.send(BuildMsg::Finished { uri, result }).await;
}

impl PageRun {
    fn fail(&self, stage: Stage, message: impl Into<String>) -> PipelineError {
        PipelineError {
            uri: self.page.uri.clone(),
            stage,
            message: message.into(),
        }
    }

    async fn enter(&self, state: PageState) {
        let uri = self.page.uri.clone();
        let _ = self.tx.send(BuildMsg::Stage { uri, state }).await;
    }

    async fn attach(&self, files: Vec<PathBuf>) {
        if files.is_empty() {
            return;
        }
        let uri = self.page.uri.clone();
        let _ = self.tx.send(BuildMsg::Attach { uri, files }).await;
    }

    async fn stages(&self) -> Result<PageOutput, PipelineError> {
        self.enter(PageState::ClientCompiling).await;
        let client_code = match &self.page.client {
            Some(path) => Some(self.bundle(Stage::Client, path).await?.code),
            None => None,
        };

        self.enter(PageState::MarkupCompiling).await;
        let Some(markup_source) = &self.page.markup else {
            let route = &self.page.route;
            return Err(self.fail(
                Stage::Markup,
                format!("no markup source, expected `{route}-html.html`"),
            ));
        };
        let page_config = self.page_config().await?;
        let bundle = self.bundle(Stage::Markup, markup_source).await?;

        self.enter(PageState::Rendering).await;
        let markup = self.render(markup_source, bundle, page_config).await?;

        self.enter(PageState::StyleFinalizing).await;
        let finalized = self.finalize(&markup, client_code)?;

        self.enter(PageState::Writing).await;
        self.write(finalized).await
    }

    async fn bundle(&self, stage: Stage, entry: &Path) -> Result<Bundle, PipelineError> {
        let ctx = Arc::clone(&self.ctx);
        let entry = entry.to_path_buf();
        let result = tokio::task::spawn_blocking(move || ctx.bundler.bundle(&entry, ctx.mode))
            .await
            .map_err(|e| self.fail(stage, format!("bundler task failed: {e}")))?;

        match result {
            Ok(mut bundle) => {
                self.attach(std::mem::take(&mut bundle.watch_files)).await;
                Ok(bundle)
            }
            Err((err, files)) => {
                // Keep watching what was read, so fixing it triggers a rebuild.
                self.attach(files).await;
                Err(self.fail(stage, err.to_string()))
            }
        }
    }

    async fn page_config(&self) -> Result<PageConfig, PipelineError> {
        let Some(path) = &self.page.config else {
            return Ok(PageConfig::default());
        };
        self.attach(vec![path.clone()]).await;
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| self.fail(Stage::Markup, format!("{}: {e}", path.display())))?;
        PageConfig::parse(path, &content)
            .map_err(|e| self.fail(Stage::Markup, format!("{}: {e}", path.display())))
    }

    async fn render(
        &self,
        source: &Path,
        bundle: Bundle,
        page: PageConfig,
    ) -> Result<String, PipelineError> {
        let mut vars = BTreeMap::new();
        vars.insert("build".to_string(), self.build.to_string());

        let job = RenderJob {
            uri: self.page.uri.clone(),
            source_file: source.to_path_buf(),
            bundle: Arc::from(bundle.code),
            origins: bundle.origins,
            development: self.ctx.mode.development,
            common_style_prefix: Arc::clone(&self.ctx.common_styles),
            page,
            vars,
        };

        let mut ticket = self.ctx.pool.submit(job);
        if ticket.started().await {
            crate::debug!("render"; "{} started", self.page.uri);
        }
        ticket
            .finish()
            .await
            .map_err(|fault| self.fail(Stage::Render, fault.to_string()))
    }

    fn finalize(&self, markup: &str, client_code: Option<String>) -> Result<Finalized, PipelineError> {
        let style_error = |e: crate::style::StyleError| self.fail(Stage::Style, e.to_string());

        let (markup, inline_scripts) = lift_hoisted_scripts(markup);
        let markup = {
            let mut styles = self.ctx.styles.lock();
            scope_styles(&markup, |fragment| styles.class_name(fragment)).map_err(style_error)?
        };

        let script = client_code
            .into_iter()
            .chain(inline_scripts)
            .filter(|code| !code.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        let referenced = referenced_classes(&markup, &script);
        let subset = self
            .ctx
            .styles
            .lock()
            .subset(referenced.iter().map(String::as_str));

        let css = format!("{}{}", self.ctx.common_styles, subset.css());
        let (css, warnings) = if css.is_empty() {
            (String::new(), Vec::new())
        } else {
            let compressed = compress(&css).map_err(style_error)?;
            (compressed.css, compressed.warnings)
        };
        for warning in &warnings {
            crate::log!("style"; "{}: {}", self.page.uri, warning);
        }

        let mut html = markup;
        if !css.is_empty() {
            html = insert_before_close(&html, "head", &format!("<style>{css}</style>"), Fallback::Prepend);
        }
        let script = (!script.is_empty()).then_some(script);
        if script.is_some() {
            let tag = format!(r#"<script type="module" src="{}"></script>"#, self.page.script_name());
            html = insert_before_close(&html, "body", &tag, Fallback::Append);
        }

        Ok(Finalized {
            html,
            script,
            classes: subset.len(),
            warnings,
        })
    }

    async fn write(&self, finalized: Finalized) -> Result<PageOutput, PipelineError> {
        let write_error = |path: &Path, e: std::io::Error| {
            self.fail(Stage::Write, format!("{}: {e}", path.display()))
        };

        let dir = &self.page.output_dir;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| write_error(dir.as_path(), e))?;

        let mut outputs = Vec::new();
        let markup_path = self.page.output_markup();
        tokio::fs::write(&markup_path, finalized.html)
            .await
            .map_err(|e| write_error(markup_path.as_path(), e))?;
        outputs.push(markup_path);

        let script_path = self.page.output_script();
        match finalized.script {
            Some(code) => {
                tokio::fs::write(&script_path, code)
                    .await
                    .map_err(|e| write_error(script_path.as_path(), e))?;
                outputs.push(script_path);
            }
            // The page no longer has client code; drop the stale script.
            None => match tokio::fs::remove_file(&script_path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(write_error(script_path.as_path(), e)),
            },
        }

        Ok(PageOutput {
            outputs,
            classes: finalized.classes,
            warnings: finalized.warnings,
        })
    }
}
