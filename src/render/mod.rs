//! Markup generation in isolated render workers.
//!
//! ```text
//! pipeline ──submit(RenderJob)──▶ WorkerPool ──▶ worker thread
//!    ▲                              │  FIFO        │ MarkupRenderer::render
//!    └──── Rendered | Fault ────────┴──────────────┘ (catch_unwind)
//! ```
//!
//! Renderers never see ambient state: each call receives the job and an
//! explicit `RenderContext` built from it.

mod context;
mod pool;
mod template;

pub use context::RenderContext;
pub use pool::WorkerPool;
pub use template::TemplateRenderer;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::compiler::SourceMap;
use crate::config::PageConfig;
use crate::core::UrlPath;

/// Unit of work handed to a render worker.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub uri: UrlPath,
    pub source_file: PathBuf,
    /// Bundled markup-generation source.
    pub bundle: Arc<str>,
    /// Where each span of `bundle` was read from.
    pub origins: SourceMap,
    pub development: bool,
    /// Canonical global styles, shared by every page.
    pub common_style_prefix: Arc<str>,
    pub page: PageConfig,
    /// Per-job values, innermost scope.
    pub vars: BTreeMap<String, String>,
}

/// Errors raised by page code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("{file}:{line}: unknown variable `{name}`")]
    UnknownVariable {
        file: String,
        line: usize,
        name: String,
    },

    #[error("{file}:{line}: unclosed `{{{{`")]
    Unclosed { file: String, line: usize },
}

/// Outcome of a job that did not produce markup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderFault {
    #[error(transparent)]
    Failed(#[from] RenderError),

    /// Page code panicked; the worker was replaced.
    #[error("render panicked: {0}")]
    Panicked(String),

    #[error("render pool closed before the job finished")]
    PoolClosed,
}

/// Page-generation code executed inside a worker.
pub trait MarkupRenderer {
    fn render(&mut self, job: &RenderJob, context: &mut RenderContext) -> Result<String, RenderError>;
}

/// Creates one renderer per worker, on the worker's thread.
pub trait RendererFactory: Send + Sync + 'static {
    fn create(&self) -> Box<dyn MarkupRenderer>;
}

impl<F> RendererFactory for F
where
    F: Fn() -> Box<dyn MarkupRenderer> + Send + Sync + 'static,
{
    fn create(&self) -> Box<dyn MarkupRenderer> {
        self()
    }
}
