//! Build orchestrator actor.
//!
//! Owns every piece of mutable build state: the page registry, the watch
//! graph, the pending set and the per-page state machines. Page pipelines
//! run as independent tasks and talk back through messages, so all
//! mutations happen on this actor's loop.
//!
//! ```text
//!             enqueue                    all in-flight pages terminal
//! Idle ──────────────────▶ Draining ─────────────────────────────────▶ report
//!  ▲                          │  pages enqueued meanwhile wait in `pending`
//!  └──── pending empty ───────┴──── pending non-empty: next build ──▶ Draining
//! ```

mod pipeline;
mod state;


pub use pipeline::{BuildContext, PageOutput, PipelineError};
pub use state::{PageState, PageTracker};

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rustc_hash::FxHashSet;
use tokio::sync::{mpsc, oneshot, watch};

use super::fs::{ChangeKind, FileChange};
use super::messages::{BuildMsg, JoinedBuild};
use crate::cache::{PersistedDiagnostics, PersistedError, persist_diagnostics, restore_diagnostics};
use crate::compiler::{Observer, WatchGraph};
use crate::core::UrlPath;
use crate::page::{BuildRecord, PageRegistry, Removal};
use crate::utils::plural_count;

/// Whole-build outcome, published when a build drains.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Build number, 0 before the first build.
    pub number: u64,
    /// Pages the build ran, sorted.
    pub pages: Vec<UrlPath>,
    pub failed: Vec<PipelineError>,
    pub duration: Duration,
}

impl BuildReport {
    pub fn is_ok(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn summary(&self) -> String {
        let pages = plural_count(self.pages.len(), "page");
        let millis = self.duration.as_millis();
        if self.is_ok() {
            format!("build #{}: {} in {}ms", self.number, pages, millis)
        } else {
            format!(
                "build #{}: {}, {} failed in {}ms",
                self.number,
                pages,
                self.failed.len(),
                millis
            )
        }
    }
}

struct ActiveBuild {
    number: u64,
    started: Instant,
    pages: Vec<UrlPath>,
    in_flight: FxHashSet<UrlPath>,
    errors: Vec<PipelineError>,
}

enum BuildPhase {
    Idle,
    Draining(ActiveBuild),
}

pub struct BuildActor {
    rx: mpsc::Receiver<BuildMsg>,
    /// Cloned into every pipeline.
    tx: mpsc::Sender<BuildMsg>,
    ctx: Arc<BuildContext>,
    registry: PageRegistry,
    graph: WatchGraph,
    tracker: PageTracker,
    pending: BTreeSet<UrlPath>,
    phase: BuildPhase,
    builds: u64,
    /// Highest build number handed out to a waiter.
    promised: u64,
    /// Forgotten while in flight: outputs are removed once the run ends.
    orphaned: FxHashSet<UrlPath>,
    diagnostics: PersistedDiagnostics,
    reports: watch::Sender<BuildReport>,
}

/// Front door to a running `BuildActor`.
#[derive(Clone)]
pub struct BuildHandle {
    tx: mpsc::Sender<BuildMsg>,
    reports: watch::Receiver<BuildReport>,
}

impl BuildHandle {
    /// Rebuild every page and wait for the build that includes them.
    pub async fn build_all(&self) -> Option<BuildReport> {
        self.request(|reply| BuildMsg::Enqueue { pages: None, reply }).await
    }

    pub async fn rebuild(&self, pages: Vec<UrlPath>) -> Option<BuildReport> {
        self.request(|reply| BuildMsg::Enqueue { pages: Some(pages), reply }).await
    }

    /// Apply file changes; `None` when no page was affected.
    pub async fn changed(&self, changes: Vec<FileChange>) -> Option<BuildReport> {
        self.request(|reply| BuildMsg::FsChanged { changes, reply }).await
    }

    async fn request(&self, msg: impl FnOnce(Option<JoinedBuild>) -> BuildMsg) -> Option<BuildReport> {
        let (reply, joined) = oneshot::channel();
        self.tx.send(msg(Some(reply))).await.ok()?;
        let number = joined.await.ok()??;
        self.wait_for(number).await
    }

    /// Resolves once build `number` (or a later one) has drained.
    pub async fn wait_for(&self, number: u64) -> Option<BuildReport> {
        let mut reports = self.reports.clone();
        let report = reports.wait_for(|r| r.number >= number).await.ok()?;
        Some(report.clone())
    }

    pub fn latest(&self) -> BuildReport {
        self.reports.borrow().clone()
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(BuildMsg::Shutdown).await;
    }
}

impl BuildActor {
    pub fn new(
        rx: mpsc::Receiver<BuildMsg>,
        tx: mpsc::Sender<BuildMsg>,
        ctx: Arc<BuildContext>,
        registry: PageRegistry,
        observer: Box<dyn Observer>,
    ) -> (Self, BuildHandle) {
        let (reports_tx, reports_rx) = watch::channel(BuildReport::default());
        let handle = BuildHandle {
            tx: tx.clone(),
            reports: reports_rx,
        };
        // Failures of the previous session stay on record until their page rebuilds.
        let mut diagnostics = restore_diagnostics(&ctx.root).unwrap_or_else(|e| {
            crate::log!("error"; "cannot restore diagnostics: {}", e);
            PersistedDiagnostics::new()
        });
        let known: FxHashSet<String> = registry.uris().iter().map(ToString::to_string).collect();
        diagnostics.retain_pages(|uri| known.contains(uri));

        let actor = Self {
            rx,
            tx,
            ctx,
            registry,
            graph: WatchGraph::new(observer),
            tracker: PageTracker::default(),
            pending: BTreeSet::new(),
            phase: BuildPhase::Idle,
            builds: 0,
            promised: 0,
            orphaned: FxHashSet::default(),
            diagnostics,
            reports: reports_tx,
        };
        (actor, handle)
    }

    pub async fn run(mut self) {
        while let Some(msg) = self.rx.recv().await {
            match msg {
                BuildMsg::FsChanged { changes, reply } => {
                    let affected = self.apply_changes(changes);
                    self.enqueue(affected, reply);
                }
                BuildMsg::Enqueue { pages, reply } => {
                    let pages = pages.unwrap_or_else(|| self.registry.uris());
                    self.enqueue(pages, reply);
                }
                BuildMsg::Stage { uri, state } => self.tracker.advance(&uri, state),
                BuildMsg::Attach { uri, files } => {
                    for file in &files {
                        self.graph.attach(file, &uri);
                    }
                }
                BuildMsg::Finished { uri, result } => self.on_finished(uri, result),
                BuildMsg::Shutdown => break,
            }
        }
        self.ctx.pool.close();
        crate::debug!("build"; "orchestrator stopped");
    }

    /// Update the registry and resolve which pages the changes affect.
    fn apply_changes(&mut self, changes: Vec<FileChange>) -> Vec<UrlPath> {
        let mut affected = BTreeSet::new();
        for (path, kind) in changes {
            match kind {
                ChangeKind::Removed => match self.registry.remove_file(&path) {
                    Some(Removal::Updated(uri)) => {
                        affected.insert(uri);
                    }
                    Some(Removal::Forgotten(page)) => self.forget(page),
                    None => {}
                },
                ChangeKind::Created | ChangeKind::Modified => {
                    if let Some(uri) = self.registry.add_file(&path) {
                        affected.insert(uri);
                    }
                }
            }
            affected.extend(self.graph.resolve_affected(&path));
        }
        affected
            .into_iter()
            .filter(|uri| self.registry.get(uri).is_some())
            .collect()
    }

    /// Drop a page whose last source file is gone, with its outputs.
    fn forget(&mut self, page: crate::page::Page) {
        crate::log!("build"; "{} removed", page.uri);
        self.graph.detach_all(&page.uri);
        self.pending.remove(&page.uri);
        self.diagnostics.clear_for(page.uri.as_str());
        if self.is_in_flight(&page.uri) {
            self.orphaned.insert(page.uri.clone());
        } else {
            self.tracker.forget(&page.uri);
            remove_outputs(&page.current.outputs);
        }
    }

    fn is_in_flight(&self, uri: &UrlPath) -> bool {
        matches!(&self.phase, BuildPhase::Draining(build) if build.in_flight.contains(uri))
    }

    /// Add pages to the pending set; start a build unless one is draining.
    fn enqueue(&mut self, pages: Vec<UrlPath>, reply: Option<JoinedBuild>) {
        let known: Vec<UrlPath> = pages
            .into_iter()
            .filter(|uri| self.registry.get(uri).is_some())
            .collect();
        let joined = if known.is_empty() {
            None
        } else {
            self.pending.extend(known);
            self.promised = self.builds + 1;
            Some(self.promised)
        };
        if matches!(self.phase, BuildPhase::Idle) {
            self.start_build();
        }
        if let Some(reply) = reply {
            let _ = reply.send(joined);
        }
    }

    fn start_build(&mut self) {
        let pages: Vec<UrlPath> = std::mem::take(&mut self.pending)
            .into_iter()
            .filter(|uri| self.registry.get(uri).is_some())
            .collect();
        if pages.is_empty() {
            // Everything promised to a waiter was forgotten meanwhile.
            if self.promised > self.builds {
                self.builds = self.promised;
                self.reports.send_replace(BuildReport {
                    number: self.builds,
                    ..BuildReport::default()
                });
            }
            return;
        }

        self.builds += 1;
        let number = self.builds;
        crate::debug!("build"; "build #{}: {} queued", number, plural_count(pages.len(), "page"));

        for uri in &pages {
            let Some(page) = self.registry.get(uri) else {
                continue;
            };
            // Re-attached stage by stage as the pipeline reads files.
            self.graph.detach_all(uri);
            self.tracker.begin(uri);
            tokio::spawn(pipeline::run_page(
                Arc::clone(&self.ctx),
                page.clone(),
                number,
                self.tx.clone(),
            ));
        }

        self.phase = BuildPhase::Draining(ActiveBuild {
            number,
            started: Instant::now(),
            in_flight: pages.iter().cloned().collect(),
            pages,
            errors: Vec::new(),
        });
    }

    fn on_finished(&mut self, uri: UrlPath, result: Result<PageOutput, PipelineError>) {
        let BuildPhase::Draining(build) = &mut self.phase else {
            panic!("page {uri} finished outside of a build");
        };
        let number = build.number;

        let record = match result {
            Ok(output) => {
                self.tracker.complete(&uri);
                self.diagnostics.clear_for(uri.as_str());
                self.diagnostics.set_warnings(uri.as_str(), &output.warnings);
                self.ctx.notifier.page_updated(&uri);
                BuildRecord {
                    build: number,
                    failed: false,
                    outputs: output.outputs,
                    classes: output.classes,
                }
            }
            Err(err) => {
                self.tracker.abort(&uri);
                self.ctx
                    .faults
                    .lock()
                    .report(uri.as_str(), &format!("[{}] {}", err.stage, err.message));
                self.diagnostics.push_error(PersistedError::new(
                    uri.as_str(),
                    err.stage.label(),
                    err.message.as_str(),
                ));
                self.ctx.notifier.page_failed(&uri);
                build.errors.push(err);
                // Previous outputs stay in place.
                let previous = self.registry.get(&uri).map(|p| p.current.outputs.clone());
                BuildRecord {
                    build: number,
                    failed: true,
                    outputs: previous.unwrap_or_default(),
                    classes: 0,
                }
            }
        };

        if !record.failed {
            crate::debug!("page"; "{} built in #{}, {}", uri, record.build, plural_count(record.classes, "scoped style"));
        }
        if self.orphaned.remove(&uri) {
            self.tracker.forget(&uri);
            remove_outputs(&record.outputs);
        } else if let Some(page) = self.registry.get_mut(&uri) {
            page.current = record;
        }

        let BuildPhase::Draining(build) = &mut self.phase else {
            return;
        };
        build.in_flight.remove(&uri);
        if build.in_flight.is_empty() {
            self.finish_build();
        }
    }

    fn finish_build(&mut self) {
        let BuildPhase::Draining(build) = std::mem::replace(&mut self.phase, BuildPhase::Idle) else {
            return;
        };

        let mut pages = build.pages;
        pages.sort();
        let report = BuildReport {
            number: build.number,
            pages,
            failed: build.errors,
            duration: build.started.elapsed(),
        };

        crate::log!("build"; "{}", report.summary());
        let earlier: Vec<String> = self
            .registry
            .failing()
            .into_iter()
            .filter(|&(_, build)| build < report.number)
            .map(|(uri, _)| uri.to_string())
            .collect();
        if !earlier.is_empty() {
            crate::log!("build"; "{} still failing: {}", plural_count(earlier.len(), "page"), earlier.join(", "));
        }
        crate::debug!("build"; "{}, {} watched", self.ctx.cache_summary(), plural_count(self.graph.watched_count(), "file"));
        if self.ctx.mode.is_dev() {
            let warnings = self.diagnostics.warning_count();
            if report.is_ok() && warnings == 0 {
                crate::logger::status_success(&report.summary());
            } else if report.is_ok() {
                crate::logger::status_warning(&format!(
                    "{}, {}",
                    report.summary(),
                    plural_count(warnings, "style warning")
                ));
            } else {
                let detail = report
                    .failed
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("\n");
                crate::logger::status_error(&report.summary(), &detail);
            }
        }
        if let Err(e) = persist_diagnostics(&self.diagnostics, &self.ctx.root) {
            crate::log!("error"; "cannot persist diagnostics: {}", e);
        }

        self.reports.send_replace(report);

        // Pages enqueued while draining form the next build.
        if !self.pending.is_empty() || self.promised > self.builds {
            self.start_build();
        }
    }
}

fn remove_outputs(outputs: &[PathBuf]) {
    for path in outputs {
        if let Err(e) = std::fs::remove_file(path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            crate::log!("error"; "cannot remove {}: {}", path.display(), e);
        }
    }
}
