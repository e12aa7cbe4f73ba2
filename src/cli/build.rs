//! One-shot production build.
//!
//! Scan → build every page → summary. Any page failure is reported and
//! turns into a non-zero exit once diagnostics are persisted.

use std::sync::Arc;

use anyhow::{Result, bail};
use tokio::sync::mpsc;

use crate::actor::{BuildActor, BuildContext, BuildReport};
use crate::compiler::NoopObserver;
use crate::config::SiteConfig;
use crate::core::BuildMode;
use crate::logger::ProgressLine;
use crate::page::scan_sources;
use crate::reload::ProgressNotifier;
use crate::render::RendererFactory;
use crate::utils::plural_count;

/// Build every page once. Fails when any page failed.
pub fn build_site(config: Arc<SiteConfig>, renderer: Arc<dyn RendererFactory>) -> Result<BuildReport> {
    let registry = scan_sources(&config)?;
    if registry.is_empty() {
        crate::log!("build"; "no pages in {}", config.root_relative(&config.build.source).display());
        return Ok(BuildReport::default());
    }

    let mode = BuildMode::PRODUCTION.with_minify(config.build.minify);
    let progress = Arc::new(ProgressLine::new(&[("pages", registry.len())]));

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let report = rt.block_on(async {
        let notifier = Arc::new(ProgressNotifier::new(Arc::clone(&progress)));
        let ctx = BuildContext::new(&config, mode, renderer, notifier)?;
        let (tx, rx) = mpsc::channel(super::CHANNEL_BUFFER);
        let (actor, handle) = BuildActor::new(rx, tx, Arc::new(ctx), registry, Box::new(NoopObserver));
        let actor = tokio::spawn(actor.run());

        let report = handle.build_all().await;
        handle.shutdown().await;
        let _ = actor.await;
        anyhow::Ok(report.unwrap_or_default())
    })?;

    if let Ok(progress) = Arc::try_unwrap(progress) {
        progress.finish();
    }

    if !report.is_ok() {
        for error in &report.failed {
            crate::log!("error"; "{}", error);
        }
        bail!(
            "{} failed, see {}",
            plural_count(report.failed.len(), "page"),
            config.root_relative(config.cache_dir().join("diagnostics.json")).display()
        );
    }
    Ok(report)
}
