//! Actor Coordinator - wires up the dev-mode actor system.
//!
//! The Coordinator is a thin orchestrator that:
//! - Creates communication channels
//! - Starts the watcher before the first build
//! - Runs the actors until Ctrl+C

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam::channel::Receiver;
use tokio::sync::mpsc;

use super::build::{BuildActor, BuildContext};
use super::fs::FsActor;
use super::messages::BuildMsg;
use crate::config::SiteConfig;
use crate::core::BuildMode;
use crate::page::scan_sources;
use crate::reload::LogNotifier;
use crate::render::RendererFactory;
use crate::utils::plural_count;

const CHANNEL_BUFFER: usize = 32;

pub struct Coordinator {
    config: Arc<SiteConfig>,
    renderer: Arc<dyn RendererFactory>,
    shutdown_rx: Option<Receiver<()>>,
}

impl Coordinator {
    pub fn new(config: Arc<SiteConfig>, renderer: Arc<dyn RendererFactory>) -> Self {
        Self {
            config,
            renderer,
            shutdown_rx: None,
        }
    }

    /// Set shutdown signal receiver.
    pub fn with_shutdown_signal(mut self, rx: Receiver<()>) -> Self {
        self.shutdown_rx = Some(rx);
        self
    }

    /// Run the actor system.
    pub async fn run(mut self) -> Result<()> {
        // Configuration errors end the session before anything starts.
        let registry = scan_sources(&self.config)?;
        crate::log!("dev"; "{} in {}", plural_count(registry.len(), "page"),
            self.config.root_relative(&self.config.build.source).display());

        let (build_tx, build_rx) = mpsc::channel::<BuildMsg>(CHANNEL_BUFFER);

        let debounce = Duration::from_millis(self.config.dev.debounce_ms);
        let (fs_actor, observer) = FsActor::new(
            vec![self.config.build.source.clone()],
            build_tx.clone(),
            debounce,
        )
        .context("watcher failed")?;

        let ctx = BuildContext::new(
            &self.config,
            BuildMode::DEVELOPMENT,
            Arc::clone(&self.renderer),
            Arc::new(LogNotifier),
        )?;
        let (build_actor, handle) = BuildActor::new(
            build_rx,
            build_tx,
            Arc::new(ctx),
            registry,
            Box::new(observer),
        );

        crate::debug!("actor"; "start");
        let build_handle = tokio::spawn(async move { build_actor.run().await });
        let fs_handle = tokio::spawn(async move { fs_actor.run().await });

        // The watcher is already live: edits during this build queue the next one.
        handle.build_all().await;
        crate::log!("watch"; "watching for changes, Ctrl+C to stop");

        if let Some(rx) = self.shutdown_rx.take() {
            loop {
                if rx.try_recv().is_ok() || crate::core::is_shutdown() {
                    crate::debug!("actor"; "shutdown signal received");
                    break;
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        } else {
            let _ = fs_handle.await;
        }

        let last = handle.latest();
        handle.shutdown().await;
        let _ = tokio::time::timeout(Duration::from_millis(500), build_handle).await;
        crate::debug!("actor"; "stopped after build #{}", last.number);
        Ok(())
    }
}
