//! `weft dev`: watch session.

use std::sync::Arc;

use anyhow::Result;

use crate::actor::Coordinator;
use crate::config::SiteConfig;
use crate::render::RendererFactory;

/// Run until Ctrl+C. Page errors never end the session.
pub fn run_dev(config: Arc<SiteConfig>, renderer: Arc<dyn RendererFactory>) -> Result<()> {
    let shutdown_rx = crate::core::setup_shutdown_handler()?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;

    rt.block_on(async {
        Coordinator::new(config, renderer)
            .with_shutdown_signal(shutdown_rx)
            .run()
            .await
    })
}
