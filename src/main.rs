//! weft - incremental multi-page site builder with shared scoped styles.

mod actor;
mod cache;
mod cli;
mod compiler;
mod config;
mod core;
mod logger;
mod page;
mod reload;
mod render;
mod style;
mod utils;

use std::sync::Arc;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::Cli;
use config::SiteConfig;
use render::{MarkupRenderer, RendererFactory, TemplateRenderer};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    let config = Arc::new(SiteConfig::load(&cli)?);
    let renderer: Arc<dyn RendererFactory> =
        Arc::new(|| Box::new(TemplateRenderer) as Box<dyn MarkupRenderer>);

    if cli.is_dev() {
        cli::dev::run_dev(config, renderer)
    } else {
        cli::build::build_site(config, renderer).map(|_| ())
    }
}
