//! Command-line interface module.

mod args;
pub mod build;
pub mod dev;

pub use args::{BuildArgs, Cli};

const CHANNEL_BUFFER: usize = 32;
