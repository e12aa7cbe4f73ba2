//! Core types shared across the build engine.

mod mode;
mod route;
mod state;

pub use mode::BuildMode;
pub use route::{PageFile, PageFileKind, UrlPath};
pub use state::{is_shutdown, setup_shutdown_handler};
