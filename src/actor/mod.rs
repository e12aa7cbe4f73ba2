//! Actor system for incremental builds.
//!
//! ```text
//! FsActor ──FsChanged──▶ BuildActor ──spawn──▶ page pipelines ──▶ WorkerPool
//! (watch)                (orchestrate)          (per page)          (render)
//! ```
//!
//! - `messages` - Message types for inter-actor communication
//! - `fs` - File system watcher with debouncing
//! - `build` - Build orchestrator, page pipeline and state machine
//! - `coordinator` - Wires up and runs actors

pub mod build;
pub mod coordinator;
pub mod fs;
pub mod messages;

pub use build::{BuildActor, BuildContext, BuildReport};
pub use coordinator::Coordinator;
