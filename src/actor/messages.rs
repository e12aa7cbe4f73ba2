//! Actor Message Definitions
//!
//! ```text
//! FsActor ──FsChanged──▶ BuildActor ◀──Stage / Attach / Finished── page pipelines
//!                            ▲
//! BuildHandle ──Enqueue──────┘
//! ```

use std::path::PathBuf;

use tokio::sync::oneshot;

use super::build::{PageOutput, PageState, PipelineError};
use super::fs::FileChange;
use crate::core::UrlPath;

/// Build number the request joined, `None` when nothing was enqueued.
pub type JoinedBuild = oneshot::Sender<Option<u64>>;

/// Messages to the build orchestrator
#[derive(Debug)]
pub enum BuildMsg {
    /// Debounced file changes
    FsChanged {
        changes: Vec<FileChange>,
        reply: Option<JoinedBuild>,
    },
    /// Rebuild pages; `None` selects every known page
    Enqueue {
        pages: Option<Vec<UrlPath>>,
        reply: Option<JoinedBuild>,
    },
    /// A pipeline entered a new stage
    Stage { uri: UrlPath, state: PageState },
    /// A pipeline read these files
    Attach { uri: UrlPath, files: Vec<PathBuf> },
    /// A pipeline reached a terminal state
    Finished {
        uri: UrlPath,
        result: Result<PageOutput, PipelineError>,
    },
    /// Close the render pool and stop
    Shutdown,
}
