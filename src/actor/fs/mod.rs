//! FileSystem Actor
//!
//! Watches the page source tree and every file pages are found to read,
//! and sends debounced change batches to the build orchestrator.
//! Implements the "Watcher-First" pattern: the watcher is live before the
//! first build starts, so no change made during that build is lost.
//!
//! ```text
//! notify ──▶ Debouncer ──▶ BuildMsg::FsChanged
//!   ▲
//!   └── FsObserver (WatchGraph attaches a file for the first time)
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::RecommendedWatcher;
use tokio::sync::mpsc;

use super::messages::BuildMsg;
use crate::compiler::Observer;

// Pure timing and deduplication.
mod debouncer;
// Shared fs event types.
mod types;
// Watch root attach/re-attach lifecycle.
mod watch_roots;

#[cfg(test)]
mod tests;

pub use types::{ChangeKind, FileChange};

use debouncer::Debouncer;
use watch_roots::WatchRoots;

/// Forwards first-time watch graph attachments to the fs actor.
pub struct FsObserver {
    tx: mpsc::UnboundedSender<PathBuf>,
}

impl Observer for FsObserver {
    fn observe(&mut self, path: &Path) {
        let _ = self.tx.send(path.to_path_buf());
    }
}

/// FileSystem Actor - watches for file changes
pub struct FsActor {
    /// Channel to receive notify events (sync -> async bridge)
    notify_rx: std::sync::mpsc::Receiver<notify::Result<notify::Event>>,
    /// Watcher handle (must be kept alive)
    watcher: RecommendedWatcher,
    watch_roots: WatchRoots,
    /// Files the build started reading
    observe_rx: mpsc::UnboundedReceiver<PathBuf>,
    build_tx: mpsc::Sender<BuildMsg>,
    debouncer: Debouncer,
}

impl FsActor {
    /// Start watching `roots` immediately; events buffer until `run`.
    pub fn new(
        roots: Vec<PathBuf>,
        build_tx: mpsc::Sender<BuildMsg>,
        debounce: Duration,
    ) -> notify::Result<(Self, FsObserver)> {
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = notify_tx.send(res);
        })?;

        let mut watch_roots = WatchRoots::new(roots);
        watch_roots.attach_existing(&mut watcher)?;

        let (observe_tx, observe_rx) = mpsc::unbounded_channel();
        let actor = Self {
            notify_rx,
            watcher,
            watch_roots,
            observe_rx,
            build_tx,
            debouncer: Debouncer::new(debounce),
        };
        Ok((actor, FsObserver { tx: observe_tx }))
    }

    /// Run the actor event loop until the orchestrator goes away.
    pub async fn run(self) {
        let Self {
            notify_rx,
            mut watcher,
            mut watch_roots,
            mut observe_rx,
            build_tx,
            mut debouncer,
        } = self;

        let (async_tx, mut async_rx) = mpsc::channel::<notify::Event>(64);

        // notify delivers on a std channel; bridge it from a plain thread
        std::thread::spawn(move || {
            while let Ok(result) = notify_rx.recv() {
                match result {
                    Ok(event) => {
                        if async_tx.blocking_send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => crate::log!("watch"; "notify error: {}", e),
                }
            }
        });

        loop {
            tokio::select! {
                biased;
                Some(path) = observe_rx.recv() => watch_roots.add_file(path, &mut watcher),
                Some(event) = async_rx.recv() => debouncer.add_event(&event),
                _ = tokio::time::sleep(debouncer.sleep_duration()) => {
                    watch_roots.maintain(&mut watcher);
                    let Some(changes) = debouncer.take_if_ready() else {
                        continue;
                    };
                    crate::debug!("watch"; "{} changed", crate::utils::plural_count(changes.len(), "file"));
                    let msg = BuildMsg::FsChanged { changes, reply: None };
                    if build_tx.send(msg).await.is_err() {
                        break;
                    }
                }
            }
        }
    }
}
