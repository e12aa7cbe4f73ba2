//! Development notification sink.
//!
//! The orchestrator announces every page it finishes. Delivery to connected
//! browsers is not handled here; the dev session logs updates and the
//! one-shot build counts them.

use std::sync::Arc;

use crate::core::UrlPath;
use crate::logger::ProgressLine;

pub trait Notifier: Send + Sync {
    /// A page was rebuilt and written successfully.
    fn page_updated(&self, uri: &UrlPath);

    /// A page build aborted. Its previous outputs are left in place.
    fn page_failed(&self, _uri: &UrlPath) {}
}

/// Dev session: one line per updated page.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn page_updated(&self, uri: &UrlPath) {
        crate::log!("reload"; "{}", uri);
    }
}

/// One-shot build: advances the `pages(n/total)` counter.
pub struct ProgressNotifier {
    progress: Arc<ProgressLine>,
}

impl ProgressNotifier {
    pub fn new(progress: Arc<ProgressLine>) -> Self {
        Self { progress }
    }
}

impl Notifier for ProgressNotifier {
    fn page_updated(&self, _uri: &UrlPath) {
        self.progress.inc("pages");
    }

    fn page_failed(&self, _uri: &UrlPath) {
        self.progress.inc("pages");
    }
}
