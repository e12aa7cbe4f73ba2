//! Per-page build state machine.
//!
//! ```text
//! Idle → ClientCompiling → MarkupCompiling → Rendering → StyleFinalizing → Writing → Complete
//!   └──────────────┴────────────────┴──────────────┴──────────────┴─────────┴──▶ Aborted
//! ```
//!
//! Every rebuild starts again from `Idle`. Illegal transitions are bugs in
//! the orchestrator and panic.

use rustc_hash::FxHashMap;

use crate::core::UrlPath;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    Idle,
    ClientCompiling,
    MarkupCompiling,
    Rendering,
    StyleFinalizing,
    Writing,
    Complete,
    Aborted,
}

impl PageState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Aborted)
    }

    fn successor(self) -> Option<Self> {
        Some(match self {
            Self::Idle => Self::ClientCompiling,
            Self::ClientCompiling => Self::MarkupCompiling,
            Self::MarkupCompiling => Self::Rendering,
            Self::Rendering => Self::StyleFinalizing,
            Self::StyleFinalizing => Self::Writing,
            Self::Writing => Self::Complete,
            Self::Complete | Self::Aborted => return None,
        })
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ClientCompiling => "client",
            Self::MarkupCompiling => "markup",
            Self::Rendering => "render",
            Self::StyleFinalizing => "style",
            Self::Writing => "write",
            Self::Complete => "complete",
            Self::Aborted => "aborted",
        }
    }
}

impl std::fmt::Display for PageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Default)]
pub struct PageTracker {
    states: FxHashMap<UrlPath, PageState>,
}

impl PageTracker {
    pub fn state(&self, uri: &UrlPath) -> Option<PageState> {
        self.states.get(uri).copied()
    }

    fn current(&mut self, uri: &UrlPath) -> &mut PageState {
        self.states
            .get_mut(uri)
            .unwrap_or_else(|| panic!("page {uri} is not being built"))
    }

    /// Reset `uri` to `Idle` for a new build.
    pub fn begin(&mut self, uri: &UrlPath) {
        if let Some(state) = self.state(uri)
            && !state.is_terminal()
        {
            panic!("page {uri} restarted while {state}");
        }
        self.states.insert(uri.clone(), PageState::Idle);
    }

    /// Move to the next pipeline stage.
    pub fn advance(&mut self, uri: &UrlPath, next: PageState) {
        let state = self.current(uri);
        if next == PageState::Complete || state.successor() != Some(next) {
            panic!("page {uri}: illegal transition {state} -> {next}");
        }
        *state = next;
    }

    /// Finish a page that went through every stage.
    pub fn complete(&mut self, uri: &UrlPath) {
        let state = self.current(uri);
        match *state {
            PageState::Writing => *state = PageState::Complete,
            PageState::Complete => panic!("page {uri} completed twice"),
            // Already settled by the abort.
            PageState::Aborted => {}
            other => panic!("page {uri}: illegal transition {other} -> complete"),
        }
    }

    /// Abort from any non-terminal state. `false` if already terminal.
    pub fn abort(&mut self, uri: &UrlPath) -> bool {
        let state = self.current(uri);
        if state.is_terminal() {
            return false;
        }
        *state = PageState::Aborted;
        true
    }

    pub fn forget(&mut self, uri: &UrlPath) {
        self.states.remove(uri);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STAGES: [PageState; 5] = [
        PageState::ClientCompiling,
        PageState::MarkupCompiling,
        PageState::Rendering,
        PageState::StyleFinalizing,
        PageState::Writing,
    ];

    fn run_through(tracker: &mut PageTracker, uri: &UrlPath) {
        tracker.begin(uri);
        for stage in STAGES {
            tracker.advance(uri, stage);
        }
        tracker.complete(uri);
    }

    #[test]
    fn test_full_cycle_and_rebuild() {
        let uri = UrlPath::from_route("index");
        let mut tracker = PageTracker::default();
        run_through(&mut tracker, &uri);
        assert_eq!(tracker.state(&uri), Some(PageState::Complete));

        // A rebuild starts again from Idle.
        run_through(&mut tracker, &uri);
        assert_eq!(tracker.state(&uri), Some(PageState::Complete));
    }

    #[test]
    fn test_abort_from_any_stage() {
        let uri = UrlPath::from_route("about");
        let mut tracker = PageTracker::default();
        for (taken, _) in STAGES.iter().enumerate() {
            tracker.begin(&uri);
            for stage in &STAGES[..taken] {
                tracker.advance(&uri, *stage);
            }
            assert!(tracker.abort(&uri));
            assert_eq!(tracker.state(&uri), Some(PageState::Aborted));
            assert!(!tracker.abort(&uri));
        }
    }

    #[test]
    fn test_complete_after_abort_is_ignored() {
        let uri = UrlPath::from_route("about");
        let mut tracker = PageTracker::default();
        tracker.begin(&uri);
        tracker.abort(&uri);
        tracker.complete(&uri);
        assert_eq!(tracker.state(&uri), Some(PageState::Aborted));
    }

    #[test]
    #[should_panic(expected = "completed twice")]
    fn test_double_completion_panics() {
        let uri = UrlPath::from_route("index");
        let mut tracker = PageTracker::default();
        run_through(&mut tracker, &uri);
        tracker.complete(&uri);
    }

    #[test]
    #[should_panic(expected = "illegal transition")]
    fn test_skipping_a_stage_panics() {
        let uri = UrlPath::from_route("index");
        let mut tracker = PageTracker::default();
        tracker.begin(&uri);
        tracker.advance(&uri, PageState::Rendering);
    }

    #[test]
    #[should_panic(expected = "restarted while")]
    fn test_restart_in_flight_panics() {
        let uri = UrlPath::from_route("index");
        let mut tracker = PageTracker::default();
        tracker.begin(&uri);
        tracker.advance(&uri, PageState::ClientCompiling);
        tracker.begin(&uri);
    }
}
