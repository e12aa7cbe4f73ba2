//! Style canonicalization, variable compression and class deduplication.
//!
//! ```text
//! raw fragment ──▶ StyleSet::class_name ──▶ Canonicalizer ──▶ dedup table
//!                                                               │
//! page classes ──▶ StyleSet::subset ──▶ compress(prefix + css) ─┘
//! ```
//!
//! The canonicalizer, the shared `StyleSet` and their caches are created once
//! per orchestrator and shared by every page pipeline.

mod canonical;
mod compress;
mod dedup;
pub mod scoped;
mod symbol;

pub use canonical::Canonicalizer;
pub use compress::compress;
pub use dedup::StyleSet;
pub use symbol::SymbolAllocator;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StyleError {
    #[error("cannot parse style `{fragment}`: {message}")]
    Parse { fragment: String, message: String },

    #[error("cannot optimize style `{fragment}`: {message}")]
    Minify { fragment: String, message: String },

    #[error("cannot print style: {0}")]
    Print(String),
}

impl StyleError {
    /// Long fragments are shortened in messages.
    fn excerpt(fragment: &str) -> String {
        const MAX: usize = 120;
        match fragment.char_indices().nth(MAX) {
            Some((at, _)) => format!("{}…", &fragment[..at]),
            None => fragment.to_string(),
        }
    }

    pub(crate) fn parse(fragment: &str, message: impl ToString) -> Self {
        Self::Parse {
            fragment: Self::excerpt(fragment),
            message: message.to_string(),
        }
    }

    pub(crate) fn minify(fragment: &str, message: impl ToString) -> Self {
        Self::Minify {
            fragment: Self::excerpt(fragment),
            message: message.to_string(),
        }
    }
}
