//! Memoizing layers and persisted build state.
//!
//! - `ContentCache`: bounded LRU map shared by the transform and
//!   canonicalization layers
//! - `CachedTransform`: per-hook caching decorator around a `Transform`
//! - `FaultLog`: fingerprints pipeline errors so repeats log once
//! - diagnostics persistence under `.weft/`

mod failure;
mod fault;
mod content;
mod transform;

/// Cache directory name (inside project root)
pub(crate) const CACHE_DIR: &str = ".weft";

pub use failure::{PersistedDiagnostics, PersistedError, persist_diagnostics, restore_diagnostics};
pub use fault::FaultLog;
pub use content::{CacheStats, ContentCache};
pub use transform::CachedTransform;
