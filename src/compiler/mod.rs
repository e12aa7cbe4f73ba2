//! Page compilation collaborators.
//!
//! ```text
//! compiler/
//! ├── dependency.rs  # WatchGraph: file → pages index
//! ├── transform.rs   # Transform hooks + SourceTransform
//! ├── script.rs      # oxc module rewrite and minify
//! ├── asset.rs       # AssetResolver (`?raw` imports)
//! └── bundle.rs      # Bundler: entry → chunk + watch files
//! ```

pub mod asset;
pub mod bundle;
pub mod dependency;
mod script;
pub mod transform;

pub use asset::RawAssets;
pub use bundle::{Bundle, Bundler, SourceMap};
pub use dependency::{NoopObserver, Observer, WatchGraph};
pub use transform::{SourceTransform, Transform, TransformError, Transformed};
