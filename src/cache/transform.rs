//! Caching decorator for transform hooks.
//!
//! Each hook has its own bounded cache keyed by the file path and the
//! blake3 hash of its input, so identical inputs skip oxc entirely across
//! pages and across rebuilds. Errors are never cached.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::ContentCache;
use crate::compiler::{Transform, TransformError, Transformed};
use crate::core::BuildMode;
use crate::utils::hash::ContentHash;

type Key = (PathBuf, ContentHash);

pub struct CachedTransform<T> {
    inner: T,
    transformed: Mutex<ContentCache<Key, Transformed>>,
    chunks: Mutex<ContentCache<(Key, BuildMode), String>>,
}

impl<T: Transform> CachedTransform<T> {
    pub fn new(inner: T, capacity: usize) -> Self {
        Self {
            inner,
            transformed: Mutex::new(ContentCache::new(capacity)),
            chunks: Mutex::new(ContentCache::new(capacity)),
        }
    }

    /// (transform hits, render_chunk hits)
    pub fn hits(&self) -> (u64, u64) {
        (
            self.transformed.lock().stats().hits,
            self.chunks.lock().stats().hits,
        )
    }
}

impl<T: Transform> Transform for CachedTransform<T> {
    fn transform(&self, path: &Path, source: &str) -> Result<Transformed, TransformError> {
        let key = (path.to_path_buf(), ContentHash::of(source));
        if let Some(hit) = self.transformed.lock().get(&key) {
            return Ok(hit);
        }
        let out = self.inner.transform(path, source)?;
        self.transformed.lock().insert(key, out.clone());
        Ok(out)
    }

    fn render_chunk(
        &self,
        path: &Path,
        code: &str,
        mode: BuildMode,
    ) -> Result<String, TransformError> {
        let key = ((path.to_path_buf(), ContentHash::of(code)), mode);
        if let Some(hit) = self.chunks.lock().get(&key) {
            return Ok(hit);
        }
        let out = self.inner.render_chunk(path, code, mode)?;
        self.chunks.lock().insert(key, out.clone());
        Ok(out)
    }
}
