//! Canonical form of style fragments.
//!
//! Parse, flatten nesting into plain selectors, run lightningcss' minifier
//! once, print minified. The output is byte-stable for equivalent input and
//! a fixed point: canonicalizing canonical text returns it unchanged.

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Features, Targets};
use parking_lot::Mutex;

use super::StyleError;
use crate::cache::ContentCache;

/// Compile nesting away; leave every other feature as written.
fn targets() -> Targets {
    Targets {
        browsers: None,
        include: Features::Nesting,
        exclude: Features::empty(),
    }
}

pub(crate) fn printer_options<'a>() -> PrinterOptions<'a> {
    PrinterOptions {
        minify: true,
        targets: targets(),
        ..PrinterOptions::default()
    }
}

/// Canonicalize without consulting any cache.
pub fn canonicalize(fragment: &str) -> Result<String, StyleError> {
    let mut sheet = StyleSheet::parse(fragment, ParserOptions::default())
        .map_err(|e| StyleError::parse(fragment, e))?;
    sheet
        .minify(MinifyOptions {
            targets: targets(),
            ..MinifyOptions::default()
        })
        .map_err(|e| StyleError::minify(fragment, e))?;
    let printed = sheet
        .to_css(printer_options())
        .map_err(|e| StyleError::Print(e.to_string()))?;
    Ok(printed.code.trim().to_string())
}

/// Memoizing canonicalizer keyed by exact input text.
pub struct Canonicalizer {
    cache: Mutex<ContentCache<String, String>>,
}

impl Canonicalizer {
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: Mutex::new(ContentCache::new(capacity)),
        }
    }

    /// Canonical text, or empty when the fragment has no live rules.
    pub fn canonicalize(&self, fragment: &str) -> Result<String, StyleError> {
        if let Some(hit) = self.cache.lock().get(fragment) {
            return Ok(hit);
        }
        let canonical = canonicalize(fragment)?;
        self.cache
            .lock()
            .insert(fragment.to_string(), canonical.clone());
        Ok(canonical)
    }

    pub fn cache_stats(&self) -> crate::cache::CacheStats {
        self.cache.lock().stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAGMENTS: &[&str] = &[
        ".a { color: red; }",
        ".a { color: #ff0000; margin: 0px 0px 0px 0px }",
        ".card { padding: 4px; &:hover { color: blue } .title { font-weight: bold } }",
        "@media (min-width: 600px) { .a { display: none } }",
        ":root { --space: 8px } .b { margin: var(--space) }",
        ".empty {}",
        "",
    ];

    #[test]
    fn test_idempotent() {
        for fragment in FRAGMENTS {
            let once = canonicalize(fragment).unwrap();
            let twice = canonicalize(&once).unwrap();
            assert_eq!(once, twice, "fragment {fragment:?}");
        }
    }

    #[test]
    fn test_equivalent_inputs_converge() {
        assert_eq!(
            canonicalize(".a{color:red}").unwrap(),
            canonicalize(".a {\n  color: #f00;\n}\n").unwrap()
        );
    }

    #[test]
    fn test_nesting_flattened() {
        let out = canonicalize(".card { color: red; &:hover { color: blue } }").unwrap();
        assert!(out.contains(".card:hover"), "{out}");
        assert!(!out.contains('&'), "{out}");
    }

    #[test]
    fn test_dead_rules_removed() {
        assert_eq!(canonicalize(".empty {}").unwrap(), "");
        assert_eq!(canonicalize("  ").unwrap(), "");
    }

    #[test]
    fn test_cache_hits_on_repeat() {
        let canonicalizer = Canonicalizer::new(8);
        let first = canonicalizer.canonicalize(".a{color:red}").unwrap();
        let second = canonicalizer.canonicalize(".a{color:red}").unwrap();
        assert_eq!(first, second);
        assert_eq!(canonicalizer.cache_stats().hits, 1);
    }
}
