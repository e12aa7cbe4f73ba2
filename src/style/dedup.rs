//! Shared style deduplication set.
//!
//! A raw fragment (`color:red`) is wrapped in a placeholder class selector,
//! canonicalized, and looked up by its canonical text. Fragments with equal
//! canonical text share one class; a miss allocates the next short name.
//! Allocation order is stable for the lifetime of the set, so the first
//! fragments seen get the shortest names.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use super::{Canonicalizer, StyleError, SymbolAllocator};

/// Stands in for the placeholder selector in lookup keys. Never printed by
/// the canonicalizer.
const KEY_PLACEHOLDER: &str = "\u{0}";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    class: String,
    css: String,
}

#[derive(Clone)]
pub struct StyleSet {
    canonicalizer: Arc<Canonicalizer>,
    /// Lookup key → entry.
    entries: FxHashMap<String, Entry>,
    /// Keys in allocation order.
    order: Vec<String>,
    allocated: FxHashSet<String>,
    symbols: SymbolAllocator,
}

/// Shortest run of `_` absent from `fragment`.
fn sentinel(fragment: &str) -> String {
    let mut sentinel = String::from("_");
    while fragment.contains(&sentinel) {
        sentinel.push('_');
    }
    sentinel
}

impl StyleSet {
    pub fn new(canonicalizer: Arc<Canonicalizer>) -> Self {
        Self {
            canonicalizer,
            entries: FxHashMap::default(),
            order: Vec::new(),
            allocated: FxHashSet::default(),
            symbols: SymbolAllocator::new(),
        }
    }

    /// Never allocate these names (classes of hand-authored styles).
    pub fn reserve<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.symbols.reserve(name);
        }
    }

    /// Class for `fragment`, allocating one on first sight.
    ///
    /// `None` when the fragment canonicalizes to nothing.
    pub fn class_name(&mut self, fragment: &str) -> Result<Option<String>, StyleError> {
        let sentinel = sentinel(fragment);
        let selector = format!(".{sentinel}");
        let canonical = self
            .canonicalizer
            .canonicalize(&format!("{selector}{{{fragment}}}"))?;
        if canonical.is_empty() {
            return Ok(None);
        }

        let key = canonical.replace(&selector, KEY_PLACEHOLDER);
        if let Some(entry) = self.entries.get(&key) {
            return Ok(Some(entry.class.clone()));
        }

        let class = loop {
            let candidate = self.symbols.take();
            if !self.allocated.contains(&candidate) {
                break candidate;
            }
        };
        let css = canonical.replace(&selector, &format!(".{class}"));
        crate::debug!("style"; "allocated .{} for {}", class, css);

        self.allocated.insert(class.clone());
        self.entries.insert(
            key.clone(),
            Entry {
                class: class.clone(),
                css,
            },
        );
        self.order.push(key);
        Ok(Some(class))
    }

    /// A new set holding only entries whose class is in `classes`.
    pub fn subset<'a, I>(&self, classes: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let wanted: FxHashSet<&str> = classes.into_iter().collect();
        let order: Vec<String> = self
            .order
            .iter()
            .filter(|key| {
                self.entries
                    .get(*key)
                    .is_some_and(|entry| wanted.contains(entry.class.as_str()))
            })
            .cloned()
            .collect();
        let entries = order
            .iter()
            .filter_map(|key| Some((key.clone(), self.entries.get(key)?.clone())))
            .collect();

        Self {
            canonicalizer: Arc::clone(&self.canonicalizer),
            entries,
            order,
            allocated: self.allocated.clone(),
            symbols: self.symbols.clone(),
        }
    }

    /// Final css of every entry, in allocation order.
    pub fn css(&self) -> String {
        self.order
            .iter()
            .filter_map(|key| self.entries.get(key))
            .map(|entry| entry.css.as_str())
            .collect()
    }

    #[cfg(test)]
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.order
            .iter()
            .filter_map(|key| self.entries.get(key))
            .map(|entry| entry.class.as_str())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set() -> StyleSet {
        StyleSet::new(Arc::new(Canonicalizer::new(64)))
    }

    #[test]
    fn test_sentinel_absent_from_fragment() {
        assert_eq!(sentinel("color:red"), "_");
        assert_eq!(sentinel("content:'_'"), "__");
        assert_eq!(sentinel("a__b_"), "___");
    }

    #[test]
    fn test_equivalent_fragments_share_class() {
        let mut styles = set();
        let a = styles.class_name("color:red").unwrap();
        let b = styles.class_name("color: #ff0000;").unwrap();
        assert_eq!(a, Some("a".to_string()));
        assert_eq!(a, b);
        assert_eq!(styles.len(), 1);
    }

    #[test]
    fn test_identity_independent_of_sentinel_length() {
        let mut styles = set();
        // The comment forces a longer sentinel but disappears in canonical form.
        let a = styles.class_name("color:red/* _ */").unwrap();
        let b = styles.class_name("color:red").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_distinct_fragments_get_distinct_classes() {
        let mut styles = set();
        assert_eq!(styles.class_name("color:red").unwrap().as_deref(), Some("a"));
        assert_eq!(styles.class_name("color:green").unwrap().as_deref(), Some("b"));
        assert_eq!(styles.css(), ".a{color:red}.b{color:green}");
    }

    #[test]
    fn test_reserved_names_skipped() {
        let mut styles = set();
        styles.reserve(["a", "b"]);
        assert_eq!(styles.class_name("color:red").unwrap().as_deref(), Some("c"));
    }

    #[test]
    fn test_empty_fragment_has_no_class() {
        let mut styles = set();
        assert_eq!(styles.class_name("").unwrap(), None);
        assert_eq!(styles.class_name("  ").unwrap(), None);
        assert!(styles.is_empty());
    }

    #[test]
    fn test_nested_fragment_renamed_throughout() {
        let mut styles = set();
        let class = styles
            .class_name("color:red;&:hover{color:green}")
            .unwrap()
            .unwrap();
        let css = styles.css();
        assert!(css.contains(&format!(".{class}{{color:red}}")), "{css}");
        assert!(css.contains(&format!(".{class}:hover{{color:green}}")), "{css}");
        assert!(!css.contains('_'), "{css}");
    }

    #[test]
    fn test_subset_keeps_allocation_and_order() {
        let mut styles = set();
        styles.class_name("color:red").unwrap();
        styles.class_name("color:green").unwrap();
        styles.class_name("margin:0").unwrap();

        let subset = styles.subset(["c", "a", "zz"]);
        assert_eq!(subset.classes().collect::<Vec<_>>(), vec!["a", "c"]);
        assert_eq!(subset.css(), ".a{color:red}.c{margin:0}");
        // The parent set is untouched.
        assert_eq!(styles.len(), 3);
    }

    #[test]
    fn test_names_are_immutable_once_allocated() {
        let mut styles = set();
        let first = styles.class_name("color:red").unwrap();
        styles.class_name("color:green").unwrap();
        styles.reserve(["a"]);
        assert_eq!(styles.class_name("color:red").unwrap(), first);
    }
}
