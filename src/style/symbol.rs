//! Short symbol allocation.
//!
//! Symbols are the digits of a non-negative index in base 52 over ASCII
//! letters, most significant first: `0 → a`, `51 → Z`, `52 → ba`. Negative
//! indices carry a `-` prefix. Every symbol starts with a letter, so it is
//! usable both as a class name and as a custom-property suffix.

use rustc_hash::FxHashSet;

const ALPHABET: &[u8; 52] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const BASE: u64 = ALPHABET.len() as u64;

pub fn symbol(index: i64) -> String {
    let mut n = index.unsigned_abs();
    let mut digits = Vec::new();
    loop {
        digits.push(ALPHABET[(n % BASE) as usize]);
        n /= BASE;
        if n == 0 {
            break;
        }
    }
    if index < 0 {
        digits.push(b'-');
    }
    digits.reverse();
    // ALPHABET and '-' are ASCII.
    String::from_utf8(digits).unwrap_or_default()
}

/// Hands out symbols in index order, skipping reserved names.
#[derive(Debug, Default, Clone)]
pub struct SymbolAllocator {
    next: i64,
    reserved: FxHashSet<String>,
}

impl SymbolAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reserve(&mut self, name: impl Into<String>) {
        self.reserved.insert(name.into());
    }

    /// The symbol the next `take` returns.
    pub fn peek(&mut self) -> String {
        loop {
            let candidate = symbol(self.next);
            if !self.reserved.contains(&candidate) {
                return candidate;
            }
            self.next += 1;
        }
    }

    pub fn take(&mut self) -> String {
        let taken = self.peek();
        self.next += 1;
        taken
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Inverse of [`symbol`].
    fn index_of(symbol: &str) -> Option<i64> {
        let (negative, digits) = match symbol.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, symbol),
        };
        if digits.is_empty() || (digits.len() > 1 && digits.starts_with('a')) {
            return None;
        }
        let mut value: i64 = 0;
        for byte in digits.bytes() {
            let digit = ALPHABET.iter().position(|&b| b == byte)? as i64;
            value = value.checked_mul(BASE as i64)?.checked_add(digit)?;
        }
        Some(if negative { -value } else { value })
    }

    #[test]
    fn test_symbol_digits() {
        assert_eq!(symbol(0), "a");
        assert_eq!(symbol(25), "z");
        assert_eq!(symbol(26), "A");
        assert_eq!(symbol(51), "Z");
        assert_eq!(symbol(52), "ba");
        assert_eq!(symbol(52 * 52), "baa");
        assert_eq!(symbol(-1), "-b");
    }

    #[test]
    fn test_bijection() {
        for index in -200..3000 {
            assert_eq!(index_of(&symbol(index)), Some(index), "index {index}");
        }
        assert_eq!(index_of("aa"), None);
        assert_eq!(index_of(""), None);
        assert_eq!(index_of("a1"), None);
    }

    #[test]
    fn test_length_grows_with_index() {
        assert!(symbol(51).len() < symbol(52).len());
        assert!((0..52).all(|i| symbol(i).len() == 1));
    }

    #[test]
    fn test_allocator_skips_reserved() {
        let mut symbols = SymbolAllocator::new();
        symbols.reserve("a");
        symbols.reserve("c");
        assert_eq!(symbols.peek(), "b");
        assert_eq!(symbols.peek(), "b");
        assert_eq!(symbols.take(), "b");
        assert_eq!(symbols.take(), "d");
    }
}
