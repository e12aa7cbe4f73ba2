//! Hashing helpers.
//!
//! - `ContentHash`: blake3 digest for content-addressed caches
//! - `fingerprint`: short stable id for log cross-references

/// A 256-bit content hash (blake3 output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn of<T: AsRef<[u8]> + ?Sized>(data: &T) -> Self {
        Self(*blake3::hash(data.as_ref()).as_bytes())
    }

    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }
}

/// 8 hex chars of the blake3 digest.
#[inline]
pub fn fingerprint<T: AsRef<[u8]> + ?Sized>(value: &T) -> String {
    ContentHash::of(value).to_hex()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_stable_and_short() {
        let a = fingerprint("render failed: boom");
        assert_eq!(a.len(), 8);
        assert_eq!(a, fingerprint("render failed: boom"));
        assert_ne!(a, fingerprint("render failed: bang"));
    }

    #[test]
    fn test_content_hash_equality() {
        assert_eq!(ContentHash::of("a{color:red}"), ContentHash::of("a{color:red}"));
        assert_ne!(ContentHash::of("a"), ContentHash::of("b"));
    }
}
