//! Small shared helpers: hashing, paths, HTML text.

pub mod hash;
pub mod html;
pub mod path;

/// `1 page`, `3 pages`.
pub fn plural_count(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}
