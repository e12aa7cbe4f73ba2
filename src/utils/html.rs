//! HTML text helpers: attribute escaping and tag-relative insertion.

use std::borrow::Cow;

#[inline]
fn escape_char(c: char) -> Option<&'static str> {
    match c {
        '<' => Some("&lt;"),
        '>' => Some("&gt;"),
        '&' => Some("&amp;"),
        '"' => Some("&quot;"),
        '\'' => Some("&#39;"),
        _ => None,
    }
}

/// Escape an attribute value. Borrows when nothing needs escaping.
pub fn escape_attr(s: &str) -> Cow<'_, str> {
    if !s.contains(['<', '>', '&', '"', '\'']) {
        return Cow::Borrowed(s);
    }
    let mut result = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match escape_char(c) {
            Some(entity) => result.push_str(entity),
            None => result.push(c),
        }
    }
    Cow::Owned(result)
}

/// Decode the entities that can appear in a quoted attribute value.
pub fn unescape(s: &str) -> Cow<'_, str> {
    if !s.contains('&') {
        return Cow::Borrowed(s);
    }

    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        result.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let Some(semi) = tail.find(';').filter(|&i| i <= 10) else {
            result.push('&');
            rest = &tail[1..];
            continue;
        };
        let entity = &tail[1..semi];
        let decoded = match entity {
            "lt" => Some('<'),
            "gt" => Some('>'),
            "amp" => Some('&'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            e if e.starts_with("#x") || e.starts_with("#X") => {
                u32::from_str_radix(&e[2..], 16).ok().and_then(char::from_u32)
            }
            e if e.starts_with('#') => e[1..].parse().ok().and_then(char::from_u32),
            _ => None,
        };
        match decoded {
            Some(c) => {
                result.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                result.push('&');
                rest = &tail[1..];
            }
        }
    }
    result.push_str(rest);
    Cow::Owned(result)
}

/// Insert `content` right before the last `</tag>` (ASCII case-insensitive).
///
/// Falls back to `fallback` when the closing tag is missing.
pub fn insert_before_close(markup: &str, tag: &str, content: &str, fallback: Fallback) -> String {
    let needle = format!("</{}", tag.to_ascii_lowercase());
    let lower = markup.to_ascii_lowercase();
    let mut out = String::with_capacity(markup.len() + content.len());
    match lower.rfind(&needle) {
        Some(at) => {
            out.push_str(&markup[..at]);
            out.push_str(content);
            out.push_str(&markup[at..]);
        }
        None if fallback == Fallback::Prepend => {
            out.push_str(content);
            out.push_str(markup);
        }
        None => {
            out.push_str(markup);
            out.push_str(content);
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    Prepend,
    Append,
}
