//! Scoped styles and hoisted scripts in rendered markup.
//!
//! - `css="..."` on any element declares a scoped style fragment; it is
//!   replaced by the fragment's shared class
//! - `<script hoist>...</script>` blocks are lifted out of the markup and
//!   appended to the page's client script
//!
//! Tags are located with `tl`; comments and the content of raw text elements
//! (`<script>`, `<style>`, `<textarea>`, `<title>`) are skipped.

use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;
use rustc_hash::FxHashSet;

use crate::utils::html::{escape_attr, unescape};

const SCOPED_ATTR: &str = "css";

struct Attr<'a> {
    name: &'a str,
    /// Still entity-encoded.
    value: Option<&'a str>,
    raw: &'a str,
}

struct StartTag<'a> {
    range: Range<usize>,
    name: &'a str,
    attrs: Vec<Attr<'a>>,
    self_closing: bool,
}

impl StartTag<'_> {
    fn attr(&self, name: &str) -> Option<&Attr<'_>> {
        self.attrs
            .iter()
            .find(|attr| attr.name.eq_ignore_ascii_case(name))
    }
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b':' | b'_')
}

/// Split the start tag at `start` (pointing at `<`) into verbatim attribute
/// spans. `None` when malformed.
fn parse_tag(markup: &str, start: usize) -> Option<StartTag<'_>> {
    let bytes = markup.as_bytes();
    let mut i = start + 1;
    while i < bytes.len() && is_name_byte(bytes[i]) {
        i += 1;
    }
    let name = &markup[start + 1..i];
    let mut attrs = Vec::new();

    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        match bytes.get(i)? {
            b'>' => {
                return Some(StartTag {
                    range: start..i + 1,
                    name,
                    attrs,
                    self_closing: false,
                });
            }
            b'/' if bytes.get(i + 1) == Some(&b'>') => {
                return Some(StartTag {
                    range: start..i + 2,
                    name,
                    attrs,
                    self_closing: true,
                });
            }
            _ => {}
        }

        let attr_start = i;
        while i < bytes.len()
            && !bytes[i].is_ascii_whitespace()
            && !matches!(bytes[i], b'=' | b'>')
            && !(bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'>'))
        {
            i += 1;
        }
        let attr_name = &markup[attr_start..i];
        if attr_name.is_empty() {
            // Stray `=`; skip it.
            i += 1;
            continue;
        }

        let mut j = i;
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        let mut value = None;
        if bytes.get(j) == Some(&b'=') {
            j += 1;
            while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                j += 1;
            }
            let quote = *bytes.get(j)?;
            if quote == b'"' || quote == b'\'' {
                let close = markup[j + 1..].find(quote as char)? + j + 1;
                value = Some(&markup[j + 1..close]);
                i = close + 1;
            } else {
                let value_start = j;
                while j < bytes.len() && !bytes[j].is_ascii_whitespace() && bytes[j] != b'>' {
                    j += 1;
                }
                value = Some(&markup[value_start..j]);
                i = j;
            }
        }

        attrs.push(Attr {
            name: attr_name,
            value,
            raw: &markup[attr_start..i],
        });
    }
}

/// Elements whose content is text, not markup.
const RAW_TEXT: [&str; 4] = ["script", "style", "textarea", "title"];

/// Every start tag outside comments and raw text elements, in source order.
fn start_tags(markup: &str) -> Vec<StartTag<'_>> {
    let Ok(dom) = tl::parse(markup, tl::ParserOptions::default()) else {
        return Vec::new();
    };
    let parser = dom.parser();
    let mut starts: Vec<usize> = dom
        .nodes()
        .iter()
        .filter_map(|node| node.as_tag())
        .map(|tag| tag.boundaries(parser).0)
        .filter(|&start| {
            markup.as_bytes().get(start) == Some(&b'<')
                && markup.as_bytes().get(start + 1).is_some_and(u8::is_ascii_alphabetic)
        })
        .collect();
    starts.sort_unstable();
    starts.dedup();

    let lower = markup.to_ascii_lowercase();
    let mut tags = Vec::with_capacity(starts.len());
    let mut skip_until = 0;
    for start in starts {
        if start < skip_until {
            continue;
        }
        let Some(tag) = parse_tag(markup, start) else {
            continue;
        };
        if let Some(raw) = RAW_TEXT.into_iter().find(|raw| tag.name.eq_ignore_ascii_case(raw))
            && !tag.self_closing
        {
            let close = format!("</{raw}");
            let end = tag.range.end;
            skip_until = lower[end..].find(&close).map_or(markup.len(), |at| end + at);
        }
        tags.push(tag);
    }
    tags
}

/// Replace every `css="..."` attribute by the class `resolve` returns for
/// its fragment. `None` drops the attribute without adding a class.
pub fn scope_styles<E>(
    markup: &str,
    mut resolve: impl FnMut(&str) -> Result<Option<String>, E>,
) -> Result<String, E> {
    let mut out = String::with_capacity(markup.len());
    let mut cursor = 0;

    for tag in start_tags(markup) {
        let Some(scoped) = tag.attr(SCOPED_ATTR) else {
            continue;
        };
        let fragment = unescape(scoped.value.unwrap_or(""));
        let class = resolve(&fragment)?;

        out.push_str(&markup[cursor..tag.range.start]);
        out.push('<');
        out.push_str(tag.name);

        let mut class_written = false;
        for attr in &tag.attrs {
            if attr.name.eq_ignore_ascii_case(SCOPED_ATTR) {
                continue;
            }
            out.push(' ');
            match (&class, attr.name.eq_ignore_ascii_case("class")) {
                (Some(class), true) if !class_written => {
                    let existing = unescape(attr.value.unwrap_or(""));
                    let joined = if existing.trim().is_empty() {
                        class.clone()
                    } else {
                        format!("{} {class}", existing.trim())
                    };
                    out.push_str(&format!("class=\"{}\"", escape_attr(&joined)));
                    class_written = true;
                }
                _ => out.push_str(attr.raw),
            }
        }
        if let Some(class) = &class
            && !class_written
        {
            out.push_str(&format!(" class=\"{}\"", escape_attr(class)));
        }
        out.push_str(if tag.self_closing { "/>" } else { ">" });
        cursor = tag.range.end;
    }

    out.push_str(&markup[cursor..]);
    Ok(out)
}

fn hoist_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<script[ \t\n]+hoist(?:[ \t\n][^>]*)?>(.*?)</script>")
            .expect("hoist pattern is valid")
    })
}

/// Lift `<script hoist>` blocks out of the markup.
pub fn lift_hoisted_scripts(markup: &str) -> (String, Vec<String>) {
    let mut scripts = Vec::new();
    let stripped = hoist_regex().replace_all(markup, |caps: &regex::Captures<'_>| {
        let body = caps[1].trim();
        if !body.is_empty() {
            scripts.push(body.to_string());
        }
        String::new()
    });
    (stripped.into_owned(), scripts)
}

fn is_class_byte(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Words inside string literals of a script. Over-inclusion only keeps an
/// unused class in the page, so quotes inside comments or regexes are not
/// special-cased.
fn string_literal_words(script: &str, words: &mut FxHashSet<String>) {
    let mut chars = script.char_indices();
    while let Some((start, c)) = chars.next() {
        if !matches!(c, '"' | '\'' | '`') {
            continue;
        }
        let mut end = script.len();
        let mut escaped = false;
        for (at, next) in chars.by_ref() {
            if escaped {
                escaped = false;
            } else if next == '\\' {
                escaped = true;
            } else if next == c {
                end = at;
                break;
            }
        }
        let literal = &script[start + c.len_utf8()..end];
        words.extend(
            literal
                .split(|ch: char| !is_class_byte(ch))
                .filter(|word| !word.is_empty())
                .map(str::to_string),
        );
    }
}

/// Classes a page may use: `class` tokens of its markup plus words in string
/// literals of its client script.
pub fn referenced_classes(markup: &str, script: &str) -> FxHashSet<String> {
    let mut classes = FxHashSet::default();
    for tag in start_tags(markup) {
        if let Some(value) = tag.attr("class").and_then(|attr| attr.value) {
            classes.extend(unescape(value).split_ascii_whitespace().map(str::to_string));
        }
    }
    string_literal_words(script, &mut classes);
    classes
}

fn selector_class_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\.(-?[A-Za-z_][A-Za-z0-9_-]*)").expect("class selector pattern is valid")
    })
}

/// Class names a hand-authored stylesheet defines. Dots inside values and
/// urls match too; an extra name only stays unallocated.
pub fn stylesheet_classes(css: &str) -> FxHashSet<String> {
    selector_class_regex()
        .captures_iter(css)
        .map(|caps| caps[1].to_string())
        .collect()
}
