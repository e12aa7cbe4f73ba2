//! Custom-property compression.
//!
//! Three passes over a parsed stylesheet:
//!
//! 1. collect every `--name: value` declaration; identical re-declarations
//!    count once, differing ones make the variable multi-valued
//! 2. count `var(--name)` references, warning on undeclared names
//! 3. drop unused declarations, along with the references they made, until
//!    nothing else becomes unused; then visit variables by use count
//!    (descending, ties in declaration order) and either inline the value
//!    at every reference or rename the variable to the next short symbol
//!
//! Cost model for a single-valued variable used `n` times with value `v`,
//! `s` being the next free symbol:
//!
//! ```text
//! renamed = len(s) + 3 + n * (len(s) + 6)
//! inlined = n * len(v)
//! ```
//!
//! Rename only when strictly cheaper. Lengths are UTF-8 byte lengths.
//! Multi-valued variables are always renamed.

use lightningcss::declaration::DeclarationBlock;
use lightningcss::properties::Property;
use lightningcss::properties::custom::{CustomPropertyName, TokenList, TokenOrValue};
use lightningcss::rules::{CssRule, CssRuleList};
use lightningcss::stylesheet::{ParserOptions, StyleSheet};
use lightningcss::values::ident::DashedIdent;
use lightningcss::values::string::CowArcStr;
use rustc_hash::{FxHashMap, FxHashSet};

use super::canonical::{canonicalize, printer_options};
use super::{StyleError, SymbolAllocator};

/// Inlined values may reference other inlined variables.
const MAX_INLINE_DEPTH: usize = 16;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Compressed {
    pub css: String,
    /// Undeclared variable references.
    pub warnings: Vec<String>,
    /// (original name, new name), in allocation order.
    pub renamed: Vec<(String, String)>,
    pub inlined: Vec<String>,
    pub dropped: Vec<String>,
}

struct Variable<'i> {
    name: String,
    values: Vec<String>,
    tokens: TokenList<'i>,
    uses: usize,
    /// References made by this variable's own declarations.
    references: FxHashMap<String, usize>,
    /// Referenced somewhere the token walk cannot reach; left untouched.
    pinned: bool,
}

impl Variable<'_> {
    fn is_multi_valued(&self) -> bool {
        self.values.len() > 1
    }
}

enum Decision<'i> {
    Drop,
    Inline(TokenList<'i>),
    Rename(String),
}

/// Visit every declaration block, in rule order.
fn for_each_block<'i, R>(
    rules: &mut CssRuleList<'i, R>,
    visit: &mut dyn FnMut(&mut DeclarationBlock<'i>),
) {
    for rule in rules.0.iter_mut() {
        match rule {
            CssRule::Style(style) => {
                visit(&mut style.declarations);
                for_each_block(&mut style.rules, visit);
            }
            CssRule::Media(media) => for_each_block(&mut media.rules, visit),
            CssRule::Supports(supports) => for_each_block(&mut supports.rules, visit),
            CssRule::Container(container) => for_each_block(&mut container.rules, visit),
            CssRule::LayerBlock(layer) => for_each_block(&mut layer.rules, visit),
            CssRule::Keyframes(keyframes) => {
                for keyframe in keyframes.keyframes.iter_mut() {
                    visit(&mut keyframe.declarations);
                }
            }
            _ => {}
        }
    }
}

fn custom_name<'a>(property: &'a Property<'_>) -> Option<&'a str> {
    match property {
        Property::Custom(custom) => match &custom.name {
            CustomPropertyName::Custom(ident) => Some(&ident.0),
            CustomPropertyName::Unknown(_) => None,
        },
        _ => None,
    }
}

fn value_tokens<'a, 'i>(property: &'a Property<'i>) -> Option<&'a TokenList<'i>> {
    match property {
        Property::Custom(custom) => Some(&custom.value),
        Property::Unparsed(unparsed) => Some(&unparsed.value),
        _ => None,
    }
}

fn count_references(tokens: &TokenList<'_>, uses: &mut FxHashMap<String, usize>) {
    for token in &tokens.0 {
        match token {
            TokenOrValue::Var(var) => {
                let name: &str = &var.name.ident.0;
                *uses.entry(name.to_string()).or_default() += 1;
                if let Some(fallback) = &var.fallback {
                    count_references(fallback, uses);
                }
            }
            TokenOrValue::Function(function) => count_references(&function.arguments, uses),
            _ => {}
        }
    }
}

fn rewrite_tokens<'i>(
    tokens: &mut TokenList<'i>,
    plan: &FxHashMap<String, Decision<'i>>,
    depth: usize,
) {
    let mut i = 0;
    while i < tokens.0.len() {
        let inline = match &tokens.0[i] {
            TokenOrValue::Var(var) if depth < MAX_INLINE_DEPTH => {
                let name: &str = &var.name.ident.0;
                match plan.get(name) {
                    Some(Decision::Inline(value)) => Some(value.clone()),
                    _ => None,
                }
            }
            _ => None,
        };

        if let Some(mut value) = inline {
            rewrite_tokens(&mut value, plan, depth + 1);
            let len = value.0.len();
            tokens.0.splice(i..=i, value.0);
            i += len;
            continue;
        }

        match &mut tokens.0[i] {
            TokenOrValue::Var(var) => {
                let name: &str = &var.name.ident.0;
                if let Some(Decision::Rename(symbol)) = plan.get(name) {
                    var.name.ident = DashedIdent(CowArcStr::from(symbol.clone()));
                }
                if let Some(fallback) = &mut var.fallback {
                    rewrite_tokens(fallback, plan, depth);
                }
            }
            TokenOrValue::Function(function) => rewrite_tokens(&mut function.arguments, plan, depth),
            _ => {}
        }
        i += 1;
    }
}

/// Count `var(--name)` / `var(--name,` in printed text.
fn textual_references(css: &str, name: &str) -> usize {
    css.matches(&format!("var({name})")).count() + css.matches(&format!("var({name},")).count()
}

/// Compress the custom properties of `css`.
pub fn compress(css: &str) -> Result<Compressed, StyleError> {
    let mut sheet =
        StyleSheet::parse(css, ParserOptions::default()).map_err(|e| StyleError::parse(css, e))?;

    // Pass 1 + 2: declarations and references.
    let mut variables: Vec<Variable<'_>> = Vec::new();
    let mut index: FxHashMap<String, usize> = FxHashMap::default();
    let mut uses: FxHashMap<String, usize> = FxHashMap::default();
    let mut print_error = None;

    for_each_block(&mut sheet.rules, &mut |block| {
        for property in block.declarations.iter().chain(&block.important_declarations) {
            let mut references = FxHashMap::default();
            if let Some(tokens) = value_tokens(property) {
                count_references(tokens, &mut references);
            }
            for (name, count) in &references {
                *uses.entry(name.clone()).or_default() += count;
            }
            let (Some(name), Property::Custom(custom)) = (custom_name(property), property) else {
                continue;
            };
            let value = match property.value_to_css_string(printer_options()) {
                Ok(value) => value,
                Err(err) => {
                    print_error.get_or_insert_with(|| err.to_string());
                    continue;
                }
            };
            match index.get(name) {
                Some(&at) => {
                    let variable = &mut variables[at];
                    if !variable.values.contains(&value) {
                        variable.values.push(value);
                    }
                    for (name, count) in references {
                        *variable.references.entry(name).or_default() += count;
                    }
                }
                None => {
                    index.insert(name.to_string(), variables.len());
                    variables.push(Variable {
                        name: name.to_string(),
                        values: vec![value],
                        tokens: custom.value.clone(),
                        uses: 0,
                        references,
                        pinned: false,
                    });
                }
            }
        }
    });
    if let Some(err) = print_error {
        return Err(StyleError::Print(err));
    }

    let printed = sheet
        .to_css(printer_options())
        .map_err(|e| StyleError::Print(e.to_string()))?
        .code;
    for variable in &mut variables {
        variable.uses = uses.get(&variable.name).copied().unwrap_or(0);
        variable.pinned = textual_references(&printed, &variable.name) > variable.uses;
    }

    // A dropped declaration no longer references anything.
    let mut unused: Vec<usize> = (0..variables.len())
        .filter(|&at| variables[at].uses == 0 && !variables[at].pinned)
        .collect();
    let mut released = vec![false; variables.len()];
    while let Some(at) = unused.pop() {
        if std::mem::replace(&mut released[at], true) {
            continue;
        }
        for (name, count) in std::mem::take(&mut variables[at].references) {
            let Some(&target) = index.get(&name) else {
                continue;
            };
            let variable = &mut variables[target];
            let was_used = variable.uses > 0;
            variable.uses = variable.uses.saturating_sub(count);
            if was_used && variable.uses == 0 && !variable.pinned {
                unused.push(target);
            }
        }
    }

    let mut warnings: Vec<String> = uses
        .keys()
        .filter(|name| !index.contains_key(*name))
        .map(|name| format!("undeclared variable `{name}`"))
        .collect();
    warnings.sort();

    // Pass 3: decide.
    let mut symbols = SymbolAllocator::new();
    let taken: FxHashSet<&str> = uses
        .keys()
        .filter(|name| !index.contains_key(*name))
        .map(String::as_str)
        .chain(variables.iter().filter(|v| v.pinned).map(|v| v.name.as_str()))
        .collect();
    for name in taken {
        if let Some(bare) = name.strip_prefix("--") {
            symbols.reserve(bare);
        }
    }

    let mut result = Compressed {
        warnings,
        ..Compressed::default()
    };
    let mut plan: FxHashMap<String, Decision<'_>> = FxHashMap::default();

    let mut order: Vec<usize> = (0..variables.len()).collect();
    // Stable sort keeps declaration order among equal counts.
    order.sort_by(|&a, &b| variables[b].uses.cmp(&variables[a].uses));

    for at in order {
        let variable = &variables[at];
        if variable.pinned {
            continue;
        }
        if variable.uses == 0 {
            result.dropped.push(variable.name.clone());
            plan.insert(variable.name.clone(), Decision::Drop);
            continue;
        }

        let candidate = symbols.peek();
        let rename = variable.is_multi_valued() || {
            let n = variable.uses;
            let renamed = candidate.len() + 3 + n * (candidate.len() + 6);
            let inlined = n * variable.values[0].len();
            renamed < inlined
        };

        if rename {
            let symbol = format!("--{}", symbols.take());
            result.renamed.push((variable.name.clone(), symbol.clone()));
            plan.insert(variable.name.clone(), Decision::Rename(symbol));
        } else {
            result.inlined.push(variable.name.clone());
            plan.insert(
                variable.name.clone(),
                Decision::Inline(variable.tokens.clone()),
            );
        }
    }

    // Rewrite.
    for_each_block(&mut sheet.rules, &mut |block| {
        for list in [&mut block.declarations, &mut block.important_declarations] {
            list.retain(|property| {
                !matches!(
                    custom_name(property).and_then(|name| plan.get(name)),
                    Some(Decision::Drop | Decision::Inline(_))
                )
            });
            for property in list.iter_mut() {
                match property {
                    Property::Custom(custom) => {
                        if let CustomPropertyName::Custom(ident) = &mut custom.name {
                            let name: &str = &ident.0;
                            if let Some(Decision::Rename(symbol)) = plan.get(name) {
                                *ident = DashedIdent(CowArcStr::from(symbol.clone()));
                            }
                        }
                        rewrite_tokens(&mut custom.value, &plan, 0);
                    }
                    Property::Unparsed(unparsed) => rewrite_tokens(&mut unparsed.value, &plan, 0),
                    _ => {}
                }
            }
        }
    });

    let rewritten = sheet
        .to_css(printer_options())
        .map_err(|e| StyleError::Print(e.to_string()))?
        .code;
    result.css = canonicalize(&rewritten)?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn references(css: &str, name: &str) -> usize {
        textual_references(css, name)
    }

    #[test]
    fn test_short_value_used_once_is_inlined() {
        let out = compress(":root{--c:red}.a{color:var(--c)}").unwrap();
        assert_eq!(out.inlined, vec!["--c".to_string()]);
        assert!(out.renamed.is_empty());
        assert!(!out.css.contains("--c"), "{}", out.css);
        assert!(out.css.contains(".a{color:red}"), "{}", out.css);
    }

    #[test]
    fn test_long_value_used_five_times_is_renamed() {
        let long = format!("\"{}\"", "x".repeat(198));
        let mut css = format!(":root{{--long:{long}}}");
        for i in 0..5 {
            css.push_str(&format!(".c{i}{{font-family:var(--long)}}"));
        }

        let out = compress(&css).unwrap();
        assert_eq!(out.renamed, vec![("--long".to_string(), "--a".to_string())]);
        assert_eq!(out.css.matches(&long).count(), 1, "{}", out.css);
        assert!(!out.css.contains("--long"));
        assert!(references(&out.css, "--a") >= 1);
    }

    #[test]
    fn test_cost_boundary() {
        // n = 2, s = "a": renamed = 1 + 3 + 2 * 7 = 18
        // 9-byte value: inlined = 18, a tie, so inline
        let tie = ":root{--v:abcdefghi}.a{font-family:var(--v)}.b{grid-area:var(--v)}";
        let out = compress(tie).unwrap();
        assert_eq!(out.inlined, vec!["--v".to_string()]);
        assert!(!out.css.contains("--"), "{}", out.css);

        // 10-byte value: inlined = 20 > 18, so rename
        let over = ":root{--v:abcdefghij}.a{font-family:var(--v)}.b{grid-area:var(--v)}";
        let out = compress(over).unwrap();
        assert_eq!(out.renamed, vec![("--v".to_string(), "--a".to_string())]);
        assert!(out.css.contains("--a:abcdefghij"), "{}", out.css);
    }

    #[test]
    fn test_multi_valued_never_inlined() {
        let css = ":root{--x:red}@media (min-width:600px){:root{--x:blue}}.a{color:var(--x)}";
        let out = compress(css).unwrap();
        assert!(out.inlined.is_empty());
        assert_eq!(out.renamed, vec![("--x".to_string(), "--a".to_string())]);
        assert!(out.css.contains("var(--a)"), "{}", out.css);
        assert!(out.css.contains("--a:red"), "{}", out.css);
        assert!(out.css.contains("--a:#00f") || out.css.contains("--a:blue"), "{}", out.css);
    }

    #[test]
    fn test_identical_redeclaration_is_single_valued() {
        let css = ".a{--x:red}.b{--x:red}.c{color:var(--x)}";
        let out = compress(css).unwrap();
        assert_eq!(out.inlined, vec!["--x".to_string()]);
    }

    #[test]
    fn test_allocation_follows_use_count() {
        let mut css = String::from(":root{--first:aaaaaaaaaaaaaaaaaaaa;--second:bbbbbbbbbbbbbbbbbbbb}");
        for i in 0..2 {
            css.push_str(&format!(".f{i}{{font-family:var(--first)}}"));
        }
        for i in 0..10 {
            css.push_str(&format!(".s{i}{{font-family:var(--second)}}"));
        }

        let out = compress(&css).unwrap();
        assert_eq!(
            out.renamed,
            vec![
                ("--second".to_string(), "--a".to_string()),
                ("--first".to_string(), "--b".to_string()),
            ]
        );
        assert!(out.renamed[0].1.len() <= out.renamed[1].1.len());
    }

    #[test]
    fn test_unused_declarations_dropped() {
        let out = compress(":root{--unused:red;--used:green}.a{color:var(--used)}").unwrap();
        assert_eq!(out.dropped, vec!["--unused".to_string()]);
        assert!(!out.css.contains("--unused"), "{}", out.css);
    }

    #[test]
    fn test_unused_chain_dropped_entirely() {
        let long = "x".repeat(60);
        let css = format!(":root{{--a1:{long};--b1:var(--a1)}}.x{{color:red}}");
        let out = compress(&css).unwrap();
        assert!(out.dropped.contains(&"--a1".to_string()), "{:?}", out.dropped);
        assert!(out.dropped.contains(&"--b1".to_string()), "{:?}", out.dropped);
        assert!(out.renamed.is_empty());
        assert!(!out.css.contains(&long), "{}", out.css);
        assert!(!out.css.contains(":root"), "{}", out.css);
    }

    #[test]
    fn test_unused_chain_keeps_variables_used_elsewhere() {
        let css = ":root{--a1:red;--b1:var(--a1);--c1:var(--b1)}.x{color:var(--a1)}";
        let out = compress(css).unwrap();
        assert!(out.dropped.contains(&"--b1".to_string()), "{:?}", out.dropped);
        assert!(out.dropped.contains(&"--c1".to_string()), "{:?}", out.dropped);
        assert_eq!(out.inlined, vec!["--a1".to_string()]);
        assert!(out.css.contains(".x{color:red}"), "{}", out.css);
    }

    #[test]
    fn test_cost_counts_bytes_not_chars() {
        // n = 1, s = "a": renamed = 1 + 3 + 7 = 11
        // "éééééé" prints as 8 chars but 14 bytes, so rename
        let css = ":root{--v:\"éééééé\"}.a::before{content:var(--v)}";
        let out = compress(css).unwrap();
        assert_eq!(out.renamed, vec![("--v".to_string(), "--a".to_string())]);
        assert!(out.inlined.is_empty());
        assert!(out.css.contains("var(--a)"), "{}", out.css);
    }

    #[test]
    fn test_undeclared_reference_warns_and_is_kept() {
        let out = compress(".a{color:var(--missing)}").unwrap();
        assert_eq!(out.warnings, vec!["undeclared variable `--missing`".to_string()]);
        assert!(out.css.contains("var(--missing)"), "{}", out.css);
    }

    #[test]
    fn test_symbols_avoid_undeclared_names() {
        let css = ":root{--x:red}@media print{:root{--x:blue}}.a{color:var(--x);background:var(--a)}";
        let out = compress(css).unwrap();
        assert_eq!(out.renamed, vec![("--x".to_string(), "--b".to_string())]);
        assert!(out.css.contains("var(--a)"));
    }

    #[test]
    fn test_inlined_values_resolve_nested_inlines() {
        let css = ":root{--a1:red;--b1:var(--a1)}.x{color:var(--b1)}";
        let out = compress(css).unwrap();
        assert!(out.css.contains(".x{color:red}"), "{}", out.css);
        assert!(!out.css.contains("var("), "{}", out.css);
    }

    #[test]
    fn test_fallback_references_counted() {
        let css = ":root{--fb:red}.x{color:var(--missing,var(--fb))}";
        let out = compress(css).unwrap();
        assert!(out.dropped.is_empty());
        assert!(out.inlined.contains(&"--fb".to_string()));
    }

    #[test]
    fn test_output_is_canonical() {
        let out = compress(":root{--c:red}.a{color:var(--c)}").unwrap();
        assert_eq!(canonicalize(&out.css).unwrap(), out.css);
    }
}
