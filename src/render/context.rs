//! Explicit render context: a scope chain of string values.
//!
//! Lookup walks from the innermost scope outwards:
//! job vars → page vars → built-ins (`route`, `title`, `lang`, `dev`,
//! `common_styles`).

use std::collections::BTreeMap;

use super::RenderJob;

type Scope = BTreeMap<String, String>;

#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    /// Outermost first.
    scopes: Vec<Scope>,
}

impl RenderContext {
    pub fn for_job(job: &RenderJob) -> Self {
        let mut builtins = Scope::new();
        builtins.insert("route".into(), job.uri.to_string());
        builtins.insert(
            "title".into(),
            job.page.title.clone().unwrap_or_default(),
        );
        builtins.insert(
            "lang".into(),
            job.page.lang.clone().unwrap_or_else(|| "en".into()),
        );
        builtins.insert("dev".into(), job.development.to_string());
        builtins.insert("common_styles".into(), job.common_style_prefix.to_string());

        Self {
            scopes: vec![builtins, job.page.vars.clone(), job.vars.clone()],
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .map(String::as_str)
    }
}
