//! Per-page configuration (`<route>-config.toml` or `<route>-config.json`).
//!
//! ```toml
//! title = "About us"
//! lang = "en"
//!
//! [vars]
//! tagline = "small pages, shared styles"
//! ```

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PageConfig {
    pub title: Option<String>,
    pub lang: Option<String>,
    /// Extra values visible to the markup renderer.
    pub vars: BTreeMap<String, String>,
}

impl PageConfig {
    /// Parse by file extension: `.json` as JSON, anything else as TOML.
    pub fn parse(path: &Path, content: &str) -> Result<Self, String> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(content).map_err(|e| e.to_string()),
            _ => toml::from_str(content).map_err(|e| e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_toml() {
        let config = PageConfig::parse(
            Path::new("about-config.toml"),
            "title = \"About\"\n[vars]\ntagline = \"hi\"",
        )
        .unwrap();
        assert_eq!(config.title.as_deref(), Some("About"));
        assert_eq!(config.vars["tagline"], "hi");
    }

    #[test]
    fn test_parse_json() {
        let config =
            PageConfig::parse(Path::new("about-config.json"), r#"{"lang":"de"}"#).unwrap();
        assert_eq!(config.lang.as_deref(), Some("de"));
        assert!(config.title.is_none());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(PageConfig::parse(Path::new("a-config.toml"), "titel = \"x\"").is_err());
    }
}
