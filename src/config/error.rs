//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration-class errors. Always fatal, reported before any build.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file `{0}` not found")]
    NotFound(PathBuf),

    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("config file parsing error")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration:\n{}", format_problems(.0))]
    Validation(Vec<String>),

    #[error("page `{route}`: {message}")]
    Page { route: String, message: String },
}

fn format_problems(problems: &[String]) -> String {
    problems
        .iter()
        .map(|p| format!("  → {p}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_lists_every_problem() {
        let err = ConfigError::Validation(vec!["a".into(), "b".into()]);
        let text = err.to_string();
        assert!(text.contains("→ a"));
        assert!(text.contains("→ b"));
    }
}
