//! Error types for Prospector.
//!
//! Library crates use [`ProspectorError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Prospector operations.
#[derive(Debug, thiserror::Error)]
pub enum ProspectorError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error during search or scrape.
    #[error("network error: {0}")]
    Network(String),

    /// HTML or JSON parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Database or cache layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// LLM extraction error (provider, API, or response parsing).
    #[error("extraction error: {0}")]
    Extraction(String),

    /// Every provider in a fallback chain failed or was skipped.
    #[error("all providers exhausted: {summary}")]
    ChainExhausted {
        summary: String,
        attempted: Vec<(String, String)>,
    },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad input, invalid format, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ProspectorError>;

impl ProspectorError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Build the exhaustion error from the per-provider attempt log.
    pub fn chain_exhausted(attempted: Vec<(String, String)>) -> Self {
        let summary = attempted
            .iter()
            .map(|(name, err)| format!("{name}: {err}"))
            .collect::<Vec<_>>()
            .join("; ");
        Self::ChainExhausted { summary, attempted }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = ProspectorError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = ProspectorError::validation("company_name must not be empty");
        assert!(err.to_string().contains("company_name"));
    }

    #[test]
    fn chain_exhausted_lists_every_attempt() {
        let err = ProspectorError::chain_exhausted(vec![
            ("primary".into(), "HTTP 402".into()),
            ("free".into(), "rate limited".into()),
        ]);
        let text = err.to_string();
        assert!(text.contains("primary: HTTP 402"));
        assert!(text.contains("free: rate limited"));
    }
}
