//! Error types for sourcemill.
//!
//! Library crates use [`SourcemillError`] via `thiserror`.
//! App crates (cli/server) wrap this with `color-eyre` for rich diagnostics.
//!
//! Per-source failures inside one ingestion run (an unreadable file, a dead
//! link) are NOT errors at this level — they are data, carried as
//! [`crate::types::SourceError`] entries in the result. Only failures that
//! abort an operation outright surface as [`SourcemillError`].

use std::path::PathBuf;

/// Top-level error type for all sourcemill operations.
#[derive(Debug, thiserror::Error)]
pub enum SourcemillError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// The request is structurally malformed (missing required fields,
    /// undecodable parts). Fatal: rejected before any job runs.
    #[error("malformed request: {message}")]
    MalformedRequest { message: String },

    /// Network/HTTP error during crawl or discovery.
    #[error("network error: {0}")]
    Network(String),

    /// HTML parsing or content extraction error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// HTML-to-Markdown conversion error.
    #[error("conversion error: {0}")]
    Conversion(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SourcemillError>;

impl SourcemillError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a malformed-request error from any displayable message.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedRequest {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = SourcemillError::config("missing section [pipeline]");
        assert_eq!(err.to_string(), "config error: missing section [pipeline]");

        let err = SourcemillError::malformed("max_pages is not an integer");
        assert!(err.to_string().contains("max_pages"));
    }
}
