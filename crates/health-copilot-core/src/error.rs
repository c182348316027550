//! Error taxonomy shared by the core and the application crate.
//!
//! Callers match on the variant to decide whether a failure is fatal
//! ([`Error::Configuration`], [`Error::IndexMissing`]), locally recoverable
//! ([`Error::SourceUnavailable`]), or something to surface as a degraded
//! answer ([`Error::Synthesis`]).

use std::path::PathBuf;

use thiserror::Error;

/// Result alias for Health Copilot operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Invalid parameters, mismatched dimensions or models, malformed artifacts.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// One live source failed (network, timeout, non-2xx, bad payload, cancelled).
    #[error("source '{source_name}' unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    /// A persisted index artifact was not found.
    #[error("index artifact missing: {}", .0.display())]
    IndexMissing(PathBuf),

    /// The embedding backend failed or returned an unusable batch.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// The completion service failed.
    #[error("answer synthesis failed: {0}")]
    Synthesis(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn source_unavailable(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    pub fn synthesis(message: impl Into<String>) -> Self {
        Self::Synthesis(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_missing_names_path() {
        let err = Error::IndexMissing(PathBuf::from("models/index/CURRENT"));
        assert_eq!(err.to_string(), "index artifact missing: models/index/CURRENT");
    }

    #[test]
    fn test_source_unavailable_message() {
        let err = Error::source_unavailable("wikipedia", "HTTP 503");
        assert_eq!(err.to_string(), "source 'wikipedia' unavailable: HTTP 503");
    }
}
