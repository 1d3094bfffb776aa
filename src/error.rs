// src/error.rs

//! Unified error handling for the scraper.
//!
//! Per-post and per-source failures (`Transport`, `EmptyResponse`,
//! `MalformedRecord`, `Enrichment`) are contained by the stage that sees
//! them. Only the fatal kinds abort a run; see [`AppError::is_fatal`].

use std::fmt;
use std::path::Path;

use thiserror::Error;

/// Result type alias for scraper operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Network failure or non-success HTTP status from the listing endpoint
    #[error("Transport error for {source_id}: {message}")]
    Transport { source_id: String, message: String },

    /// Listing body was empty or not shaped like a listing
    #[error("Empty response for {source_id}: {message}")]
    EmptyResponse { source_id: String, message: String },

    /// A single post could not be normalized
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// Media fetch, decode, or text extraction failed
    #[error("Enrichment error for {url}: {message}")]
    Enrichment { url: String, message: String },

    /// Existing dataset does not carry the fixed record schema
    #[error("Schema mismatch in {path}: {message}")]
    SchemaMismatch { path: String, message: String },

    /// Dataset could not be written or renamed into place
    #[error("Persistence error for {path}: {message}")]
    Persistence { path: String, message: String },

    /// Every configured source failed
    #[error("All {attempted} sources failed; nothing to merge")]
    AllSourcesFailed { attempted: usize },

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client construction or request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Arrow array construction failed
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet encoding/decoding failed
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create a transport error for a source.
    pub fn transport(source_id: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Transport {
            source_id: source_id.into(),
            message: message.to_string(),
        }
    }

    /// Create an empty-response error for a source.
    pub fn empty_response(source_id: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::EmptyResponse {
            source_id: source_id.into(),
            message: message.to_string(),
        }
    }

    /// Create a malformed-record error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedRecord(message.into())
    }

    /// Create an enrichment error for a media URL.
    pub fn enrichment(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Enrichment {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a schema mismatch error for a dataset file.
    pub fn schema_mismatch(path: &Path, message: impl fmt::Display) -> Self {
        Self::SchemaMismatch {
            path: path.display().to_string(),
            message: message.to_string(),
        }
    }

    /// Create a persistence error for a dataset file.
    pub fn persistence(path: &Path, message: impl fmt::Display) -> Self {
        Self::Persistence {
            path: path.display().to_string(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether this error aborts the whole run instead of one source or record.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::Transport { .. }
                | Self::EmptyResponse { .. }
                | Self::MalformedRecord(_)
                | Self::Enrichment { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contained_errors_are_not_fatal() {
        assert!(!AppError::transport("memes", "connection reset").is_fatal());
        assert!(!AppError::empty_response("memes", "no body").is_fatal());
        assert!(!AppError::malformed("no data").is_fatal());
        assert!(!AppError::enrichment("https://i.redd.it/a.png", "timeout").is_fatal());
    }

    #[test]
    fn storage_errors_are_fatal() {
        let path = Path::new("data/base.parquet");
        assert!(AppError::schema_mismatch(path, "missing column").is_fatal());
        assert!(AppError::persistence(path, "read-only").is_fatal());
        assert!(AppError::AllSourcesFailed { attempted: 3 }.is_fatal());
    }

    #[test]
    fn display_includes_context() {
        let err = AppError::transport("memes", "status 429");
        assert_eq!(err.to_string(), "Transport error for memes: status 429");
    }
}
