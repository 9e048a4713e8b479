//! Error types for nscache

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring or operating a cache
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Construction
    // =========================================================================
    /// Configuration error (fatal at construction time)
    #[error("Configuration error: {0}")]
    Config(String),

    // =========================================================================
    // Transient failures
    // =========================================================================
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure reported by an external cache client
    #[error("{backend} backend error: {reason}")]
    Backend {
        backend: &'static str,
        reason: String,
    },

    /// Shared memory store has no room for the entry
    #[error("Capacity exceeded: need {needed} bytes, {available} available")]
    CapacityExceeded { needed: u64, available: u64 },

    /// Flush left matching files behind
    #[error("Flush incomplete: {remaining} entries could not be removed")]
    FlushIncomplete { remaining: usize },

    /// Blocking task failed to complete
    #[error("Blocking task failed: {0}")]
    TaskJoin(String),

    // =========================================================================
    // Payload & Storage Format
    // =========================================================================
    /// Payload (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Payload cannot be represented by the configured entry codec
    #[error("Unsupported payload: {0}")]
    UnsupportedPayload(String),

    /// Stored record could not be decoded
    #[error("Corrupt cache entry at {path}: {reason}")]
    CorruptEntry { path: PathBuf, reason: String },

    // =========================================================================
    // Batches
    // =========================================================================
    /// Some writes of a batch failed; successful ones are not rolled back
    #[error("Batch write failed for {} of {attempted} entries", failed.len())]
    PartialBatch {
        failed: Vec<String>,
        attempted: usize,
    },
}

impl Error {
    /// Build a backend error from any displayable client failure
    pub fn backend(backend: &'static str, reason: impl std::fmt::Display) -> Self {
        Error::Backend {
            backend,
            reason: reason.to_string(),
        }
    }

    /// Whether this error was raised while validating configuration
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}
