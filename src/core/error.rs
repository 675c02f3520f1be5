//! Error types for the streaming core

use thiserror::Error;

/// Main error type for the streaming core
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed URI or no plugin registered for its scheme
    #[error("Invalid data source: {0}")]
    InvalidSource(String),

    /// Backing storage failed to produce a brick
    #[error("Load failure: {0}")]
    LoadFailure(String),

    /// A future was read back as a different type than it was set with
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// Another eviction pass holds the cache
    #[error("Cache busy")]
    CacheBusy,

    #[error("Promise already set: {0}")]
    PromiseAlreadySet(String),

    /// A promise was flushed without ever receiving a value
    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True for failures a caller may retry on a later frame
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::CacheBusy | Error::LoadFailure(_))
    }
}
