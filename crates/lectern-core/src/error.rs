//! Error types for lectern.

use thiserror::Error;

/// Main error type for lectern operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Content extraction failed
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractError),

    /// Embedding generation failed
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbedError),

    /// Document store or vector index could not be loaded or saved
    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether retrying the same call may succeed.
    ///
    /// Only disk failures while persisting are transient; corrupt snapshots,
    /// embedding failures and bad input are not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Persistence(StoreError::Io(_)))
    }
}

/// Content extraction errors.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid text encoding: {0}")]
    Encoding(String),

    #[error("ocr failed: {0}")]
    Ocr(String),

    #[error("page {page} timed out after {secs}s")]
    Timeout { page: u32, secs: u64 },

    #[error("extraction failed: {0}")]
    Failed(String),
}

/// Embedding errors.
#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("model loading failed: {0}")]
    ModelLoad(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("cannot embed empty text")]
    EmptyInput,

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Document store and vector index errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt snapshot: {0}")]
    Corrupt(String),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Result type alias for lectern operations.
pub type Result<T> = std::result::Result<T, Error>;
