//! Error types for tierkv
//!
//! Provides a unified error type for all operations, plus a coarse
//! [`ErrorKind`] the request layer can map onto transport status codes.

use thiserror::Error;

/// Result type alias using KvError
pub type Result<T> = std::result::Result<T, KvError>;

/// Unified error type for tierkv operations
#[derive(Debug, Error)]
pub enum KvError {
    // -------------------------------------------------------------------------
    // Input Errors
    // -------------------------------------------------------------------------
    #[error("empty key")]
    EmptyKey,

    #[error("empty batch")]
    EmptyBatch,

    // -------------------------------------------------------------------------
    // Lookup Errors
    // -------------------------------------------------------------------------
    #[error("key not found")]
    NotFound,

    #[error("value for key {key:?} has been evicted")]
    Evicted { key: String },

    #[error("blob not found: {0}")]
    BlobNotFound(String),

    // -------------------------------------------------------------------------
    // Integrity Errors
    // -------------------------------------------------------------------------
    #[error("corruption detected: {0}")]
    Corruption(String),

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Db(#[from] rocksdb::Error),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    EmptyKey,
    EmptyBatch,
    NotFound,
    Evicted,
    Corruption,
    Io,
    Internal,
}

impl KvError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            KvError::EmptyKey => ErrorKind::EmptyKey,
            KvError::EmptyBatch => ErrorKind::EmptyBatch,
            KvError::NotFound | KvError::BlobNotFound(_) => ErrorKind::NotFound,
            KvError::Evicted { .. } => ErrorKind::Evicted,
            KvError::Corruption(_) => ErrorKind::Corruption,
            KvError::Io(_) | KvError::Db(_) => ErrorKind::Io,
            KvError::Serialization(_) | KvError::Config(_) => ErrorKind::Internal,
        }
    }

    /// Short label used for error metrics
    pub fn label(&self) -> &'static str {
        match self.kind() {
            ErrorKind::EmptyKey => "empty_key",
            ErrorKind::EmptyBatch => "empty_batch",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Evicted => "evicted",
            ErrorKind::Corruption => "corruption",
            ErrorKind::Io => "io",
            ErrorKind::Internal => "internal",
        }
    }

    pub(crate) fn evicted(key: &[u8]) -> Self {
        KvError::Evicted {
            key: String::from_utf8_lossy(key).into_owned(),
        }
    }
}

impl From<bincode::Error> for KvError {
    fn from(e: bincode::Error) -> Self {
        KvError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for KvError {
    fn from(e: serde_json::Error) -> Self {
        KvError::Serialization(e.to_string())
    }
}
