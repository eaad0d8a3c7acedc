//! Metadata store error types.

use thiserror::Error;

/// Metadata store operation errors.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("not exists: {0}")]
    NotExists(String),

    #[error("store error: {0}")]
    Store(#[from] redis::RedisError),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for MetadataError {
    fn from(err: serde_json::Error) -> Self {
        Self::Encoding(err.to_string())
    }
}

/// Result type for metadata operations.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;
