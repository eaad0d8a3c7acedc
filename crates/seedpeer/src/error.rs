//! Seed-peer client error types.

use thiserror::Error;

/// Errors from remote seed-peer operations.
#[derive(Debug, Error)]
pub enum SeedPeerError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("seed peer {host} returned {status} for {operation}")]
    BadStatus {
        host: String,
        operation: &'static str,
        status: u16,
    },

    #[error("seed peer reported failure status {status_code}")]
    Remote { status_code: i64 },

    #[error("operation cancelled")]
    Cancelled,

    #[error("directory error: {0}")]
    Directory(String),
}

/// Result type for seed-peer operations.
pub type SeedPeerResult<T> = std::result::Result<T, SeedPeerError>;
