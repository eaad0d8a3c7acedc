//! Error kinds shared by the control plane.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed input or a reserved-character violation at the request
    /// boundary; surfaces as 422.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A record violates an internal invariant; surfaces as 500.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
