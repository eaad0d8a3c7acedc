//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type.
///
/// Mapping follows the control-plane convention: malformed input and
/// capacity violations are 422, a rejected concurrent scale operation is
/// 409, and missing records surface as 500 with a diagnostic message
/// (the catalog treats a dangling id as an internal inconsistency).
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("not allowed: {0}")]
    NotAllowed(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Core(#[from] urchin_core::Error),

    #[error("metadata error: {0}")]
    Metadata(#[from] urchin_metadata::MetadataError),

    #[error("seed peer error: {0}")]
    SeedPeer(#[from] urchin_seedpeer::SeedPeerError),
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidParameter(_) => "invalid_parameter",
            Self::NotAllowed(_) => "not_allowed",
            Self::Conflict(_) => "conflict",
            Self::Internal(_) => "internal_error",
            Self::Core(e) => match e {
                urchin_core::Error::InvalidParameter(_) => "invalid_parameter",
                urchin_core::Error::Internal(_) => "internal_error",
            },
            Self::Metadata(e) => match e {
                urchin_metadata::MetadataError::NotExists(_) => "not_exists",
                _ => "metadata_error",
            },
            Self::SeedPeer(_) => "seed_peer_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidParameter(_) | Self::NotAllowed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Core(e) => match e {
                urchin_core::Error::InvalidParameter(_) => StatusCode::UNPROCESSABLE_ENTITY,
                urchin_core::Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Metadata(_) | Self::SeedPeer(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
