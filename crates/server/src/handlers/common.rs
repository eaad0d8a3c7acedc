//! Shared handler helpers.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::Serialize;
use urchin_metadata::MetadataStore;

/// Maximum request body size (1 MiB).
const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Success envelope: every 2xx body carries `status_code` 0 and
/// `status_msg` "succeed" next to the payload fields. Non-zero
/// `status_code` values are reserved.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub status_code: i32,
    pub status_msg: &'static str,
    #[serde(flatten)]
    pub payload: T,
}

/// Wrap a payload in the success envelope.
pub fn succeed<T: Serialize>(payload: T) -> Json<Envelope<T>> {
    Json(Envelope {
        status_code: 0,
        status_msg: "succeed",
        payload,
    })
}

/// Empty success payload.
#[derive(Debug, Serialize)]
pub struct Empty {}

/// Read and decode a JSON request body; failures are bind errors (422).
pub async fn bind_json<T: DeserializeOwned>(req: Request) -> ApiResult<T> {
    let bytes = axum::body::to_bytes(req.into_body(), MAX_BODY_SIZE)
        .await
        .map_err(|e| ApiError::InvalidParameter(format!("failed to read body: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ApiError::InvalidParameter(format!("invalid JSON body: {e}")))
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// GET /api/v1/health - health check.
///
/// Unauthenticated by design so load balancers and probes can reach it.
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    state.store.health_check().await?;
    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    }))
}
