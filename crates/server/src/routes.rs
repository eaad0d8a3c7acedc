//! Route configuration.

use crate::handlers;
use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/dataset", post(handlers::create_dataset))
        .route(
            "/api/v1/dataset/{id}",
            get(handlers::get_dataset)
                .patch(handlers::update_dataset)
                .delete(handlers::delete_dataset),
        )
        .route("/api/v1/datasets", get(handlers::list_datasets))
        // Health is unauthenticated for load balancers and probes.
        .route("/api/v1/health", get(handlers::health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
