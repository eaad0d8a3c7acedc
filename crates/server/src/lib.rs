//! HTTP control plane for the urchin dataset catalog.
//!
//! This crate provides:
//! - The dataset CRUD and listing API
//! - The replication controller driving scale-up/scale-down workflows
//! - Application state and routing

pub mod error;
pub mod handlers;
pub mod replication;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use replication::ReplicationController;
pub use routes::create_router;
pub use state::AppState;
