//! Core domain types for the urchin dataset replication control plane.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Dataset records and update patches
//! - Dataset versions and their endpoint lists
//! - Endpoint records (`host` + `bucket.object` pairs)
//! - Replica scaling state
//! - Configuration types

pub mod config;
pub mod dataset;
pub mod endpoint;
pub mod error;
pub mod version;

pub use dataset::{Dataset, DatasetPatch, ReplicaState};
pub use endpoint::EndpointRecord;
pub use error::{Error, Result};
pub use version::{DatasetVersion, DatasetVersionPatch, DEFAULT_DATASET_VERSION};

/// Current unix time in whole seconds.
///
/// All catalog timestamps (`create_time`, `update_time`, `create_at`) are
/// unix seconds, matching the decimal encoding used in the store.
pub fn unix_now() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

/// Generate a new dataset id.
pub fn new_dataset_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
