//! Dataset versions.

use crate::endpoint::EndpointRecord;
use serde::{Deserialize, Serialize};

/// Id of the version created atomically with every dataset.
pub const DEFAULT_DATASET_VERSION: &str = "default";

/// A labeled snapshot of a dataset's contents with its own endpoint lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetVersion {
    pub id: String,
    pub name: String,
    pub create_at: i64,
    /// Origin copies of this version's metadata; non-empty at quiescence.
    pub meta_sources: Vec<EndpointRecord>,
    /// One entry per replica at quiescence.
    pub meta_caches: Vec<EndpointRecord>,
}

impl DatasetVersion {
    /// The version every dataset starts with.
    pub fn default_version(create_at: i64) -> Self {
        Self {
            id: DEFAULT_DATASET_VERSION.to_string(),
            name: "default dataset version".to_string(),
            create_at,
            meta_sources: Vec::new(),
            meta_caches: Vec::new(),
        }
    }
}

/// Partial update of a version record; only `Some` fields are written.
#[derive(Debug, Clone, Default)]
pub struct DatasetVersionPatch {
    pub name: Option<String>,
    pub meta_sources: Option<Vec<EndpointRecord>>,
    pub meta_caches: Option<Vec<EndpointRecord>>,
}
