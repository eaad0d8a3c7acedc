//! Dataset version repository.

use crate::error::MetadataResult;
use async_trait::async_trait;
use urchin_core::{DatasetVersion, DatasetVersionPatch};

/// Repository for per-dataset version records.
///
/// Endpoint lists are stored JSON-encoded to preserve order.
#[async_trait]
pub trait VersionRepo: Send + Sync {
    async fn create_version(&self, dataset_id: &str, version: &DatasetVersion)
        -> MetadataResult<()>;

    /// Write the fields present in `patch`.
    async fn update_version(
        &self,
        dataset_id: &str,
        version_id: &str,
        patch: &DatasetVersionPatch,
    ) -> MetadataResult<()>;

    /// All versions of a dataset, in version-id order.
    async fn list_versions(&self, dataset_id: &str) -> MetadataResult<Vec<DatasetVersion>>;

    /// Remove every version of a dataset.
    async fn delete_versions(&self, dataset_id: &str) -> MetadataResult<()>;
}
