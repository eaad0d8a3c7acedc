//! Replica directory repository.

use crate::error::MetadataResult;
use async_trait::async_trait;

/// Per-dataset list of seed-peer hosts currently holding a replica.
///
/// The directory key is created by the first successful scale-up and
/// destroyed only by dataset delete; a missing key is `NotExists`, not an
/// empty list.
#[async_trait]
pub trait ReplicaRepo: Send + Sync {
    async fn list_replica_hosts(&self, dataset_id: &str) -> MetadataResult<Vec<String>>;

    async fn replace_replica_hosts(
        &self,
        dataset_id: &str,
        hosts: &[String],
    ) -> MetadataResult<()>;

    async fn delete_replica_hosts(&self, dataset_id: &str) -> MetadataResult<()>;
}
