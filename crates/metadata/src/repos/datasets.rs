//! Dataset repository.

use crate::error::MetadataResult;
use async_trait::async_trait;
use urchin_core::{Dataset, DatasetPatch, ReplicaState};

/// Repository for dataset records and their secondary indexes.
#[async_trait]
pub trait DatasetRepo: Send + Sync {
    /// Persist a new record: primary hash, creation-time entry, name/tag
    /// prefix keys and the default version. Best-effort ordering — on
    /// intermediate failure the record is considered non-existent and any
    /// stray index keys are tolerated.
    async fn create_dataset(&self, dataset: &Dataset) -> MetadataResult<()>;

    /// Read a record; `NotExists` when the primary hash is gone.
    async fn get_dataset(&self, id: &str) -> MetadataResult<Dataset>;

    /// Write the fields present in `patch`; a tag change swaps the tags
    /// prefix key; `update_time` is rewritten on every successful call.
    async fn update_dataset(&self, id: &str, patch: &DatasetPatch) -> MetadataResult<()>;

    /// Unconditional replica-state write.
    async fn set_replica_state(&self, id: &str, state: ReplicaState) -> MetadataResult<()>;

    /// Transition replica state only from `expected`; returns whether the
    /// transition happened.
    async fn set_replica_state_if(
        &self,
        id: &str,
        expected: ReplicaState,
        next: ReplicaState,
    ) -> MetadataResult<bool>;

    /// Remove the record, its index keys, its versions and its replica
    /// directory entry.
    async fn delete_dataset(&self, id: &str) -> MetadataResult<()>;
}
