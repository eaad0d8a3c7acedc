//! Combined metadata store trait and its KV-backed implementation.

use crate::codec;
use crate::error::{MetadataError, MetadataResult};
use crate::keys;
use crate::kv::KvStore;
use crate::listing::ListQuery;
use crate::repos::{DatasetRepo, ReplicaRepo, VersionRepo};
use async_trait::async_trait;
use std::sync::Arc;
use urchin_core::{unix_now, Dataset, DatasetPatch, DatasetVersion, DatasetVersionPatch, ReplicaState};

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore: DatasetRepo + VersionRepo + ReplicaRepo + Send + Sync {
    /// Paged/sorted/filtered listing over the catalog.
    async fn list_datasets(&self, query: &ListQuery) -> MetadataResult<Vec<Dataset>>;

    /// Check store connectivity.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// Metadata store over any [`KvStore`] backend.
pub struct KvMetadataStore {
    kv: Arc<dyn KvStore>,
}

impl KvMetadataStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub(crate) fn kv(&self) -> &dyn KvStore {
        self.kv.as_ref()
    }

    /// Collect every key matching `pattern` via the cooperative scan.
    pub(crate) async fn scan_all(&self, pattern: &str) -> MetadataResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut cursor = 0;
        loop {
            let page = self.kv.scan(cursor, pattern, 100).await?;
            keys.extend(page.keys);
            if page.cursor == 0 {
                break;
            }
            cursor = page.cursor;
        }
        Ok(keys)
    }
}

#[async_trait]
impl DatasetRepo for KvMetadataStore {
    async fn create_dataset(&self, dataset: &Dataset) -> MetadataResult<()> {
        let key = keys::dataset_key(&dataset.id);
        let fields = codec::encode_dataset(dataset)?;
        self.kv.set_map_many(&key, &fields).await?;

        self.kv
            .zadd(keys::CREATE_TIME_KEY, &dataset.id, dataset.create_time as f64)
            .await?;

        if !dataset.name.is_empty() {
            let name_key = keys::name_index_key(&dataset.id, &dataset.name);
            self.kv.set(&name_key, dataset.name.as_bytes()).await?;
        }

        if !dataset.tags.is_empty() {
            let joined = Dataset::join_tags(&dataset.tags);
            let tags_key = keys::tags_index_key(&dataset.id, &joined);
            self.kv.set(&tags_key, joined.as_bytes()).await?;
        }

        self.create_version(
            &dataset.id,
            &DatasetVersion::default_version(dataset.create_time),
        )
        .await
    }

    async fn get_dataset(&self, id: &str) -> MetadataResult<Dataset> {
        if id.is_empty() {
            return Err(MetadataError::NotExists("dataset id is empty".to_string()));
        }
        let map = self.kv.read_map(&keys::dataset_key(id)).await?;
        if map.is_empty() {
            return Err(MetadataError::NotExists(format!("dataset {id} not found")));
        }
        let dataset = codec::decode_dataset(map)?;
        if dataset.id != id {
            return Err(MetadataError::NotExists(format!("dataset {id} not found")));
        }
        Ok(dataset)
    }

    async fn update_dataset(&self, id: &str, patch: &DatasetPatch) -> MetadataResult<()> {
        let key = keys::dataset_key(id);
        if !self.kv.exists(&key).await? {
            return Err(MetadataError::NotExists(format!("dataset {id} not found")));
        }

        if let Some(name) = &patch.name {
            // Swap the name prefix key so name search keeps matching the
            // record after a rename.
            if let Some(old) = self.kv.get_map(&key, codec::field::NAME).await? {
                let old = String::from_utf8_lossy(&old).into_owned();
                if !old.is_empty() {
                    let _ = self.kv.del(&keys::name_index_key(id, &old)).await;
                }
            }
            self.kv
                .set_map(&key, codec::field::NAME, name.as_bytes())
                .await?;
            if !name.is_empty() {
                self.kv
                    .set(&keys::name_index_key(id, name), name.as_bytes())
                    .await?;
            }
        }

        if let Some(desc) = &patch.desc {
            self.kv
                .set_map(&key, codec::field::DESC, desc.as_bytes())
                .await?;
        }

        if let Some(replica) = patch.replica {
            self.kv
                .set_map(&key, codec::field::REPLICA, replica.to_string().as_bytes())
                .await?;
        }

        if let Some(cache_strategy) = &patch.cache_strategy {
            self.kv
                .set_map(&key, codec::field::CACHE_STRATEGY, cache_strategy.as_bytes())
                .await?;
        }

        if let Some(tags) = &patch.tags {
            if let Some(old) = self.kv.get_map(&key, codec::field::TAGS).await? {
                let old = String::from_utf8_lossy(&old).into_owned();
                if !old.is_empty() {
                    let _ = self.kv.del(&keys::tags_index_key(id, &old)).await;
                }
            }
            let joined = Dataset::join_tags(tags);
            self.kv
                .set_map(&key, codec::field::TAGS, joined.as_bytes())
                .await?;
            if !joined.is_empty() {
                self.kv
                    .set(&keys::tags_index_key(id, &joined), joined.as_bytes())
                    .await?;
            }
        }

        if let Some(sources) = &patch.share_blob_sources {
            self.kv
                .set_map(
                    &key,
                    codec::field::SHARE_BLOB_SOURCES,
                    &codec::encode_endpoints(sources)?,
                )
                .await?;
        }

        if let Some(caches) = &patch.share_blob_caches {
            self.kv
                .set_map(
                    &key,
                    codec::field::SHARE_BLOB_CACHES,
                    &codec::encode_endpoints(caches)?,
                )
                .await?;
        }

        self.kv
            .set_map(
                &key,
                codec::field::UPDATE_TIME,
                unix_now().to_string().as_bytes(),
            )
            .await
    }

    async fn set_replica_state(&self, id: &str, state: ReplicaState) -> MetadataResult<()> {
        self.kv
            .set_map(
                &keys::dataset_key(id),
                codec::field::REPLICA_STATE,
                state.as_u8().to_string().as_bytes(),
            )
            .await
    }

    async fn set_replica_state_if(
        &self,
        id: &str,
        expected: ReplicaState,
        next: ReplicaState,
    ) -> MetadataResult<bool> {
        self.kv
            .set_map_if(
                &keys::dataset_key(id),
                codec::field::REPLICA_STATE,
                expected.as_u8().to_string().as_bytes(),
                next.as_u8().to_string().as_bytes(),
            )
            .await
    }

    async fn delete_dataset(&self, id: &str) -> MetadataResult<()> {
        let dataset = self.get_dataset(id).await?;

        if !dataset.name.is_empty() {
            if let Err(err) = self.kv.del(&keys::name_index_key(id, &dataset.name)).await {
                tracing::warn!(dataset_id = %id, error = %err, "failed to delete name index key");
            }
        }

        let joined = Dataset::join_tags(&dataset.tags);
        if !joined.is_empty() {
            if let Err(err) = self.kv.del(&keys::tags_index_key(id, &joined)).await {
                tracing::warn!(dataset_id = %id, error = %err, "failed to delete tags index key");
            }
        }

        if let Err(err) = self.kv.zrem(keys::CREATE_TIME_KEY, id).await {
            tracing::warn!(dataset_id = %id, error = %err, "failed to remove creation-time entry");
        }

        self.delete_versions(id).await?;
        self.delete_replica_hosts(id).await?;
        self.kv.del_map(&keys::dataset_key(id)).await
    }
}

#[async_trait]
impl VersionRepo for KvMetadataStore {
    async fn create_version(
        &self,
        dataset_id: &str,
        version: &DatasetVersion,
    ) -> MetadataResult<()> {
        let key = keys::version_key(dataset_id, &version.id);
        let fields = codec::encode_version(version)?;
        self.kv.set_map_many(&key, &fields).await
    }

    async fn update_version(
        &self,
        dataset_id: &str,
        version_id: &str,
        patch: &DatasetVersionPatch,
    ) -> MetadataResult<()> {
        let key = keys::version_key(dataset_id, version_id);
        if !self.kv.exists(&key).await? {
            return Err(MetadataError::NotExists(format!(
                "dataset {dataset_id} version {version_id} not found"
            )));
        }

        if let Some(name) = &patch.name {
            self.kv
                .set_map(&key, codec::field::NAME, name.as_bytes())
                .await?;
        }
        if let Some(sources) = &patch.meta_sources {
            self.kv
                .set_map(
                    &key,
                    codec::field::META_SOURCES,
                    &codec::encode_endpoints(sources)?,
                )
                .await?;
        }
        if let Some(caches) = &patch.meta_caches {
            self.kv
                .set_map(
                    &key,
                    codec::field::META_CACHES,
                    &codec::encode_endpoints(caches)?,
                )
                .await?;
        }
        Ok(())
    }

    async fn list_versions(&self, dataset_id: &str) -> MetadataResult<Vec<DatasetVersion>> {
        let keys = self.scan_all(&keys::version_scan_pattern(dataset_id)).await?;
        let mut versions = Vec::with_capacity(keys.len());
        for key in keys {
            let map = self.kv.read_map(&key).await?;
            if map.is_empty() {
                continue;
            }
            versions.push(codec::decode_version(map)?);
        }
        versions.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(versions)
    }

    async fn delete_versions(&self, dataset_id: &str) -> MetadataResult<()> {
        for key in self.scan_all(&keys::version_scan_pattern(dataset_id)).await? {
            self.kv.del_map(&key).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ReplicaRepo for KvMetadataStore {
    async fn list_replica_hosts(&self, dataset_id: &str) -> MetadataResult<Vec<String>> {
        let key = keys::replica_key(dataset_id);
        let value = self.kv.get(&key).await?.ok_or_else(|| {
            MetadataError::NotExists(format!("replica directory for dataset {dataset_id} not found"))
        })?;
        Ok(serde_json::from_slice(&value)?)
    }

    async fn replace_replica_hosts(
        &self,
        dataset_id: &str,
        hosts: &[String],
    ) -> MetadataResult<()> {
        let value = serde_json::to_vec(hosts)?;
        self.kv.set(&keys::replica_key(dataset_id), &value).await
    }

    async fn delete_replica_hosts(&self, dataset_id: &str) -> MetadataResult<()> {
        self.kv.del(&keys::replica_key(dataset_id)).await
    }
}

#[async_trait]
impl MetadataStore for KvMetadataStore {
    async fn list_datasets(&self, query: &ListQuery) -> MetadataResult<Vec<Dataset>> {
        self.list_datasets_impl(query).await
    }

    async fn health_check(&self) -> MetadataResult<()> {
        self.kv.exists(keys::CREATE_TIME_KEY).await.map(|_| ())
    }
}
