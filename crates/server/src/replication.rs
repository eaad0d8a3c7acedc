//! Replication controller: converts a dataset's desired replica count into
//! remote cache/destroy operations against seed peers.
//!
//! State machine per dataset, stored in `replica_state`:
//!
//! ```text
//! NoScale --(wanted < current)--> ScaleDown --(done/abort)--> NoScale
//! NoScale --(wanted > current)--> ScaleUp   --(done/abort)--> NoScale
//! ```
//!
//! Scale-down runs inline and the caller waits for completion. Scale-up
//! spawns a detached worker that outlives the request; the worker is
//! tracked so shutdown can drain it to a bounded deadline and then cancel.
//! Concurrent replica changes for one dataset are rejected: an in-process
//! per-dataset mutex covers this controller and a compare-and-set on the
//! stored `replica_state` field covers other controller instances.

use crate::error::{ApiError, ApiResult};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use urchin_core::config::ReplicationConfig;
use urchin_core::{Dataset, DatasetPatch, DatasetVersionPatch, EndpointRecord, ReplicaState};
use urchin_metadata::{DatasetRepo, MetadataError, MetadataStore, ReplicaRepo, VersionRepo};
use urchin_seedpeer::{
    cache_and_poll, replicable_seed_peers, PollTimings, SeedPeerClient, SeedPeerDirectory,
    SeedPeerError,
};

/// Drives scale-up and scale-down workflows and owns their shared guards.
pub struct ReplicationController {
    store: Arc<dyn MetadataStore>,
    seed_peers: Arc<dyn SeedPeerClient>,
    directory: Arc<dyn SeedPeerDirectory>,
    config: ReplicationConfig,
    /// Per-dataset serialization of scale operations in this process.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    /// In-flight scale-up workers, keyed by dataset id.
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
    shutdown: CancellationToken,
}

impl ReplicationController {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        seed_peers: Arc<dyn SeedPeerClient>,
        directory: Arc<dyn SeedPeerDirectory>,
        config: ReplicationConfig,
    ) -> Self {
        Self {
            store,
            seed_peers,
            directory,
            config,
            locks: Mutex::new(HashMap::new()),
            tasks: Mutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Check a requested replica count against system capacity.
    pub async fn validate_replica(&self, wanted: u32) -> ApiResult<()> {
        if wanted == 0 {
            return Err(ApiError::InvalidParameter(
                "wanted replicas must be positive".to_string(),
            ));
        }
        if wanted > self.config.max_replicas {
            return Err(ApiError::NotAllowed(format!(
                "wanted replicas: {} is larger than the max datasource count of system setting: {}",
                wanted, self.config.max_replicas
            )));
        }

        let replicable =
            replicable_seed_peers(self.directory.as_ref(), &self.config.advertise_ip).await?;
        if wanted as usize > replicable.len() {
            return Err(ApiError::NotAllowed(format!(
                "wanted replicas: {} is larger than replicable datasource count: {}",
                wanted,
                replicable.len()
            )));
        }
        Ok(())
    }

    /// Apply a dataset update, driving a scale workflow when the patch
    /// changes the replica count.
    pub async fn update_dataset(&self, id: &str, patch: DatasetPatch) -> ApiResult<()> {
        let old = self.store.get_dataset(id).await?;

        let wanted = match patch.replica {
            Some(wanted) if wanted != old.replica => wanted,
            _ => {
                // No replica change: plain field patch, state machine
                // bypassed.
                self.store.update_dataset(id, &patch).await?;
                return Ok(());
            }
        };

        tracing::info!(
            dataset_id = %id,
            current = old.replica,
            wanted,
            "adjusting dataset replica count"
        );
        self.validate_replica(wanted).await?;

        let source = old.share_blob_sources.first().ok_or_else(|| {
            ApiError::Internal(format!("dataset {id} has no share blob sources"))
        })?;
        let (bucket, object) = source.bucket_and_object()?;
        let bucket = bucket.to_string();
        let object = object.to_string();

        if wanted < old.replica {
            self.scale_down(&old, wanted, patch, &bucket, &object).await
        } else {
            self.scale_up(old, wanted, patch, bucket, object).await
        }
    }

    /// Per-dataset lock handle, created on first use.
    async fn dataset_lock(&self, id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(
            locks
                .entry(id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    /// Transition into a scale state; a lost race surfaces as a conflict.
    async fn enter_scale_state(&self, id: &str, state: ReplicaState) -> ApiResult<()> {
        let entered = self
            .store
            .set_replica_state_if(id, ReplicaState::NoScale, state)
            .await?;
        if !entered {
            return Err(ApiError::Conflict(format!(
                "dataset {id} has a replica scale operation in flight"
            )));
        }
        Ok(())
    }

    async fn reset_scale_state(store: &dyn MetadataStore, id: &str) {
        if let Err(err) = store.set_replica_state(id, ReplicaState::NoScale).await {
            tracing::warn!(dataset_id = %id, error = %err, "failed to reset replica state");
        }
    }

    async fn scale_down(
        &self,
        old: &Dataset,
        wanted: u32,
        patch: DatasetPatch,
        bucket: &str,
        object: &str,
    ) -> ApiResult<()> {
        let lock = self.dataset_lock(&old.id).await;
        let _guard = lock.lock().await;

        self.enter_scale_state(&old.id, ReplicaState::ScaleDown).await?;
        let result = self
            .scale_down_inner(old, wanted, patch, bucket, object)
            .await;
        Self::reset_scale_state(self.store.as_ref(), &old.id).await;
        result
    }

    async fn scale_down_inner(
        &self,
        old: &Dataset,
        wanted: u32,
        mut patch: DatasetPatch,
        bucket: &str,
        object: &str,
    ) -> ApiResult<()> {
        let id = &old.id;
        let hosts = self.store.list_replica_hosts(id).await?;
        if hosts.len() < wanted as usize {
            return Err(ApiError::Internal(format!(
                "dataset {id} replica directory holds {} hosts, wanted {wanted}",
                hosts.len()
            )));
        }
        let keep = hosts[..wanted as usize].to_vec();
        let dropped = hosts[wanted as usize..].to_vec();

        // Persist the shrunken directory before any destroy so a crash
        // mid-flight leaves membership consistent with the declared intent;
        // blobs lingering on evicted peers are tolerated.
        self.store.replace_replica_hosts(id, &keep).await?;

        let mut caches = old.share_blob_caches.clone();
        caches.truncate(wanted as usize);
        patch.share_blob_caches = Some(caches);
        patch.replica = Some(wanted);
        self.store.update_dataset(id, &patch).await?;

        for version in self.store.list_versions(id).await? {
            if version.meta_caches.is_empty() {
                continue;
            }
            let mut meta_caches = version.meta_caches;
            meta_caches.truncate(wanted as usize);
            self.store
                .update_version(
                    id,
                    &version.id,
                    &DatasetVersionPatch {
                        meta_caches: Some(meta_caches),
                        ..Default::default()
                    },
                )
                .await?;
        }

        tracing::info!(dataset_id = %id, hosts = ?dropped, "evicting scale-down replica hosts");
        for host in &dropped {
            // Best-effort eviction; the declared replica count is what the
            // system converges toward, not atomically achieved.
            if let Err(err) = self.seed_peers.destroy_folder(host, bucket, object).await {
                tracing::warn!(
                    dataset_id = %id,
                    host = %host,
                    error = %err,
                    "destroy of scale-down replica failed, skipping"
                );
            }
        }
        tracing::info!(dataset_id = %id, replica = wanted, "dataset scale down finished");
        Ok(())
    }

    async fn scale_up(
        &self,
        old: Dataset,
        wanted: u32,
        patch: DatasetPatch,
        bucket: String,
        object: String,
    ) -> ApiResult<()> {
        let lock = self.dataset_lock(&old.id).await;
        let guard = lock.lock().await;

        self.enter_scale_state(&old.id, ReplicaState::ScaleUp).await?;
        let (existing, new_hosts) = match self.select_scale_up_hosts(&old, wanted).await {
            Ok(selection) => selection,
            Err(err) => {
                Self::reset_scale_state(self.store.as_ref(), &old.id).await;
                return Err(err);
            }
        };
        drop(guard);

        tracing::info!(
            dataset_id = %old.id,
            hosts = ?new_hosts,
            "spawning scale-up worker"
        );
        let worker = ScaleUpWorker {
            store: Arc::clone(&self.store),
            seed_peers: Arc::clone(&self.seed_peers),
            timings: PollTimings::from_config(&self.config),
            retry_backoff: Duration::from_millis(self.config.scale_retry_backoff_ms),
            cancel: self.shutdown.child_token(),
        };
        let dataset_id = old.id.clone();
        let handle = tokio::spawn(async move {
            worker
                .run(old, wanted, patch, bucket, object, existing, new_hosts)
                .await;
        });
        self.register_task(&dataset_id, handle).await;
        Ok(())
    }

    /// Current directory hosts plus the candidates to grow onto.
    ///
    /// A dataset that has never scaled up has no directory key yet; that
    /// reads as an empty membership here, and the first successful
    /// scale-up creates the key.
    async fn select_scale_up_hosts(
        &self,
        old: &Dataset,
        wanted: u32,
    ) -> ApiResult<(Vec<String>, Vec<String>)> {
        let existing = match self.store.list_replica_hosts(&old.id).await {
            Ok(hosts) => hosts,
            Err(MetadataError::NotExists(_)) => Vec::new(),
            Err(err) => return Err(err.into()),
        };

        let replicable =
            replicable_seed_peers(self.directory.as_ref(), &self.config.advertise_ip).await?;
        let needed = (wanted - old.replica) as usize;
        let new_hosts: Vec<String> = replicable
            .into_iter()
            .filter(|host| !existing.contains(host))
            .take(needed)
            .collect();
        if new_hosts.len() < needed {
            return Err(ApiError::NotAllowed(format!(
                "dataset {}: only {} replicable datasource candidates left, {} more replicas wanted",
                old.id,
                new_hosts.len(),
                needed
            )));
        }
        Ok((existing, new_hosts))
    }

    async fn register_task(&self, dataset_id: &str, handle: JoinHandle<()>) {
        let mut tasks = self.tasks.lock().await;
        tasks.retain(|_, task| !task.is_finished());
        tasks.insert(dataset_id.to_string(), handle);
    }

    /// Number of scale-up workers still running.
    pub async fn in_flight(&self) -> usize {
        let mut tasks = self.tasks.lock().await;
        tasks.retain(|_, task| !task.is_finished());
        tasks.len()
    }

    /// Wait for in-flight scale workers up to the configured deadline,
    /// then cancel whatever is left and reap it.
    pub async fn shutdown(&self) {
        let deadline = Duration::from_millis(self.config.shutdown_deadline_ms);
        let drain = async {
            while self.in_flight().await > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        if tokio::time::timeout(deadline, drain).await.is_err() {
            tracing::warn!("scale workers still running at shutdown deadline, cancelling");
        }
        self.shutdown.cancel();

        let handles: Vec<(String, JoinHandle<()>)> =
            self.tasks.lock().await.drain().collect();
        for (dataset_id, handle) in handles {
            if tokio::time::timeout(deadline, handle).await.is_err() {
                tracing::warn!(dataset_id = %dataset_id, "scale worker did not stop in time");
            }
        }
    }
}

/// Detached scale-up worker state.
struct ScaleUpWorker {
    store: Arc<dyn MetadataStore>,
    seed_peers: Arc<dyn SeedPeerClient>,
    timings: PollTimings,
    retry_backoff: Duration,
    cancel: CancellationToken,
}

impl ScaleUpWorker {
    #[allow(clippy::too_many_arguments)]
    async fn run(
        self,
        old: Dataset,
        wanted: u32,
        patch: DatasetPatch,
        bucket: String,
        object: String,
        existing: Vec<String>,
        new_hosts: Vec<String>,
    ) {
        let dataset_id = old.id.clone();
        match self
            .execute(old, wanted, patch, &bucket, &object, existing, new_hosts)
            .await
        {
            Ok(()) => {
                tracing::info!(dataset_id = %dataset_id, replica = wanted, "dataset scale up finished")
            }
            Err(ApiError::SeedPeer(SeedPeerError::Cancelled)) => {
                tracing::info!(dataset_id = %dataset_id, "scale-up worker cancelled by shutdown")
            }
            Err(err) => {
                // The record keeps fewer caches than desired; re-issuing
                // the same replica count is the recovery path.
                tracing::warn!(dataset_id = %dataset_id, error = %err, "scale-up worker failed")
            }
        }
        ReplicationController::reset_scale_state(self.store.as_ref(), &dataset_id).await;
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute(
        &self,
        old: Dataset,
        wanted: u32,
        mut patch: DatasetPatch,
        bucket: &str,
        object: &str,
        existing: Vec<String>,
        new_hosts: Vec<String>,
    ) -> ApiResult<()> {
        let id = &old.id;

        // Cache onto each new host sequentially; one host failure aborts
        // the remainder of the workflow.
        let mut new_caches: Vec<EndpointRecord> = Vec::with_capacity(new_hosts.len());
        for host in &new_hosts {
            let endpoint = self.cache_with_retry(id, host, bucket, object).await?;
            new_caches.push(endpoint);
        }

        let mut caches = old.share_blob_caches.clone();
        caches.extend(new_caches.iter().cloned());
        patch.share_blob_caches = Some(caches);
        patch.replica = Some(wanted);
        self.store.update_dataset(id, &patch).await?;

        let mut hosts = existing;
        hosts.extend(new_hosts);
        self.store.replace_replica_hosts(id, &hosts).await?;

        for version in self.store.list_versions(id).await? {
            let source = version.meta_sources.first().ok_or_else(|| {
                ApiError::Internal(format!(
                    "dataset {id} version {} meta sources is empty",
                    version.id
                ))
            })?;
            // The object name comes from the version source, preserving
            // per-version object identity across replicas.
            let object_name = source.object_name().to_string();
            let mut meta_caches = version.meta_caches.clone();
            meta_caches.extend(
                new_caches
                    .iter()
                    .map(|cache| cache.join_object_name(&object_name)),
            );
            self.store
                .update_version(
                    id,
                    &version.id,
                    &DatasetVersionPatch {
                        meta_caches: Some(meta_caches),
                        ..Default::default()
                    },
                )
                .await?;
        }
        Ok(())
    }

    /// One cache-and-poll sequence, retried once after a backoff.
    async fn cache_with_retry(
        &self,
        dataset_id: &str,
        host: &str,
        bucket: &str,
        object: &str,
    ) -> ApiResult<EndpointRecord> {
        match cache_and_poll(
            self.seed_peers.as_ref(),
            host,
            bucket,
            object,
            self.timings,
            &self.cancel,
        )
        .await
        {
            Ok(endpoint) => Ok(endpoint),
            Err(SeedPeerError::Cancelled) => Err(SeedPeerError::Cancelled.into()),
            Err(err) => {
                tracing::warn!(
                    dataset_id = %dataset_id,
                    host = %host,
                    error = %err,
                    "scale up of seed peer dataset failed, retrying once"
                );
                tokio::select! {
                    _ = self.cancel.cancelled() => return Err(SeedPeerError::Cancelled.into()),
                    _ = tokio::time::sleep(self.retry_backoff) => {}
                }
                Ok(cache_and_poll(
                    self.seed_peers.as_ref(),
                    host,
                    bucket,
                    object,
                    self.timings,
                    &self.cancel,
                )
                .await?)
            }
        }
    }
}
