//! Server test utilities.

use crate::common::seedpeer::MockSeedPeers;
use std::sync::Arc;
use std::time::Duration;
use urchin_core::config::AppConfig;
use urchin_core::{Dataset, DatasetVersionPatch, EndpointRecord};
use urchin_metadata::{
    DatasetRepo, KvMetadataStore, MemoryStore, MetadataStore, ReplicaRepo, VersionRepo,
};
use urchin_seedpeer::StaticDirectory;
use urchin_server::{create_router, AppState};

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    pub seed_peers: Arc<MockSeedPeers>,
    /// Raw handle to the backing KV map for index-level assertions.
    pub kv: Arc<MemoryStore>,
}

#[allow(dead_code)]
impl TestServer {
    /// Test server with the default three-peer fleet and fast polling.
    pub async fn new() -> Self {
        Self::with_config(AppConfig::for_testing()).await
    }

    pub async fn with_config(config: AppConfig) -> Self {
        let kv = Arc::new(MemoryStore::new());
        let store: Arc<dyn MetadataStore> =
            Arc::new(KvMetadataStore::new(kv.clone() as Arc<dyn urchin_metadata::KvStore>));
        let seed_peers = Arc::new(MockSeedPeers::new());
        let directory = Arc::new(StaticDirectory::from_entries(&config.seed_peers));

        let state = AppState::new(
            config,
            store,
            seed_peers.clone(),
            directory,
        );
        let router = create_router(state.clone());

        Self {
            router,
            state,
            seed_peers,
            kv,
        }
    }

    pub fn store(&self) -> &dyn MetadataStore {
        self.state.store.as_ref()
    }

    /// Give a dataset its origin copy plus one materialized replica, the
    /// state an upload flow would leave behind: one directory host, one
    /// blob cache and per-version endpoint lists.
    pub async fn seed_replicated_dataset(&self, id: &str, host: &str) {
        let source = EndpointRecord::new("origin:9000", "models.imagenet");
        let cache = EndpointRecord::new(host.to_string(), "models.imagenet");

        self.store()
            .update_dataset(
                id,
                &urchin_core::DatasetPatch {
                    share_blob_sources: Some(vec![source.clone()]),
                    share_blob_caches: Some(vec![cache.clone()]),
                    ..Default::default()
                },
            )
            .await
            .expect("failed to seed share blob endpoints");

        self.store()
            .replace_replica_hosts(id, &[host.to_string()])
            .await
            .expect("failed to seed replica directory");

        for version in self.store().list_versions(id).await.unwrap() {
            self.store()
                .update_version(
                    id,
                    &version.id,
                    &DatasetVersionPatch {
                        meta_sources: Some(vec![EndpointRecord::new(
                            "origin:9000",
                            "models.imagenet/meta",
                        )]),
                        meta_caches: Some(vec![cache.clone().join_object_name("meta")]),
                        ..Default::default()
                    },
                )
                .await
                .expect("failed to seed version endpoints");
        }
    }

    /// Poll until the dataset settles back to NoScale with `replicas`
    /// blob caches, failing after two seconds.
    pub async fn wait_for_replicas(&self, id: &str, replicas: usize) -> Dataset {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            let dataset = self.store().get_dataset(id).await.unwrap();
            if dataset.replica_state == urchin_core::ReplicaState::NoScale
                && dataset.share_blob_caches.len() == replicas
            {
                return dataset;
            }
            if tokio::time::Instant::now() > deadline {
                panic!(
                    "dataset {id} did not converge to {replicas} replicas: state {:?}, caches {}",
                    dataset.replica_state,
                    dataset.share_blob_caches.len()
                );
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}
