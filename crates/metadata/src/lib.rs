//! Metadata store for the urchin control plane.
//!
//! This crate provides the shared catalog index:
//! - Typed primitives over a remote KV + sorted-set store ([`KvStore`])
//! - Redis and in-memory backends
//! - Dataset, version and replica-directory repositories
//! - The paged/filtered listing engine with its ephemeral sort caches

pub mod codec;
pub mod error;
pub mod keys;
pub mod kv;
pub mod listing;
pub mod memory;
pub mod redis_store;
pub mod repos;
pub mod store;

pub use error::{MetadataError, MetadataResult};
pub use kv::{KvStore, ScanPage, SortOrder};
pub use listing::ListQuery;
pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use repos::{DatasetRepo, ReplicaRepo, VersionRepo};
pub use store::{KvMetadataStore, MetadataStore};

use std::sync::Arc;
use urchin_core::config::MetadataConfig;

/// Create a metadata store from configuration.
pub async fn from_config(config: &MetadataConfig) -> MetadataResult<Arc<dyn MetadataStore>> {
    let kv: Arc<dyn KvStore> = match config {
        MetadataConfig::Redis { url } => {
            tracing::info!("connecting to redis metadata store");
            Arc::new(RedisStore::connect(url).await?)
        }
        MetadataConfig::Memory => {
            tracing::warn!("using in-memory metadata store; catalog state is process-local");
            Arc::new(MemoryStore::new())
        }
    };
    Ok(Arc::new(KvMetadataStore::new(kv)))
}
