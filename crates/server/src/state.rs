//! Application state shared across handlers.

use crate::replication::ReplicationController;
use std::sync::Arc;
use urchin_core::config::AppConfig;
use urchin_metadata::MetadataStore;
use urchin_seedpeer::{SeedPeerClient, SeedPeerDirectory};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Catalog metadata store.
    pub store: Arc<dyn MetadataStore>,
    /// Replication controller.
    pub controller: Arc<ReplicationController>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn MetadataStore>,
        seed_peers: Arc<dyn SeedPeerClient>,
        directory: Arc<dyn SeedPeerDirectory>,
    ) -> Self {
        let controller = Arc::new(ReplicationController::new(
            Arc::clone(&store),
            seed_peers,
            directory,
            config.replication.clone(),
        ));
        Self {
            config: Arc::new(config),
            store,
            controller,
        }
    }
}
