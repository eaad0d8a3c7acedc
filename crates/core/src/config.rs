//! Configuration types shared across crates.
//!
//! Configuration is loaded once in the binary and passed explicitly into
//! application state and the replication controller; nothing here is global.

use serde::{Deserialize, Serialize};

/// HTTP server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g. "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// Metadata store backend selection.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// Redis-backed store shared by all controller instances.
    Redis {
        /// Connection URL, e.g. "redis://127.0.0.1:6379/0".
        url: String,
    },
    /// Process-local in-memory store for tests and single-node development.
    Memory,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Memory
    }
}

/// One seed peer entry of the statically configured peer directory.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SeedPeerEntry {
    pub ip: String,
    /// Port of the peer's object-storage HTTP endpoint; 0 means the peer
    /// cannot host replicas.
    #[serde(default)]
    pub object_storage_port: u16,
}

/// Replication controller configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReplicationConfig {
    /// Upper bound on any dataset's replica count.
    #[serde(default = "default_max_replicas")]
    pub max_replicas: u32,
    /// Advertise IP of this controller host; peers with the same IP are
    /// never selected as replica targets.
    #[serde(default = "default_advertise_ip")]
    pub advertise_ip: String,
    /// Delay between cache-completion polls.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Backoff after a seed peer reports the pull still in progress.
    #[serde(default = "default_in_progress_backoff_ms")]
    pub in_progress_backoff_ms: u64,
    /// Delay before the single status-check retry.
    #[serde(default = "default_check_retry_delay_ms")]
    pub check_retry_delay_ms: u64,
    /// Backoff before retrying a whole cache-and-poll sequence once.
    #[serde(default = "default_scale_retry_backoff_ms")]
    pub scale_retry_backoff_ms: u64,
    /// How long shutdown waits for in-flight scale workers before
    /// cancelling them.
    #[serde(default = "default_shutdown_deadline_ms")]
    pub shutdown_deadline_ms: u64,
}

fn default_max_replicas() -> u32 {
    10
}

fn default_advertise_ip() -> String {
    "127.0.0.1".to_string()
}

fn default_poll_interval_ms() -> u64 {
    3_000
}

fn default_in_progress_backoff_ms() -> u64 {
    20_000
}

fn default_check_retry_delay_ms() -> u64 {
    2_000
}

fn default_scale_retry_backoff_ms() -> u64 {
    5_000
}

fn default_shutdown_deadline_ms() -> u64 {
    30_000
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            max_replicas: default_max_replicas(),
            advertise_ip: default_advertise_ip(),
            poll_interval_ms: default_poll_interval_ms(),
            in_progress_backoff_ms: default_in_progress_backoff_ms(),
            check_retry_delay_ms: default_check_retry_delay_ms(),
            scale_retry_backoff_ms: default_scale_retry_backoff_ms(),
            shutdown_deadline_ms: default_shutdown_deadline_ms(),
        }
    }
}

/// Top-level application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub replication: ReplicationConfig,
    /// Statically configured seed peer directory.
    #[serde(default)]
    pub seed_peers: Vec<SeedPeerEntry>,
}

impl AppConfig {
    /// Configuration for tests: in-memory store, three replicable peers,
    /// millisecond-scale polling.
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig::default(),
            metadata: MetadataConfig::Memory,
            replication: ReplicationConfig {
                max_replicas: 5,
                advertise_ip: "127.0.0.1".to_string(),
                poll_interval_ms: 5,
                in_progress_backoff_ms: 10,
                check_retry_delay_ms: 5,
                scale_retry_backoff_ms: 10,
                shutdown_deadline_ms: 500,
            },
            seed_peers: vec![
                SeedPeerEntry {
                    ip: "10.0.0.1".to_string(),
                    object_storage_port: 8004,
                },
                SeedPeerEntry {
                    ip: "10.0.0.2".to_string(),
                    object_storage_port: 8004,
                },
                SeedPeerEntry {
                    ip: "10.0.0.3".to_string(),
                    object_storage_port: 8004,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_delays_match_polling_contract() {
        let config = ReplicationConfig::default();
        assert_eq!(config.poll_interval_ms, 3_000);
        assert_eq!(config.in_progress_backoff_ms, 20_000);
        assert_eq!(config.check_retry_delay_ms, 2_000);
        assert_eq!(config.scale_retry_backoff_ms, 5_000);
    }

    #[test]
    fn metadata_config_deserializes_tagged() {
        let redis: MetadataConfig =
            serde_json::from_str(r#"{"backend":"redis","url":"redis://localhost"}"#).unwrap();
        match redis {
            MetadataConfig::Redis { url } => assert_eq!(url, "redis://localhost"),
            MetadataConfig::Memory => panic!("expected redis backend"),
        }

        let memory: MetadataConfig = serde_json::from_str(r#"{"backend":"memory"}"#).unwrap();
        assert!(matches!(memory, MetadataConfig::Memory));
    }
}
