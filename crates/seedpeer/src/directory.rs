//! Seed-peer directory: which peers exist and which can host replicas.

use crate::error::{SeedPeerError, SeedPeerResult};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use urchin_core::config::SeedPeerEntry;

/// One seed peer known to a scheduler.
#[derive(Debug, Clone)]
pub struct SeedPeer {
    pub ip: String,
    /// Port of the peer's object-storage endpoint; 0 means none.
    pub object_storage_port: u16,
}

/// One scheduler entry of the peer directory.
#[derive(Debug, Clone)]
pub struct Scheduler {
    pub seed_peers: Vec<SeedPeer>,
}

/// Read-only directory enumerating schedulers and their seed peers.
#[async_trait]
pub trait SeedPeerDirectory: Send + Sync {
    async fn schedulers(&self) -> SeedPeerResult<Vec<Scheduler>>;
}

/// Directory backed by static configuration.
pub struct StaticDirectory {
    schedulers: Vec<Scheduler>,
}

impl StaticDirectory {
    pub fn new(schedulers: Vec<Scheduler>) -> Self {
        Self { schedulers }
    }

    /// Build a single-scheduler directory from configured peer entries.
    pub fn from_entries(entries: &[SeedPeerEntry]) -> Self {
        let seed_peers = entries
            .iter()
            .map(|entry| SeedPeer {
                ip: entry.ip.clone(),
                object_storage_port: entry.object_storage_port,
            })
            .collect();
        Self::new(vec![Scheduler { seed_peers }])
    }
}

#[async_trait]
impl SeedPeerDirectory for StaticDirectory {
    async fn schedulers(&self) -> SeedPeerResult<Vec<Scheduler>> {
        if self.schedulers.is_empty() {
            return Err(SeedPeerError::Directory(
                "no schedulers configured".to_string(),
            ));
        }
        Ok(self.schedulers.clone())
    }
}

/// Hosts eligible to receive a new replica: every known seed peer whose ip
/// differs from the local advertise ip and whose object-storage port is
/// positive, de-duplicated, then shuffled to balance placement.
pub async fn replicable_seed_peers(
    directory: &dyn SeedPeerDirectory,
    advertise_ip: &str,
) -> SeedPeerResult<Vec<String>> {
    let mut seen = HashSet::new();
    let mut hosts = Vec::new();
    for scheduler in directory.schedulers().await? {
        for peer in scheduler.seed_peers {
            if peer.ip == advertise_ip || peer.object_storage_port == 0 {
                continue;
            }
            let host = format!("{}:{}", peer.ip, peer.object_storage_port);
            if seen.insert(host.clone()) {
                hosts.push(host);
            }
        }
    }

    hosts.shuffle(&mut rand::thread_rng());
    Ok(hosts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(ip: &str, port: u16) -> SeedPeerEntry {
        SeedPeerEntry {
            ip: ip.to_string(),
            object_storage_port: port,
        }
    }

    #[tokio::test]
    async fn filters_local_host_and_storageless_peers() {
        let directory = StaticDirectory::from_entries(&[
            entry("10.0.0.1", 8004),
            entry("10.0.0.2", 0),
            entry("192.168.1.5", 8004),
        ]);

        let mut hosts = replicable_seed_peers(&directory, "192.168.1.5").await.unwrap();
        hosts.sort();
        assert_eq!(hosts, ["10.0.0.1:8004"]);
    }

    #[tokio::test]
    async fn deduplicates_across_schedulers() {
        let peer = SeedPeer {
            ip: "10.0.0.1".to_string(),
            object_storage_port: 8004,
        };
        let directory = StaticDirectory::new(vec![
            Scheduler {
                seed_peers: vec![peer.clone()],
            },
            Scheduler {
                seed_peers: vec![peer],
            },
        ]);

        let hosts = replicable_seed_peers(&directory, "127.0.0.1").await.unwrap();
        assert_eq!(hosts, ["10.0.0.1:8004"]);
    }

    #[tokio::test]
    async fn shuffle_keeps_the_host_set() {
        let directory = StaticDirectory::from_entries(&[
            entry("10.0.0.1", 8004),
            entry("10.0.0.2", 8004),
            entry("10.0.0.3", 8004),
        ]);

        let mut hosts = replicable_seed_peers(&directory, "127.0.0.1").await.unwrap();
        hosts.sort();
        assert_eq!(
            hosts,
            ["10.0.0.1:8004", "10.0.0.2:8004", "10.0.0.3:8004"]
        );
    }

    #[tokio::test]
    async fn empty_directory_is_an_error() {
        let directory = StaticDirectory::new(Vec::new());
        assert!(replicable_seed_peers(&directory, "127.0.0.1").await.is_err());
    }
}
