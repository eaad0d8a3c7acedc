//! Scripted mock seed-peer client.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use urchin_seedpeer::{FolderStatus, SeedPeerClient, SeedPeerError, SeedPeerResult};

/// Mock seed peer fleet: records calls and completes cache pulls after a
/// configurable number of in-progress polls.
#[derive(Default)]
pub struct MockSeedPeers {
    /// `(host, bucket, object_key)` of every accepted cache request.
    pub cache_calls: Mutex<Vec<(String, String, String)>>,
    /// `(host, bucket, object_key)` of every destroy request.
    pub destroy_calls: Mutex<Vec<(String, String, String)>>,
    /// Hosts whose status checks always fail with a 503.
    pub failing_hosts: Mutex<HashSet<String>>,
    /// How many times each pull reports in-progress before completing.
    pub in_progress_polls: Mutex<u32>,
    /// Remaining in-progress polls per `(host, object_key)`.
    pending: Mutex<HashMap<(String, String), u32>>,
}

impl MockSeedPeers {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(dead_code)]
    pub fn fail_host(&self, host: &str) {
        self.failing_hosts.lock().unwrap().insert(host.to_string());
    }

    #[allow(dead_code)]
    pub fn set_in_progress_polls(&self, polls: u32) {
        *self.in_progress_polls.lock().unwrap() = polls;
    }

    #[allow(dead_code)]
    pub fn destroyed_hosts(&self) -> Vec<String> {
        self.destroy_calls
            .lock()
            .unwrap()
            .iter()
            .map(|(host, _, _)| host.clone())
            .collect()
    }
}

#[async_trait]
impl SeedPeerClient for MockSeedPeers {
    async fn cache_folder(&self, host: &str, bucket: &str, object_key: &str) -> SeedPeerResult<()> {
        self.cache_calls.lock().unwrap().push((
            host.to_string(),
            bucket.to_string(),
            object_key.to_string(),
        ));
        let polls = *self.in_progress_polls.lock().unwrap();
        self.pending
            .lock()
            .unwrap()
            .insert((host.to_string(), object_key.to_string()), polls);
        Ok(())
    }

    async fn check_folder(
        &self,
        host: &str,
        bucket: &str,
        object_key: &str,
    ) -> SeedPeerResult<FolderStatus> {
        if self.failing_hosts.lock().unwrap().contains(host) {
            return Err(SeedPeerError::BadStatus {
                host: host.to_string(),
                operation: "check_folder",
                status: 503,
            });
        }

        let key = (host.to_string(), object_key.to_string());
        let mut pending = self.pending.lock().unwrap();
        let remaining = pending.entry(key).or_insert(0);
        if *remaining > 0 {
            *remaining -= 1;
            return Ok(FolderStatus {
                status_code: FolderStatus::IN_PROGRESS,
                data_endpoint: String::new(),
                data_root: String::new(),
                data_path: String::new(),
            });
        }

        // The completed copy lives on this peer under the same bucket and
        // object key it was pulled from.
        Ok(FolderStatus {
            status_code: FolderStatus::DONE,
            data_endpoint: host.to_string(),
            data_root: bucket.to_string(),
            data_path: object_key.to_string(),
        })
    }

    async fn destroy_folder(
        &self,
        host: &str,
        bucket: &str,
        object_key: &str,
    ) -> SeedPeerResult<()> {
        self.destroy_calls.lock().unwrap().push((
            host.to_string(),
            bucket.to_string(),
            object_key.to_string(),
        ));
        Ok(())
    }
}
