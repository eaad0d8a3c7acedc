//! Outbound HTTP client for seed-peer folder operations.

use crate::error::{SeedPeerError, SeedPeerResult};
use async_trait::async_trait;
use serde::Deserialize;
use urchin_core::EndpointRecord;

/// Folder pull status reported by a seed peer's `check_folder` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct FolderStatus {
    #[serde(rename = "StatusCode")]
    pub status_code: i64,
    #[serde(rename = "DataEndpoint", default)]
    pub data_endpoint: String,
    #[serde(rename = "DataRoot", default)]
    pub data_root: String,
    #[serde(rename = "DataPath", default)]
    pub data_path: String,
}

impl FolderStatus {
    /// Pull finished; the endpoint record is valid.
    pub const DONE: i64 = 0;
    /// Pull still running.
    pub const IN_PROGRESS: i64 = 1;

    /// Location of the completed cache copy.
    pub fn endpoint_record(&self) -> EndpointRecord {
        EndpointRecord::new(
            self.data_endpoint.clone(),
            format!("{}.{}", self.data_root, self.data_path),
        )
    }
}

/// Remote folder operations against one seed peer.
///
/// All three calls are idempotent by intent: `cache_folder` re-requests an
/// already running pull, `destroy_folder` of an absent folder is a success
/// on the peer side.
#[async_trait]
pub trait SeedPeerClient: Send + Sync {
    /// Start an asynchronous pull of `<bucket>.<object_key>` onto `host`.
    /// Success means accepted, not completed.
    async fn cache_folder(&self, host: &str, bucket: &str, object_key: &str)
        -> SeedPeerResult<()>;

    /// Report pull progress for `<bucket>.<object_key>` on `host`.
    async fn check_folder(
        &self,
        host: &str,
        bucket: &str,
        object_key: &str,
    ) -> SeedPeerResult<FolderStatus>;

    /// Evict `<bucket>.<object_key>` from `host`.
    async fn destroy_folder(
        &self,
        host: &str,
        bucket: &str,
        object_key: &str,
    ) -> SeedPeerResult<()>;
}

/// reqwest-backed [`SeedPeerClient`].
#[derive(Clone, Default)]
pub struct HttpSeedPeerClient {
    http: reqwest::Client,
}

impl HttpSeedPeerClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn url(host: &str, bucket: &str, operation: &str, object_key: &str) -> String {
        format!("http://{host}/buckets/{bucket}/{operation}/{object_key}")
    }

    fn check_status(
        host: &str,
        operation: &'static str,
        response: &reqwest::Response,
    ) -> SeedPeerResult<()> {
        let status = response.status();
        if !status.is_success() {
            return Err(SeedPeerError::BadStatus {
                host: host.to_string(),
                operation,
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SeedPeerClient for HttpSeedPeerClient {
    async fn cache_folder(
        &self,
        host: &str,
        bucket: &str,
        object_key: &str,
    ) -> SeedPeerResult<()> {
        let url = Self::url(host, bucket, "cache_folder", object_key);
        let response = self.http.post(&url).send().await?;
        Self::check_status(host, "cache_folder", &response)
    }

    async fn check_folder(
        &self,
        host: &str,
        bucket: &str,
        object_key: &str,
    ) -> SeedPeerResult<FolderStatus> {
        let url = Self::url(host, bucket, "check_folder", object_key);
        let response = self.http.get(&url).send().await?;
        Self::check_status(host, "check_folder", &response)?;
        Ok(response.json().await?)
    }

    async fn destroy_folder(
        &self,
        host: &str,
        bucket: &str,
        object_key: &str,
    ) -> SeedPeerResult<()> {
        let url = Self::url(host, bucket, "destroy_folder", object_key);
        let response = self.http.delete(&url).send().await?;
        Self::check_status(host, "destroy_folder", &response)
    }
}
