//! Endpoint records: where a copy of a dataset lives.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// A single storage location for dataset contents.
///
/// `endpoint` is the reachable host (`host:port` or a service address) and
/// `endpoint_path` has the form `<bucket>.<object_key>`, split on the first
/// `.` — the dot is reserved at that position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointRecord {
    pub endpoint: String,
    pub endpoint_path: String,
}

impl EndpointRecord {
    pub fn new(endpoint: impl Into<String>, endpoint_path: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            endpoint_path: endpoint_path.into(),
        }
    }

    /// Split `endpoint_path` into `(bucket, object_key)`.
    ///
    /// Fails when the path carries no `.` separator; an endpoint without a
    /// bucket cannot be addressed on a seed peer.
    pub fn bucket_and_object(&self) -> Result<(&str, &str)> {
        self.endpoint_path.split_once('.').ok_or_else(|| {
            Error::Internal(format!(
                "share blob endpoint path {:?} has no bucket separator",
                self.endpoint_path
            ))
        })
    }

    /// Final path component of `endpoint_path`, used to carry a version's
    /// object name onto a freshly cached replica.
    pub fn object_name(&self) -> &str {
        self.endpoint_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.endpoint_path)
    }

    /// Extend `endpoint_path` with a trailing object name.
    pub fn join_object_name(&self, object_name: &str) -> Self {
        let endpoint_path = if self.endpoint_path.ends_with('/') {
            format!("{}{}", self.endpoint_path, object_name)
        } else {
            format!("{}/{}", self.endpoint_path, object_name)
        };
        Self {
            endpoint: self.endpoint.clone(),
            endpoint_path,
        }
    }
}
