//! Dataset records and update patches.

use crate::endpoint::EndpointRecord;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Separator used when persisting the tag list as a single string.
///
/// `_` is reserved: tag values containing it would not round-trip.
pub const TAG_SEPARATOR: char = '_';

/// Separator used in composite store keys. Reserved in names and tags.
pub const KEY_SEPARATOR: char = ':';

/// Replica scaling state of a dataset.
///
/// Serializes as its numeric code, matching the stored decimal encoding
/// and the wire format of the dataset payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReplicaState {
    NoScale = 0,
    ScaleUp = 1,
    ScaleDown = 2,
    Unknown = 3,
}

impl Serialize for ReplicaState {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for ReplicaState {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        u8::deserialize(deserializer).map(Self::from_u8)
    }
}

impl ReplicaState {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Decode a stored state; anything unrecognized reads as `Unknown`.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::NoScale,
            1 => Self::ScaleUp,
            2 => Self::ScaleDown,
            _ => Self::Unknown,
        }
    }
}

/// A catalog dataset record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: String,
    pub name: String,
    pub desc: String,
    /// Desired replica count.
    pub replica: u32,
    /// Opaque policy string consumed by the caching layer.
    pub cache_strategy: String,
    pub tags: Vec<String>,
    /// Authoritative origin copies; the first entry seeds new caches.
    pub share_blob_sources: Vec<EndpointRecord>,
    /// One entry per current replica, ordered.
    pub share_blob_caches: Vec<EndpointRecord>,
    pub replica_state: ReplicaState,
    pub create_time: i64,
    pub update_time: i64,
    /// Hash fields this release does not understand, kept verbatim so a
    /// rolling upgrade does not drop them.
    #[serde(skip)]
    pub extra: BTreeMap<String, String>,
}

impl Dataset {
    /// Reject names that would collide with the composite-key grammar.
    pub fn validate_name(name: &str) -> Result<()> {
        if name.contains(KEY_SEPARATOR) {
            return Err(Error::InvalidParameter(format!(
                "dataset name must not contain {:?}",
                KEY_SEPARATOR
            )));
        }
        Ok(())
    }

    /// Reject tag values containing either reserved separator.
    ///
    /// Tags are persisted `_`-joined; a `_` inside a tag value would not
    /// survive the round trip.
    pub fn validate_tags(tags: &[String]) -> Result<()> {
        for tag in tags {
            if tag.contains(TAG_SEPARATOR) || tag.contains(KEY_SEPARATOR) {
                return Err(Error::InvalidParameter(format!(
                    "tag {tag:?} must not contain {:?} or {:?}",
                    TAG_SEPARATOR, KEY_SEPARATOR
                )));
            }
        }
        Ok(())
    }

    /// Persisted form of the tag list.
    pub fn join_tags(tags: &[String]) -> String {
        tags.join(&TAG_SEPARATOR.to_string())
    }

    /// Inverse of [`Dataset::join_tags`]; the empty string decodes to no tags.
    pub fn split_tags(joined: &str) -> Vec<String> {
        if joined.is_empty() {
            return Vec::new();
        }
        joined.split(TAG_SEPARATOR).map(str::to_string).collect()
    }
}

/// A partial update of a dataset record.
///
/// Only fields that are `Some` are written. `replica` and
/// `share_blob_caches` are owned by the replication controller: the HTTP
/// layer never places caches in a patch, and a replica change is routed
/// through the controller's scale workflows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetPatch {
    pub name: Option<String>,
    pub desc: Option<String>,
    pub replica: Option<u32>,
    pub cache_strategy: Option<String>,
    pub tags: Option<Vec<String>>,
    pub share_blob_sources: Option<Vec<EndpointRecord>>,
    pub share_blob_caches: Option<Vec<EndpointRecord>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip() {
        let tags = vec!["cv".to_string(), "img".to_string()];
        let joined = Dataset::join_tags(&tags);
        assert_eq!(joined, "cv_img");
        assert_eq!(Dataset::split_tags(&joined), tags);
        assert!(Dataset::split_tags("").is_empty());
    }

    #[test]
    fn reserved_separators_rejected() {
        assert!(Dataset::validate_name("a:b").is_err());
        assert!(Dataset::validate_name("imagenet").is_ok());
        assert!(Dataset::validate_tags(&["a_b".to_string()]).is_err());
        assert!(Dataset::validate_tags(&["a:b".to_string()]).is_err());
        assert!(Dataset::validate_tags(&["cv".to_string(), "img".to_string()]).is_ok());
    }

    #[test]
    fn replica_state_decodes_unknown() {
        assert_eq!(ReplicaState::from_u8(0), ReplicaState::NoScale);
        assert_eq!(ReplicaState::from_u8(1), ReplicaState::ScaleUp);
        assert_eq!(ReplicaState::from_u8(2), ReplicaState::ScaleDown);
        assert_eq!(ReplicaState::from_u8(9), ReplicaState::Unknown);
    }
}
