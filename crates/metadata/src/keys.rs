//! Composite-key grammar for the shared KV store.
//!
//! Keys are colon-joined segments under the reserved `urchin:dataset`
//! namespace. Prefix-index keys embed the dataset id as their third
//! segment, which is how scan results are mapped back to ids.

/// Namespace of all dataset keys.
pub const DATASET_PREFIX: &str = "urchin:dataset";

/// Namespace of all dataset-version keys.
pub const DATASET_VERSION_PREFIX: &str = "urchin:dataset_version";

/// Sorted set of dataset ids scored by creation time.
pub const CREATE_TIME_KEY: &str = "urchin:dataset:create_time";

/// Segment index of the dataset id in a prefix-index key.
const ID_SEGMENT: usize = 2;

/// Primary hash of a dataset record.
pub fn dataset_key(id: &str) -> String {
    format!("{DATASET_PREFIX}:{id}")
}

/// Name prefix-index key; its existence is the index.
pub fn name_index_key(id: &str, name: &str) -> String {
    format!("{DATASET_PREFIX}:{id}:match_prefix_name:{name}")
}

/// Tags prefix-index key over the `_`-joined tag string.
pub fn tags_index_key(id: &str, joined_tags: &str) -> String {
    format!("{DATASET_PREFIX}:{id}:match_prefix_tags:{joined_tags}")
}

/// Scan pattern matching every name index containing `search_key`.
pub fn name_search_pattern(search_key: &str) -> String {
    format!("{DATASET_PREFIX}:*:match_prefix_name:*{search_key}*")
}

/// Scan pattern matching every tags index containing `search_key`.
pub fn tags_search_pattern(search_key: &str) -> String {
    format!("{DATASET_PREFIX}:*:match_prefix_tags:*{search_key}*")
}

/// Dataset id embedded in a prefix-index key, if the key is well formed.
pub fn id_from_index_key(key: &str) -> Option<&str> {
    key.split(':').nth(ID_SEGMENT)
}

/// Ephemeral sort-cache set for one listing fingerprint.
pub fn sort_cache_key(fingerprint: &str) -> String {
    format!("{DATASET_PREFIX}:{fingerprint}")
}

/// BY pattern handed to the store's external sort: for each member id the
/// store reads `urchin:dataset:<id> -> <field>` as the sort key.
pub fn sort_by_pattern(field: &str) -> String {
    format!("{DATASET_PREFIX}:*->{field}")
}

/// Hash of one dataset version.
pub fn version_key(dataset_id: &str, version_id: &str) -> String {
    format!("{DATASET_VERSION_PREFIX}:{dataset_id}:{version_id}")
}

/// Scan pattern over all versions of one dataset.
pub fn version_scan_pattern(dataset_id: &str) -> String {
    format!("{DATASET_VERSION_PREFIX}:{dataset_id}:*")
}

/// Replica host list of one dataset.
pub fn replica_key(dataset_id: &str) -> String {
    format!("replica:seed-peer:{dataset_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_key_round_trips_id() {
        let key = name_index_key("abc-123", "imagenet");
        assert_eq!(key, "urchin:dataset:abc-123:match_prefix_name:imagenet");
        assert_eq!(id_from_index_key(&key), Some("abc-123"));

        let tags = tags_index_key("abc-123", "cv_img");
        assert_eq!(id_from_index_key(&tags), Some("abc-123"));
    }

    #[test]
    fn search_patterns_embed_key() {
        assert_eq!(
            name_search_pattern("image"),
            "urchin:dataset:*:match_prefix_name:*image*"
        );
        assert_eq!(
            tags_search_pattern("cv"),
            "urchin:dataset:*:match_prefix_tags:*cv*"
        );
    }

    #[test]
    fn version_keys() {
        let key = version_key("d1", "default");
        assert_eq!(key, "urchin:dataset_version:d1:default");
        assert_eq!(version_scan_pattern("d1"), "urchin:dataset_version:d1:*");
    }

    #[test]
    fn replica_key_shape() {
        assert_eq!(replica_key("d1"), "replica:seed-peer:d1");
    }
}
