//! Encoding between structured records and store hash fields.
//!
//! The primary hash is a bag of string fields with heterogeneous encodings:
//! plain strings, decimal integers, `_`-joined tags and JSON endpoint
//! lists. Decoding is total — missing fields take their zero value, fields
//! this release does not know are preserved verbatim so partial updates
//! never clobber them during a rolling upgrade.

use crate::error::{MetadataError, MetadataResult};
use std::collections::HashMap;
use urchin_core::{Dataset, DatasetVersion, EndpointRecord, ReplicaState};

pub mod field {
    pub const ID: &str = "id";
    pub const NAME: &str = "name";
    pub const DESC: &str = "desc";
    pub const REPLICA: &str = "replica";
    pub const CACHE_STRATEGY: &str = "cache_strategy";
    pub const TAGS: &str = "tags";
    pub const SHARE_BLOB_SOURCES: &str = "share_blob_sources";
    pub const SHARE_BLOB_CACHES: &str = "share_blob_caches";
    pub const REPLICA_STATE: &str = "replica_state";
    pub const CREATE_TIME: &str = "create_time";
    pub const UPDATE_TIME: &str = "update_time";

    pub const CREATE_AT: &str = "create_at";
    pub const META_SOURCES: &str = "meta_sources";
    pub const META_CACHES: &str = "meta_caches";
}

fn take_string(map: &mut HashMap<String, Vec<u8>>, name: &str) -> String {
    map.remove(name)
        .map(|v| String::from_utf8_lossy(&v).into_owned())
        .unwrap_or_default()
}

fn parse_int<T: std::str::FromStr>(raw: &str, name: &str) -> MetadataResult<T> {
    if raw.is_empty() {
        return "0".parse().map_err(|_| {
            MetadataError::Encoding(format!("field {name}: zero value does not parse"))
        });
    }
    raw.parse()
        .map_err(|_| MetadataError::Encoding(format!("field {name}: {raw:?} is not an integer")))
}

fn parse_endpoints(raw: &str, name: &str) -> MetadataResult<Vec<EndpointRecord>> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(raw)
        .map_err(|e| MetadataError::Encoding(format!("field {name}: {e}")))
}

pub fn encode_endpoints(endpoints: &[EndpointRecord]) -> MetadataResult<Vec<u8>> {
    Ok(serde_json::to_vec(endpoints)?)
}

/// Full field list for a dataset create.
pub fn encode_dataset(dataset: &Dataset) -> MetadataResult<Vec<(String, Vec<u8>)>> {
    let mut fields = vec![
        (field::ID.to_string(), dataset.id.clone().into_bytes()),
        (field::NAME.to_string(), dataset.name.clone().into_bytes()),
        (field::DESC.to_string(), dataset.desc.clone().into_bytes()),
        (
            field::REPLICA.to_string(),
            dataset.replica.to_string().into_bytes(),
        ),
        (
            field::CACHE_STRATEGY.to_string(),
            dataset.cache_strategy.clone().into_bytes(),
        ),
        (
            field::TAGS.to_string(),
            Dataset::join_tags(&dataset.tags).into_bytes(),
        ),
        (
            field::SHARE_BLOB_SOURCES.to_string(),
            encode_endpoints(&dataset.share_blob_sources)?,
        ),
        (
            field::SHARE_BLOB_CACHES.to_string(),
            encode_endpoints(&dataset.share_blob_caches)?,
        ),
        (
            field::REPLICA_STATE.to_string(),
            dataset.replica_state.as_u8().to_string().into_bytes(),
        ),
        (
            field::CREATE_TIME.to_string(),
            dataset.create_time.to_string().into_bytes(),
        ),
        (
            field::UPDATE_TIME.to_string(),
            dataset.update_time.to_string().into_bytes(),
        ),
    ];
    for (name, value) in &dataset.extra {
        fields.push((name.clone(), value.clone().into_bytes()));
    }
    Ok(fields)
}

/// Decode a primary hash into a dataset record.
pub fn decode_dataset(mut map: HashMap<String, Vec<u8>>) -> MetadataResult<Dataset> {
    let id = take_string(&mut map, field::ID);
    let name = take_string(&mut map, field::NAME);
    let desc = take_string(&mut map, field::DESC);
    let replica = parse_int::<u32>(&take_string(&mut map, field::REPLICA), field::REPLICA)?;
    let cache_strategy = take_string(&mut map, field::CACHE_STRATEGY);
    let tags = Dataset::split_tags(&take_string(&mut map, field::TAGS));
    let share_blob_sources = parse_endpoints(
        &take_string(&mut map, field::SHARE_BLOB_SOURCES),
        field::SHARE_BLOB_SOURCES,
    )?;
    let share_blob_caches = parse_endpoints(
        &take_string(&mut map, field::SHARE_BLOB_CACHES),
        field::SHARE_BLOB_CACHES,
    )?;
    let replica_state = ReplicaState::from_u8(parse_int::<u8>(
        &take_string(&mut map, field::REPLICA_STATE),
        field::REPLICA_STATE,
    )?);
    let create_time = parse_int::<i64>(&take_string(&mut map, field::CREATE_TIME), field::CREATE_TIME)?;
    let update_time = parse_int::<i64>(&take_string(&mut map, field::UPDATE_TIME), field::UPDATE_TIME)?;

    let extra = map
        .into_iter()
        .map(|(k, v)| (k, String::from_utf8_lossy(&v).into_owned()))
        .collect();

    Ok(Dataset {
        id,
        name,
        desc,
        replica,
        cache_strategy,
        tags,
        share_blob_sources,
        share_blob_caches,
        replica_state,
        create_time,
        update_time,
        extra,
    })
}

/// Full field list for a version create.
pub fn encode_version(version: &DatasetVersion) -> MetadataResult<Vec<(String, Vec<u8>)>> {
    Ok(vec![
        (field::ID.to_string(), version.id.clone().into_bytes()),
        (field::NAME.to_string(), version.name.clone().into_bytes()),
        (
            field::CREATE_AT.to_string(),
            version.create_at.to_string().into_bytes(),
        ),
        (
            field::META_SOURCES.to_string(),
            encode_endpoints(&version.meta_sources)?,
        ),
        (
            field::META_CACHES.to_string(),
            encode_endpoints(&version.meta_caches)?,
        ),
    ])
}

/// Decode a version hash.
pub fn decode_version(mut map: HashMap<String, Vec<u8>>) -> MetadataResult<DatasetVersion> {
    let id = take_string(&mut map, field::ID);
    let name = take_string(&mut map, field::NAME);
    let create_at = parse_int::<i64>(&take_string(&mut map, field::CREATE_AT), field::CREATE_AT)?;
    let meta_sources = parse_endpoints(
        &take_string(&mut map, field::META_SOURCES),
        field::META_SOURCES,
    )?;
    let meta_caches = parse_endpoints(
        &take_string(&mut map, field::META_CACHES),
        field::META_CACHES,
    )?;
    Ok(DatasetVersion {
        id,
        name,
        create_at,
        meta_sources,
        meta_caches,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset {
            id: "d1".to_string(),
            name: "imagenet".to_string(),
            desc: "classification corpus".to_string(),
            replica: 2,
            cache_strategy: "lru".to_string(),
            tags: vec!["cv".to_string(), "img".to_string()],
            share_blob_sources: vec![EndpointRecord::new("origin:9000", "models.imagenet")],
            share_blob_caches: vec![EndpointRecord::new("peer-a:8004", "cache.imagenet")],
            replica_state: ReplicaState::NoScale,
            create_time: 1_700_000_000,
            update_time: 1_700_000_100,
            extra: Default::default(),
        }
    }

    #[test]
    fn dataset_round_trip() {
        let dataset = sample();
        let fields = encode_dataset(&dataset).unwrap();
        let map: HashMap<String, Vec<u8>> = fields.into_iter().collect();
        let decoded = decode_dataset(map).unwrap();
        assert_eq!(decoded, dataset);
    }

    #[test]
    fn decode_preserves_unknown_fields() {
        let dataset = sample();
        let mut map: HashMap<String, Vec<u8>> =
            encode_dataset(&dataset).unwrap().into_iter().collect();
        map.insert("future_field".to_string(), b"kept".to_vec());

        let decoded = decode_dataset(map).unwrap();
        assert_eq!(decoded.extra.get("future_field").map(String::as_str), Some("kept"));

        // Re-encoding carries the unknown field back out.
        let fields = encode_dataset(&decoded).unwrap();
        assert!(fields
            .iter()
            .any(|(name, value)| name == "future_field" && value == b"kept"));
    }

    #[test]
    fn decode_is_total_on_missing_fields() {
        let decoded = decode_dataset(HashMap::new()).unwrap();
        assert!(decoded.id.is_empty());
        assert_eq!(decoded.replica, 0);
        assert!(decoded.tags.is_empty());
        assert!(decoded.share_blob_sources.is_empty());
        assert_eq!(decoded.replica_state, ReplicaState::NoScale);
    }

    #[test]
    fn decode_rejects_malformed_integers() {
        let mut map = HashMap::new();
        map.insert(field::REPLICA.to_string(), b"many".to_vec());
        assert!(matches!(
            decode_dataset(map),
            Err(MetadataError::Encoding(_))
        ));
    }

    #[test]
    fn version_round_trip() {
        let version = DatasetVersion {
            id: "default".to_string(),
            name: "default dataset version".to_string(),
            create_at: 1_700_000_000,
            meta_sources: vec![EndpointRecord::new("origin:9000", "models.imagenet/meta")],
            meta_caches: vec![],
        };
        let map: HashMap<String, Vec<u8>> =
            encode_version(&version).unwrap().into_iter().collect();
        assert_eq!(decode_version(map).unwrap(), version);
    }
}
