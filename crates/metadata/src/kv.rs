//! Typed primitives over the shared KV + sorted-set store.
//!
//! The store is a shared, racy-but-serial-per-key resource. The adapter
//! exposes single-key primitives only; there are no multi-key transactions.
//! The one atomic compound operation is [`KvStore::set_map_if`], the
//! per-field compare-and-set that guards replica-state transitions.

use crate::error::MetadataResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Direction of a server-side sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// One page of a cooperative key scan. The scan is finished when the
/// returned cursor is 0.
#[derive(Debug, Clone)]
pub struct ScanPage {
    pub cursor: u64,
    pub keys: Vec<String>,
}

/// Typed operations over the remote KV store.
#[async_trait]
pub trait KvStore: Send + Sync {
    // Plain keys.
    async fn get(&self, key: &str) -> MetadataResult<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: &[u8]) -> MetadataResult<()>;
    async fn del(&self, key: &str) -> MetadataResult<()>;
    async fn exists(&self, key: &str) -> MetadataResult<bool>;

    // Hash maps.
    async fn read_map(&self, key: &str) -> MetadataResult<HashMap<String, Vec<u8>>>;
    async fn get_map(&self, key: &str, field: &str) -> MetadataResult<Option<Vec<u8>>>;
    async fn set_map(&self, key: &str, field: &str, value: &[u8]) -> MetadataResult<()>;
    async fn set_map_many(&self, key: &str, fields: &[(String, Vec<u8>)]) -> MetadataResult<()>;
    async fn del_map(&self, key: &str) -> MetadataResult<()>;

    /// Write `field` to `value` only if its current value equals
    /// `expected`. Returns whether the write happened. Atomic per key.
    async fn set_map_if(
        &self,
        key: &str,
        field: &str,
        expected: &[u8],
        value: &[u8],
    ) -> MetadataResult<bool>;

    // Sorted sets.
    async fn zadd(&self, key: &str, member: &str, score: f64) -> MetadataResult<()>;
    async fn zrem(&self, key: &str, member: &str) -> MetadataResult<()>;

    /// Members with scores in `[lo, hi]`, paged by `(offset, count)`.
    /// `reverse` flips to descending-score order (offset applies in that
    /// order, as the store's reverse range does).
    async fn zrange_by_score(
        &self,
        key: &str,
        lo: f64,
        hi: f64,
        offset: isize,
        count: isize,
        reverse: bool,
    ) -> MetadataResult<Vec<String>>;

    // Plain sets with TTL, used for ephemeral sort caches.
    async fn sadd(&self, key: &str, member: &str) -> MetadataResult<()>;
    async fn set_ttl(&self, key: &str, ttl: Duration) -> MetadataResult<()>;

    /// One page of a cooperative scan over keys matching a glob pattern.
    async fn scan(&self, cursor: u64, pattern: &str, batch: usize) -> MetadataResult<ScanPage>;

    /// Server-side external sort of a set or sorted set.
    ///
    /// For each member `m`, the `by` pattern (`prefix:*->field`)
    /// substitutes `*` with `m` and the referenced hash field becomes the
    /// sort key; `alpha` selects lexicographic ordering.
    async fn sort(
        &self,
        key: &str,
        by: &str,
        offset: isize,
        count: isize,
        order: SortOrder,
        alpha: bool,
    ) -> MetadataResult<Vec<String>>;
}
