//! Paged, sorted and filtered listing over the dataset catalog.
//!
//! Four query shapes, resolved against the creation-time sorted set and the
//! name/tags prefix indexes. Sorted results are produced server-side via
//! the store's external sort; search and time-filter results are
//! materialized into short-lived cache sets so repeated identical queries
//! inside one time bucket reuse the same set.

use crate::error::{MetadataError, MetadataResult};
use crate::keys;
use crate::kv::SortOrder;
use crate::store::KvMetadataStore;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::time::Duration;
use urchin_core::{unix_now, Dataset};

/// Lifetime of an ephemeral sort-cache set.
const SORT_CACHE_TTL: Duration = Duration::from_secs(120);

/// Queries landing in the same bucket share one cache set.
const FINGERPRINT_BUCKET_SECS: i64 = 20;

/// Page size used when draining the creation-time zset into a cache set.
const MATERIALIZE_BATCH: isize = 100;

/// Listing query parameters.
///
/// `page_index` is a raw member offset, not a page number; callers paging
/// by page number multiply by `page_size` themselves. `sort_by` is `1` for
/// ascending and `-1` for descending. A `created_at_*` bound of 0 means
/// unbounded on that side.
#[derive(Debug, Clone)]
pub struct ListQuery {
    pub page_index: isize,
    pub page_size: isize,
    pub search_key: String,
    pub order_by: String,
    pub sort_by: i32,
    pub created_at_less: i64,
    pub created_at_greater: i64,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page_index: 0,
            page_size: 10,
            search_key: String::new(),
            order_by: String::new(),
            sort_by: 1,
            created_at_less: 0,
            created_at_greater: 0,
        }
    }
}

impl ListQuery {
    fn time_filter_active(&self) -> bool {
        self.created_at_less != 0 || self.created_at_greater != 0
    }

    fn time_range(&self) -> (i64, i64) {
        let lo = if self.created_at_greater != 0 {
            self.created_at_greater
        } else {
            0
        };
        let hi = if self.created_at_less != 0 {
            self.created_at_less
        } else {
            unix_now() + 1
        };
        (lo, hi)
    }

    /// Cache-set fingerprint: digest of the query parameters plus a
    /// 20-second-bucketed timestamp.
    fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.search_key.as_bytes());
        hasher.update(self.order_by.as_bytes());
        hasher.update(self.sort_by.to_string().as_bytes());
        hasher.update(self.created_at_less.to_string().as_bytes());
        hasher.update(self.created_at_greater.to_string().as_bytes());
        let digest = hasher.finalize();

        let now = unix_now();
        let bucket = now - now % FINGERPRINT_BUCKET_SECS;
        format!("{}_{bucket}", hex(digest.as_slice()))
    }
}

fn hex(bytes: &[u8]) -> String {
    const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX_CHARS[(byte >> 4) as usize] as char);
        out.push(HEX_CHARS[(byte & 0x0f) as usize] as char);
    }
    out
}

impl KvMetadataStore {
    pub(crate) async fn list_datasets_impl(
        &self,
        query: &ListQuery,
    ) -> MetadataResult<Vec<Dataset>> {
        if query.page_size <= 0 {
            return Err(MetadataError::Internal(format!(
                "page_size {} must be positive",
                query.page_size
            )));
        }

        if query.search_key.is_empty() {
            if query.order_by.is_empty() {
                // Direct range over the creation-time zset.
                let (lo, hi) = query.time_range();
                let members = self
                    .kv()
                    .zrange_by_score(
                        keys::CREATE_TIME_KEY,
                        lo as f64,
                        hi as f64,
                        query.page_index,
                        query.page_size,
                        query.sort_by != 1,
                    )
                    .await?;
                return self.hydrate(members).await;
            }

            // Explicit ordering: external sort over the raw zset, or over a
            // materialized time-range set when a filter is active.
            let sort_key = if query.time_filter_active() {
                let key = keys::sort_cache_key(&query.fingerprint());
                if !self.kv().exists(&key).await? {
                    let members = self.time_range_members(query).await?;
                    self.write_sort_cache(&key, members.iter()).await?;
                }
                key
            } else {
                keys::CREATE_TIME_KEY.to_string()
            };
            let ids = self.sort_page(&sort_key, query).await?;
            return self.hydrate(ids).await;
        }

        // Search: union of name and tags prefix matches, optionally
        // intersected with the creation-time range.
        let key = keys::sort_cache_key(&query.fingerprint());
        if !self.kv().exists(&key).await? {
            let mut matched = self
                .match_index_ids(&keys::name_search_pattern(&query.search_key))
                .await?;
            matched.extend(
                self.match_index_ids(&keys::tags_search_pattern(&query.search_key))
                    .await?,
            );

            if query.time_filter_active() {
                let in_range: HashSet<String> =
                    self.time_range_members(query).await?.into_iter().collect();
                matched.retain(|id| in_range.contains(id));
            }

            self.write_sort_cache(&key, matched.iter()).await?;
        }
        let ids = self.sort_page(&key, query).await?;
        self.hydrate(ids).await
    }

    /// Dataset ids embedded in index keys matching a scan pattern.
    async fn match_index_ids(&self, pattern: &str) -> MetadataResult<HashSet<String>> {
        let keys = self.scan_all(pattern).await?;
        Ok(keys
            .iter()
            .filter_map(|key| keys::id_from_index_key(key))
            .map(str::to_string)
            .collect())
    }

    /// Drain every creation-time member inside the query's range.
    async fn time_range_members(&self, query: &ListQuery) -> MetadataResult<Vec<String>> {
        let (lo, hi) = query.time_range();
        let mut members = Vec::new();
        let mut offset = 0;
        loop {
            let page = self
                .kv()
                .zrange_by_score(
                    keys::CREATE_TIME_KEY,
                    lo as f64,
                    hi as f64,
                    offset,
                    MATERIALIZE_BATCH,
                    false,
                )
                .await?;
            if page.is_empty() {
                break;
            }
            members.extend(page);
            offset += MATERIALIZE_BATCH;
        }
        Ok(members)
    }

    async fn write_sort_cache(
        &self,
        key: &str,
        members: impl Iterator<Item = &String>,
    ) -> MetadataResult<()> {
        for member in members {
            self.kv().sadd(key, member).await?;
        }
        // Rewriting a live cache set concurrently is idempotent; a failed
        // expiry only widens the reuse window.
        if let Err(err) = self.kv().set_ttl(key, SORT_CACHE_TTL).await {
            tracing::warn!(key = %key, error = %err, "failed to set sort cache ttl");
        }
        Ok(())
    }

    /// One page of the external sort over `sort_key`.
    async fn sort_page(&self, sort_key: &str, query: &ListQuery) -> MetadataResult<Vec<String>> {
        let order_by = if query.order_by.is_empty() {
            "create_time"
        } else {
            &query.order_by
        };
        let order = if query.sort_by == -1 {
            SortOrder::Desc
        } else {
            SortOrder::Asc
        };
        self.kv()
            .sort(
                sort_key,
                &keys::sort_by_pattern(order_by),
                query.page_index,
                query.page_size,
                order,
                true,
            )
            .await
    }

    /// Load records for ids, silently dropping ids whose primary hash no
    /// longer exists (indexes are only eventually consistent).
    async fn hydrate(&self, ids: Vec<String>) -> MetadataResult<Vec<Dataset>> {
        use crate::repos::DatasetRepo;

        let mut datasets = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get_dataset(&id).await {
                Ok(dataset) => datasets.push(dataset),
                Err(MetadataError::NotExists(_)) => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(datasets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::repos::DatasetRepo;
    use crate::store::MetadataStore;
    use std::sync::Arc;
    use urchin_core::ReplicaState;

    fn store() -> KvMetadataStore {
        KvMetadataStore::new(Arc::new(MemoryStore::new()))
    }

    async fn seed(store: &KvMetadataStore, id: &str, name: &str, tags: &[&str], create_time: i64) {
        let dataset = Dataset {
            id: id.to_string(),
            name: name.to_string(),
            desc: String::new(),
            replica: 1,
            cache_strategy: String::new(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            share_blob_sources: vec![],
            share_blob_caches: vec![],
            replica_state: ReplicaState::NoScale,
            create_time,
            update_time: create_time,
            extra: Default::default(),
        };
        store.create_dataset(&dataset).await.unwrap();
    }

    async fn seeded() -> KvMetadataStore {
        let store = store();
        seed(&store, "d1", "imagenet", &["cv", "img"], 100).await;
        seed(&store, "d2", "mnist", &["cv"], 200).await;
        seed(&store, "d3", "wikitext", &["nlp"], 300).await;
        store
    }

    fn ids(datasets: &[Dataset]) -> Vec<&str> {
        datasets.iter().map(|d| d.id.as_str()).collect()
    }

    #[tokio::test]
    async fn plain_listing_orders_by_create_time() {
        let store = seeded().await;

        let asc = store.list_datasets(&ListQuery::default()).await.unwrap();
        assert_eq!(ids(&asc), ["d1", "d2", "d3"]);

        let desc = store
            .list_datasets(&ListQuery {
                sort_by: -1,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(ids(&desc), ["d3", "d2", "d1"]);
    }

    #[tokio::test]
    async fn plain_listing_pages_by_raw_offset() {
        let store = seeded().await;
        let page = store
            .list_datasets(&ListQuery {
                page_index: 1,
                page_size: 1,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(ids(&page), ["d2"]);
    }

    #[tokio::test]
    async fn plain_listing_applies_time_range() {
        let store = seeded().await;
        let bounded = store
            .list_datasets(&ListQuery {
                created_at_greater: 150,
                created_at_less: 250,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(ids(&bounded), ["d2"]);
    }

    #[tokio::test]
    async fn order_by_name_uses_external_sort() {
        let store = seeded().await;
        let by_name = store
            .list_datasets(&ListQuery {
                order_by: "name".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(ids(&by_name), ["d1", "d2", "d3"]);

        let by_name_desc = store
            .list_datasets(&ListQuery {
                order_by: "name".to_string(),
                sort_by: -1,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(ids(&by_name_desc), ["d3", "d2", "d1"]);
    }

    #[tokio::test]
    async fn order_by_with_time_filter_materializes_cache_set() {
        let store = seeded().await;
        let query = ListQuery {
            order_by: "name".to_string(),
            created_at_less: 250,
            ..Default::default()
        };

        let first = store.list_datasets(&query).await.unwrap();
        assert_eq!(ids(&first), ["d1", "d2"]);

        // Identical query inside the bucket reuses the cached set.
        let key = keys::sort_cache_key(&query.fingerprint());
        assert!(store.kv().exists(&key).await.unwrap());
        let second = store.list_datasets(&query).await.unwrap();
        assert_eq!(ids(&second), ids(&first));
    }

    #[tokio::test]
    async fn search_matches_names_and_tags_once() {
        let store = seeded().await;

        // "net" hits imagenet by name only.
        let by_name = store
            .list_datasets(&ListQuery {
                search_key: "net".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(ids(&by_name), ["d1"]);

        // "cv" hits d1 and d2 by tags; d1 is not duplicated by also
        // matching through its own tag index.
        let by_tag = store
            .list_datasets(&ListQuery {
                search_key: "cv".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(ids(&by_tag), ["d1", "d2"]);
    }

    #[tokio::test]
    async fn search_intersects_time_range() {
        let store = seeded().await;
        let result = store
            .list_datasets(&ListQuery {
                search_key: "cv".to_string(),
                created_at_greater: 150,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(ids(&result), ["d2"]);
    }

    #[tokio::test]
    async fn search_miss_is_empty() {
        let store = seeded().await;
        let result = store
            .list_datasets(&ListQuery {
                search_key: "nosuch".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn hydrate_drops_stale_index_entries() {
        let store = seeded().await;
        // Simulate a half-deleted record: zset entry without a primary hash.
        store
            .kv()
            .zadd(keys::CREATE_TIME_KEY, "ghost", 150.0)
            .await
            .unwrap();

        let listed = store.list_datasets(&ListQuery::default()).await.unwrap();
        assert_eq!(ids(&listed), ["d1", "d2", "d3"]);
    }
}
