//! Redis `KvStore` backend.
//!
//! Every operation acquires a multiplexed connection handle from the shared
//! client, so a dropped connection heals on the next call. The store is
//! treated as serial-per-key; the only compound atomic operation is the
//! field compare-and-set, which runs as a short server-side script.

use crate::error::MetadataResult;
use crate::kv::{KvStore, ScanPage, SortOrder};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::time::Duration;

const SET_MAP_IF_SCRIPT: &str = r#"
local current = redis.call('HGET', KEYS[1], ARGV[1])
if current == ARGV[2] then
  redis.call('HSET', KEYS[1], ARGV[1], ARGV[3])
  return 1
end
return 0
"#;

/// Redis-backed store shared by all controller instances.
pub struct RedisStore {
    client: redis::Client,
    set_map_if: redis::Script,
}

impl RedisStore {
    /// Open a client for `url` and verify connectivity.
    pub async fn connect(url: &str) -> MetadataResult<Self> {
        let client = redis::Client::open(url)?;
        let store = Self {
            client,
            set_map_if: redis::Script::new(SET_MAP_IF_SCRIPT),
        };
        // Fail fast on unreachable or misconfigured stores.
        let mut conn = store.conn().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(store)
    }

    async fn conn(&self) -> MetadataResult<MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> MetadataResult<Option<Vec<u8>>> {
        let mut conn = self.conn().await?;
        Ok(conn.get(key).await?)
    }

    async fn set(&self, key: &str, value: &[u8]) -> MetadataResult<()> {
        let mut conn = self.conn().await?;
        Ok(conn.set(key, value).await?)
    }

    async fn del(&self, key: &str) -> MetadataResult<()> {
        let mut conn = self.conn().await?;
        Ok(conn.del(key).await?)
    }

    async fn exists(&self, key: &str) -> MetadataResult<bool> {
        let mut conn = self.conn().await?;
        Ok(conn.exists(key).await?)
    }

    async fn read_map(&self, key: &str) -> MetadataResult<HashMap<String, Vec<u8>>> {
        let mut conn = self.conn().await?;
        Ok(conn.hgetall(key).await?)
    }

    async fn get_map(&self, key: &str, field: &str) -> MetadataResult<Option<Vec<u8>>> {
        let mut conn = self.conn().await?;
        Ok(conn.hget(key, field).await?)
    }

    async fn set_map(&self, key: &str, field: &str, value: &[u8]) -> MetadataResult<()> {
        let mut conn = self.conn().await?;
        Ok(conn.hset(key, field, value).await?)
    }

    async fn set_map_many(&self, key: &str, fields: &[(String, Vec<u8>)]) -> MetadataResult<()> {
        let mut conn = self.conn().await?;
        Ok(conn.hset_multiple(key, fields).await?)
    }

    async fn del_map(&self, key: &str) -> MetadataResult<()> {
        let mut conn = self.conn().await?;
        Ok(conn.del(key).await?)
    }

    async fn set_map_if(
        &self,
        key: &str,
        field: &str,
        expected: &[u8],
        value: &[u8],
    ) -> MetadataResult<bool> {
        let mut conn = self.conn().await?;
        let swapped: i64 = self
            .set_map_if
            .key(key)
            .arg(field)
            .arg(expected)
            .arg(value)
            .invoke_async(&mut conn)
            .await?;
        Ok(swapped == 1)
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> MetadataResult<()> {
        let mut conn = self.conn().await?;
        Ok(conn.zadd(key, member, score).await?)
    }

    async fn zrem(&self, key: &str, member: &str) -> MetadataResult<()> {
        let mut conn = self.conn().await?;
        Ok(conn.zrem(key, member).await?)
    }

    async fn zrange_by_score(
        &self,
        key: &str,
        lo: f64,
        hi: f64,
        offset: isize,
        count: isize,
        reverse: bool,
    ) -> MetadataResult<Vec<String>> {
        let mut conn = self.conn().await?;
        let members = if reverse {
            conn.zrevrangebyscore_limit(key, hi, lo, offset, count)
                .await?
        } else {
            conn.zrangebyscore_limit(key, lo, hi, offset, count).await?
        };
        Ok(members)
    }

    async fn sadd(&self, key: &str, member: &str) -> MetadataResult<()> {
        let mut conn = self.conn().await?;
        Ok(conn.sadd(key, member).await?)
    }

    async fn set_ttl(&self, key: &str, ttl: Duration) -> MetadataResult<()> {
        let mut conn = self.conn().await?;
        let _: bool = conn.expire(key, ttl.as_secs() as i64).await?;
        Ok(())
    }

    async fn scan(&self, cursor: u64, pattern: &str, batch: usize) -> MetadataResult<ScanPage> {
        let mut conn = self.conn().await?;
        let (cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(batch)
            .query_async(&mut conn)
            .await?;
        Ok(ScanPage { cursor, keys })
    }

    async fn sort(
        &self,
        key: &str,
        by: &str,
        offset: isize,
        count: isize,
        order: SortOrder,
        alpha: bool,
    ) -> MetadataResult<Vec<String>> {
        let mut conn = self.conn().await?;
        let mut cmd = redis::cmd("SORT");
        cmd.arg(key)
            .arg("BY")
            .arg(by)
            .arg("LIMIT")
            .arg(offset)
            .arg(count);
        if alpha {
            cmd.arg("ALPHA");
        }
        cmd.arg(order.as_str());
        Ok(cmd.query_async(&mut conn).await?)
    }
}
