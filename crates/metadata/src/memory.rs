//! In-memory `KvStore` backend.
//!
//! Implements the full adapter contract (hashes, sorted sets, TTL'd sets,
//! glob scan, external sort) against a process-local map. Used by the test
//! suites and by single-node development deployments; semantics follow the
//! Redis backend, including reverse-range pagination and BY-pattern sorts.

use crate::error::{MetadataError, MetadataResult};
use crate::kv::{KvStore, ScanPage, SortOrder};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
enum Value {
    Bytes(Vec<u8>),
    Hash(HashMap<String, Vec<u8>>),
    Zset(BTreeMap<String, f64>),
    Set(HashSet<String>),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Bytes(_) => "string",
            Self::Hash(_) => "hash",
            Self::Zset(_) => "zset",
            Self::Set(_) => "set",
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Instant::now())
    }
}

/// Process-local store backend.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn wrong_type(key: &str, want: &str, got: &str) -> MetadataError {
    MetadataError::Internal(format!("key {key:?} holds a {got}, expected {want}"))
}

/// Glob match supporting `*` (any run of characters) and `?` (any single
/// character), the subset the store's SCAN patterns use.
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    // Iterative wildcard match with a single backtrack point.
    let (mut p, mut t) = (0usize, 0usize);
    let (mut star, mut mark) = (usize::MAX, 0usize);
    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = p;
            mark = t;
            p += 1;
        } else if star != usize::MAX {
            p = star + 1;
            mark += 1;
            t = mark;
        } else {
            return false;
        }
    }
    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }
    p == pattern.len()
}

/// Resolve a `prefix:*->field` BY pattern for one member: the hash key with
/// `*` substituted and the field to read from it.
fn resolve_by_pattern(by: &str, member: &str) -> Option<(String, String)> {
    let (key_pattern, field) = by.split_once("->")?;
    Some((key_pattern.replace('*', member), field.to_string()))
}

/// Lazy TTL expiry: drop the entry under `key` if its deadline passed.
fn purge_if_expired(entries: &mut HashMap<String, Entry>, key: &str) {
    if entries.get(key).is_some_and(Entry::expired) {
        entries.remove(key);
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> MetadataResult<Option<Vec<u8>>> {
        let mut entries = self.entries.lock().unwrap();
        purge_if_expired(&mut entries, key);
        match entries.get(key) {
            Some(entry) => match &entry.value {
                Value::Bytes(bytes) => Ok(Some(bytes.clone())),
                other => Err(wrong_type(key, "string", other.type_name())),
            },
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &[u8]) -> MetadataResult<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), Entry::new(Value::Bytes(value.to_vec())));
        Ok(())
    }

    async fn del(&self, key: &str) -> MetadataResult<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> MetadataResult<bool> {
        let mut entries = self.entries.lock().unwrap();
        purge_if_expired(&mut entries, key);
        Ok(entries.contains_key(key))
    }

    async fn read_map(&self, key: &str) -> MetadataResult<HashMap<String, Vec<u8>>> {
        let mut entries = self.entries.lock().unwrap();
        purge_if_expired(&mut entries, key);
        match entries.get(key) {
            Some(entry) => match &entry.value {
                Value::Hash(map) => Ok(map.clone()),
                other => Err(wrong_type(key, "hash", other.type_name())),
            },
            None => Ok(HashMap::new()),
        }
    }

    async fn get_map(&self, key: &str, field: &str) -> MetadataResult<Option<Vec<u8>>> {
        let map = self.read_map(key).await?;
        Ok(map.get(field).cloned())
    }

    async fn set_map(&self, key: &str, field: &str, value: &[u8]) -> MetadataResult<()> {
        self.set_map_many(key, &[(field.to_string(), value.to_vec())])
            .await
    }

    async fn set_map_many(&self, key: &str, fields: &[(String, Vec<u8>)]) -> MetadataResult<()> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(Value::Hash(HashMap::new())));
        if entry.expired() {
            *entry = Entry::new(Value::Hash(HashMap::new()));
        }
        match &mut entry.value {
            Value::Hash(map) => {
                for (field, value) in fields {
                    map.insert(field.clone(), value.clone());
                }
                Ok(())
            }
            other => Err(wrong_type(key, "hash", other.type_name())),
        }
    }

    async fn del_map(&self, key: &str) -> MetadataResult<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn set_map_if(
        &self,
        key: &str,
        field: &str,
        expected: &[u8],
        value: &[u8],
    ) -> MetadataResult<bool> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(Value::Hash(HashMap::new())));
        if entry.expired() {
            *entry = Entry::new(Value::Hash(HashMap::new()));
        }
        match &mut entry.value {
            Value::Hash(map) => match map.get(field) {
                Some(current) if current.as_slice() == expected => {
                    map.insert(field.to_string(), value.to_vec());
                    Ok(true)
                }
                _ => Ok(false),
            },
            other => Err(wrong_type(key, "hash", other.type_name())),
        }
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> MetadataResult<()> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(Value::Zset(BTreeMap::new())));
        if entry.expired() {
            *entry = Entry::new(Value::Zset(BTreeMap::new()));
        }
        match &mut entry.value {
            Value::Zset(set) => {
                set.insert(member.to_string(), score);
                Ok(())
            }
            other => Err(wrong_type(key, "zset", other.type_name())),
        }
    }

    async fn zrem(&self, key: &str, member: &str) -> MetadataResult<()> {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(key) {
            if let Value::Zset(set) = &mut entry.value {
                set.remove(member);
            }
        }
        Ok(())
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
        let mut entries = self.entries.lock().unwrap();
        purge_if_expired(&mut entries, key);
        let set = match entries.get(key) {
            Some(entry) => match &entry.value {
                Value::Zset(set) => set,
                other => return Err(wrong_type(key, "zset", other.type_name())),
            },
            None => return Ok(Vec::new()),
        };

        let mut ranked: Vec<(&String, f64)> = set
            .iter()
            .filter(|(_, score)| **score >= lo && **score <= hi)
            .map(|(member, score)| (member, *score))
            .collect();
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        if reverse {
            ranked.reverse();
        }

        let offset = offset.max(0) as usize;
        let members = ranked.into_iter().skip(offset).map(|(m, _)| m.clone());
        Ok(if count < 0 {
            members.collect()
        } else {
            members.take(count as usize).collect()
        })
    }

    async fn sadd(&self, key: &str, member: &str) -> MetadataResult<()> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(Value::Set(HashSet::new())));
        if entry.expired() {
            *entry = Entry::new(Value::Set(HashSet::new()));
        }
        match &mut entry.value {
            Value::Set(set) => {
                set.insert(member.to_string());
                Ok(())
            }
            other => Err(wrong_type(key, "set", other.type_name())),
        }
    }

    async fn set_ttl(&self, key: &str, ttl: Duration) -> MetadataResult<()> {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(key) {
            entry.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    async fn scan(&self, _cursor: u64, pattern: &str, _batch: usize) -> MetadataResult<ScanPage> {
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|_, entry| !entry.expired());
        let mut keys: Vec<String> = entries
            .keys()
            .filter(|key| glob_match(pattern, key))
            .cloned()
            .collect();
        keys.sort();
        // The whole keyspace fits one page; cursor 0 terminates the scan.
        Ok(ScanPage { cursor: 0, keys })
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
        let mut entries = self.entries.lock().unwrap();
        purge_if_expired(&mut entries, key);
        let members: Vec<String> = match entries.get(key) {
            Some(entry) => match &entry.value {
                Value::Set(set) => set.iter().cloned().collect(),
                Value::Zset(set) => set.keys().cloned().collect(),
                other => return Err(wrong_type(key, "set or zset", other.type_name())),
            },
            None => return Ok(Vec::new()),
        };

        let mut keyed: Vec<(String, String)> = members
            .into_iter()
            .map(|member| {
                let sort_key = resolve_by_pattern(by, &member)
                    .and_then(|(hash_key, field)| match entries.get(&hash_key) {
                        Some(entry) if !entry.expired() => match &entry.value {
                            Value::Hash(map) => map
                                .get(&field)
                                .map(|v| String::from_utf8_lossy(v).into_owned()),
                            _ => None,
                        },
                        _ => None,
                    })
                    .unwrap_or_default();
                (sort_key, member)
            })
            .collect();

        if alpha {
            keyed.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        } else {
            keyed.sort_by(|a, b| {
                let fa: f64 = a.0.parse().unwrap_or(0.0);
                let fb: f64 = b.0.parse().unwrap_or(0.0);
                fa.total_cmp(&fb).then_with(|| a.1.cmp(&b.1))
            });
        }
        if order == SortOrder::Desc {
            keyed.reverse();
        }

        let offset = offset.max(0) as usize;
        let members = keyed.into_iter().skip(offset).map(|(_, m)| m);
        Ok(if count < 0 {
            members.collect()
        } else {
            members.take(count as usize).collect()
        })
    }
}
