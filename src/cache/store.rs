//! Local cache partitions a refresher evicts from.
//!
//! Isolated: one LRU partition per entity kind (repository-level caches).
//! Runtime: derived caches addressed by key prefix (partial views, macro output, lookups).
//! IdKeyMap: int id to unique key translations.
//!
//! Every clear runs under a single partition write lock.

use std::sync::RwLock;

use dashmap::DashMap;
use lru::LruCache;
use metrics::counter;
use serde_json::Value;
use uuid::Uuid;

use super::config::CacheConfig;
use super::keys::{self, EntityKind};
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";
const METRIC_EVICTIONS: &str = "cachefarm_cache_evictions_total";

/// A cached entity snapshot plus the metadata predicate eviction needs.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedEntry {
    pub value: Value,
    /// Id of the entity this entry was built from, whatever key it is cached under.
    pub entity_id: Option<i32>,
    /// Normalized tree path (`,-1,12,42,`) for tree entities.
    pub path: Option<String>,
    pub alias: Option<String>,
}

impl CachedEntry {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            entity_id: None,
            path: None,
            alias: None,
        }
    }

    pub fn with_id(mut self, id: i32) -> Self {
        self.entity_id = Some(id);
        self
    }

    pub fn with_path(mut self, path: &str) -> Self {
        self.path = Some(keys::normalize_path(path));
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

fn record_evictions(partition: &'static str, count: usize) {
    if count > 0 {
        counter!(METRIC_EVICTIONS, "partition" => partition).increment(count as u64);
    }
}

// ============================================================================
// Isolated repository caches
// ============================================================================

pub struct IsolatedCaches {
    partitions: Vec<RwLock<LruCache<String, CachedEntry>>>,
}

impl IsolatedCaches {
    pub fn new(config: &CacheConfig) -> Self {
        let partitions = EntityKind::ALL
            .iter()
            .map(|_| RwLock::new(LruCache::new(config.partition_limit_non_zero())))
            .collect();
        Self { partitions }
    }

    fn partition(&self, kind: EntityKind) -> &RwLock<LruCache<String, CachedEntry>> {
        &self.partitions[kind.index()]
    }

    pub fn insert(&self, kind: EntityKind, key: impl Into<String>, entry: CachedEntry) {
        rw_write(self.partition(kind), SOURCE, "isolated.insert").put(key.into(), entry);
    }

    pub fn get(&self, kind: EntityKind, key: &str) -> Option<CachedEntry> {
        rw_write(self.partition(kind), SOURCE, "isolated.get")
            .get(key)
            .cloned()
    }

    pub fn contains(&self, kind: EntityKind, key: &str) -> bool {
        rw_read(self.partition(kind), SOURCE, "isolated.contains").contains(key)
    }

    pub fn len(&self, kind: EntityKind) -> usize {
        rw_read(self.partition(kind), SOURCE, "isolated.len").len()
    }

    pub fn is_empty(&self, kind: EntityKind) -> bool {
        self.len(kind) == 0
    }

    pub fn clear_key(&self, kind: EntityKind, key: &str) -> bool {
        let removed = rw_write(self.partition(kind), SOURCE, "isolated.clear_key")
            .pop(key)
            .is_some();
        record_evictions(kind.as_str(), usize::from(removed));
        removed
    }

    /// Removes every entry matching `predicate` and returns what was removed.
    pub fn remove_where<F>(&self, kind: EntityKind, predicate: F) -> Vec<CachedEntry>
    where
        F: Fn(&str, &CachedEntry) -> bool,
    {
        let mut partition = rw_write(self.partition(kind), SOURCE, "isolated.remove_where");
        let doomed: Vec<String> = partition
            .iter()
            .filter(|(key, entry)| predicate(key.as_str(), entry))
            .map(|(key, _)| key.clone())
            .collect();
        let removed: Vec<CachedEntry> = doomed
            .iter()
            .filter_map(|key| partition.pop(key.as_str()))
            .collect();
        record_evictions(kind.as_str(), removed.len());
        removed
    }

    pub fn clear_where<F>(&self, kind: EntityKind, predicate: F) -> usize
    where
        F: Fn(&str, &CachedEntry) -> bool,
    {
        self.remove_where(kind, predicate).len()
    }

    /// Removes every entry built from entity `id`: its id key plus any
    /// key/alias lookups tagged with the same entity id.
    pub fn evict_entity(&self, kind: EntityKind, id: i32) -> Vec<CachedEntry> {
        let id_key = keys::by_id(id);
        self.remove_where(kind, |key, entry| key == id_key || entry.entity_id == Some(id))
    }

    /// Removes every entry whose path runs through `,marker,`.
    pub fn clear_branch(&self, kind: EntityKind, id: i32) -> usize {
        let marker = keys::branch_marker(id);
        self.clear_where(kind, |_, entry| {
            entry
                .path
                .as_deref()
                .is_some_and(|path| path.contains(&marker))
        })
    }

    pub fn clear(&self, kind: EntityKind) -> usize {
        let mut partition = rw_write(self.partition(kind), SOURCE, "isolated.clear");
        let count = partition.len();
        partition.clear();
        record_evictions(kind.as_str(), count);
        count
    }
}

// ============================================================================
// Runtime cache
// ============================================================================

pub struct RuntimeCache {
    entries: RwLock<LruCache<String, Value>>,
}

impl RuntimeCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.runtime_limit_non_zero())),
        }
    }

    pub fn insert(&self, key: impl Into<String>, value: Value) {
        rw_write(&self.entries, SOURCE, "runtime.insert").put(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        rw_write(&self.entries, SOURCE, "runtime.get").get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        rw_read(&self.entries, SOURCE, "runtime.contains").contains(key)
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "runtime.len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear_key(&self, key: &str) -> bool {
        let removed = rw_write(&self.entries, SOURCE, "runtime.clear_key")
            .pop(key)
            .is_some();
        record_evictions("runtime", usize::from(removed));
        removed
    }

    pub fn clear_prefix(&self, prefix: &str) -> usize {
        self.clear_where(|key, _| key.starts_with(prefix))
    }

    /// Clears lookups under `prefix` that resolve to entity `id`.
    pub fn clear_lookups_to(&self, prefix: &str, id: i32) -> usize {
        self.clear_where(|key, value| key.starts_with(prefix) && value.as_i64() == Some(i64::from(id)))
    }

    pub fn clear_where<F>(&self, predicate: F) -> usize
    where
        F: Fn(&str, &Value) -> bool,
    {
        let mut entries = rw_write(&self.entries, SOURCE, "runtime.clear_where");
        let doomed: Vec<String> = entries
            .iter()
            .filter(|(key, value)| predicate(key.as_str(), value))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            entries.pop(key.as_str());
        }
        record_evictions("runtime", doomed.len());
        doomed.len()
    }

    pub fn clear_all(&self) -> usize {
        let mut entries = rw_write(&self.entries, SOURCE, "runtime.clear_all");
        let count = entries.len();
        entries.clear();
        record_evictions("runtime", count);
        count
    }
}

// ============================================================================
// Id <-> key map
// ============================================================================

#[derive(Default)]
pub struct IdKeyMap {
    keys_by_id: DashMap<i32, Uuid>,
    ids_by_key: DashMap<Uuid, i32>,
}

impl IdKeyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `id` to `key`, dropping any previous pairing of either side.
    pub fn set(&self, id: i32, key: Uuid) {
        if let Some(previous) = self.keys_by_id.insert(id, key)
            && previous != key
        {
            self.ids_by_key.remove_if(&previous, |_, mapped| *mapped == id);
        }
        if let Some(previous) = self.ids_by_key.insert(key, id)
            && previous != id
        {
            self.keys_by_id.remove_if(&previous, |_, mapped| *mapped == key);
        }
    }

    pub fn key_for(&self, id: i32) -> Option<Uuid> {
        self.keys_by_id.get(&id).map(|entry| *entry.value())
    }

    pub fn id_for(&self, key: Uuid) -> Option<i32> {
        self.ids_by_key.get(&key).map(|entry| *entry.value())
    }

    pub fn clear_id(&self, id: i32) {
        if let Some((_, key)) = self.keys_by_id.remove(&id) {
            self.ids_by_key.remove(&key);
        }
    }

    pub fn clear_key(&self, key: Uuid) {
        if let Some((_, id)) = self.ids_by_key.remove(&key) {
            self.keys_by_id.remove(&id);
        }
    }

    pub fn clear_all(&self) {
        self.keys_by_id.clear();
        self.ids_by_key.clear();
    }

    pub fn len(&self) -> usize {
        self.keys_by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys_by_id.is_empty()
    }
}

/// Every local cache a refresher may touch.
pub struct AppCaches {
    pub isolated: IsolatedCaches,
    pub runtime: RuntimeCache,
    pub id_keys: IdKeyMap,
}

impl AppCaches {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            isolated: IsolatedCaches::new(config),
            runtime: RuntimeCache::new(config),
            id_keys: IdKeyMap::new(),
        }
    }
}
