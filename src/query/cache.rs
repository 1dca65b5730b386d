//! Query result cache (§F supplementary feature). Repeated identical
//! queries against a read-only, immutable-between-rebuilds index set are a
//! pure win; nothing in spec.md's Non-goals excludes caching the query
//! layer itself (only "online index updates" and "relevance models" are
//! out). Keyed on the raw query text plus source index set rather than a
//! `(query, limit, offset)` triple, since `LIMIT` is already part of the
//! query grammar, and caches a fully-assembled `ResultTable`.

use crate::query::table::ResultTable;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct QueryCacheKey {
    pub source: String,
    pub query_text: String,
}

impl QueryCacheKey {
    pub fn new(source: impl Into<String>, query_text: impl Into<String>) -> Self {
        QueryCacheKey { source: source.into(), query_text: query_text.into() }
    }
}

/// LRU cache over fully-assembled `ResultTable`s, guarded by a `RwLock` so
/// concurrent read-only queries (§5) can share one cache per index-set
/// handle.
pub struct QueryCache {
    entries: RwLock<LruCache<QueryCacheKey, ResultTable>>,
    hit_count: AtomicUsize,
    miss_count: AtomicUsize,
}

impl QueryCache {
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).expect("capacity clamped to at least 1");
        QueryCache {
            entries: RwLock::new(LruCache::new(cap)),
            hit_count: AtomicUsize::new(0),
            miss_count: AtomicUsize::new(0),
        }
    }

    pub fn get(&self, key: &QueryCacheKey) -> Option<ResultTable> {
        let mut cache = self.entries.write().expect("query cache lock poisoned");
        if let Some(table) = cache.get(key) {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            Some(table.clone())
        } else {
            self.miss_count.fetch_add(1, Ordering::Relaxed);
            None
        }
    }

    pub fn put(&self, key: QueryCacheKey, table: ResultTable) {
        self.entries.write().expect("query cache lock poisoned").put(key, table);
    }

    pub fn clear(&self) {
        self.entries.write().expect("query cache lock poisoned").clear();
    }

    pub fn stats(&self) -> QueryCacheStats {
        let cache = self.entries.read().expect("query cache lock poisoned");
        QueryCacheStats {
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
            size: cache.len(),
            capacity: cache.cap().get(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct QueryCacheStats {
    pub hit_count: usize,
    pub miss_count: usize,
    pub size: usize,
    pub capacity: usize,
}

impl QueryCacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_then_hit_updates_counters() {
        let cache = QueryCache::new(4);
        let key = QueryCacheKey::new("c", "FROM c SELECT ?x WHERE CONTAINS(\"cat\", ?x)");
        assert!(cache.get(&key).is_none());

        cache.put(key.clone(), ResultTable::default());
        assert!(cache.get(&key).is_some());

        let stats = cache.stats();
        assert_eq!(stats.hit_count, 1);
        assert_eq!(stats.miss_count, 1);
        assert_eq!(stats.size, 1);
    }

    #[test]
    fn distinct_query_text_is_a_distinct_key() {
        let cache = QueryCache::new(4);
        cache.put(QueryCacheKey::new("c", "A"), ResultTable::default());
        assert!(cache.get(&QueryCacheKey::new("c", "B")).is_none());
    }

    #[test]
    fn eviction_respects_capacity() {
        let cache = QueryCache::new(1);
        cache.put(QueryCacheKey::new("c", "A"), ResultTable::default());
        cache.put(QueryCacheKey::new("c", "B"), ResultTable::default());
        assert!(cache.get(&QueryCacheKey::new("c", "A")).is_none());
        assert!(cache.get(&QueryCacheKey::new("c", "B")).is_some());
    }
}
