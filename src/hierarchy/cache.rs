//! Memoization cache for derived hierarchy data.
//!
//! The taxonomy is treated as immutable for the process lifetime, so entries
//! are never invalidated mid-process; eviction is purely capacity-driven.
//! Concurrent misses on the same key both compute and both insert the same
//! value, which only costs a redundant store round-trip.

use std::hash::Hash;
use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::RwLock;

use crate::config::CacheConfig;

/// Fallback capacity when the configured capacity is zero.
const FALLBACK_CAPACITY: usize = 1000;

/// Thread-safe LRU memo keyed by concept.
pub struct MemoCache<K: Hash + Eq, V: Clone> {
    inner: Option<RwLock<LruCache<K, V>>>,
}

impl<K: Hash + Eq, V: Clone> MemoCache<K, V> {
    /// Create a cache; `None` inside when disabled.
    pub fn new(config: &CacheConfig) -> Self {
        let inner = if config.enabled {
            let size = NonZeroUsize::new(config.max_entries)
                .or(NonZeroUsize::new(FALLBACK_CAPACITY))
                .unwrap_or(NonZeroUsize::MIN);
            Some(RwLock::new(LruCache::new(size)))
        } else {
            None
        };
        Self { inner }
    }

    /// Look up a value without touching recency, under the read lock.
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.as_ref()?.read().peek(key).cloned()
    }

    /// Insert or overwrite a value.
    pub fn insert(&self, key: K, value: V) {
        if let Some(cache) = &self.inner {
            cache.write().put(key, value);
        }
    }

    /// Statistics, or `None` if disabled.
    pub fn stats(&self) -> Option<CacheStats> {
        self.inner.as_ref().map(|cache| {
            let cache = cache.read();
            CacheStats {
                len: cache.len(),
                cap: cache.cap().get(),
            }
        })
    }

    /// Drop every entry.
    pub fn clear(&self) {
        if let Some(cache) = &self.inner {
            cache.write().clear();
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    /// Current number of entries in the cache.
    pub len: usize,
    /// Maximum capacity of the cache.
    pub cap: usize,
}
