//! Per-concept index of decoded hierarchy paths.
//!
//! Depth and ancestor computations both start from a concept's paths, so
//! they share this index: each concept's paths are fetched and decoded once
//! and then served from memory.

use std::sync::Arc;
use std::time::Duration;

use crate::config::KernelConfig;
use crate::error::{HierarchyError, Stage};
use crate::hierarchy::cache::{CacheStats, MemoCache};
use crate::hierarchy::fetch::call_store;
use crate::store::ConceptStore;
use crate::types::{ConceptId, HierarchyPath};

/// Decoded paths of one concept.
pub type DecodedPaths = Arc<[HierarchyPath]>;

/// Fetches, decodes and memoizes hierarchy paths.
pub struct PathIndex<S: ConceptStore> {
    store: Arc<S>,
    separator: char,
    fetch_timeout: Duration,
    cache: MemoCache<ConceptId, DecodedPaths>,
}

impl<S: ConceptStore> PathIndex<S> {
    /// Create an index over a store.
    pub fn new(store: Arc<S>, config: &KernelConfig) -> Self {
        Self {
            store,
            separator: config.path_separator,
            fetch_timeout: config.fetch_timeout(),
            cache: MemoCache::new(&config.cache),
        }
    }

    /// Decoded paths of `id`. Empty when the concept has none.
    ///
    /// Fails with `UnknownConcept` only when the store has no such concept.
    pub async fn paths(&self, id: &ConceptId) -> Result<DecodedPaths, HierarchyError> {
        if let Some(hit) = self.cache.get(id) {
            return Ok(hit);
        }

        let raw = call_store(
            Stage::HierarchyPaths,
            id,
            self.fetch_timeout,
            self.store.get_hierarchy_paths(id),
        )
        .await?
        .ok_or_else(|| HierarchyError::UnknownConcept(id.clone()))?;

        let decoded: DecodedPaths = raw
            .iter()
            .map(|r| HierarchyPath::decode(r, self.separator))
            .filter(|p| !p.is_empty())
            .collect();

        tracing::debug!(concept = %id, paths = decoded.len(), "Decoded hierarchy paths");

        self.cache.insert(id.clone(), Arc::clone(&decoded));
        Ok(decoded)
    }

    /// Cache statistics.
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.stats()
    }

    /// Drop cached paths.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}
