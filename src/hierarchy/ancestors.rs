//! Ancestor sets.
//!
//! ## Algorithm
//!
//! 1. Fetch the concept's decoded paths from the path index
//! 2. Union every non-terminal atom across all paths
//! 3. Batch-resolve the union to owning concepts
//! 4. Remove the concept itself
//!
//! Step 4 holds even when an ancestor position carries an atom of the
//! queried concept, so an ancestor set never contains its own concept.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::config::CacheConfig;
use crate::error::HierarchyError;
use crate::hierarchy::atoms::AtomResolver;
use crate::hierarchy::cache::{CacheStats, MemoCache};
use crate::hierarchy::paths::PathIndex;
use crate::store::ConceptStore;
use crate::types::{AtomId, ConceptId};

/// Shared, immutable ancestor set.
pub type AncestorSet = Arc<BTreeSet<ConceptId>>;

/// Computes and memoizes ancestor sets.
pub struct AncestorResolver<S: ConceptStore> {
    paths: Arc<PathIndex<S>>,
    atoms: AtomResolver<S>,
    cache: MemoCache<ConceptId, AncestorSet>,
}

impl<S: ConceptStore> AncestorResolver<S> {
    /// Create a resolver.
    pub fn new(paths: Arc<PathIndex<S>>, atoms: AtomResolver<S>, cache: &CacheConfig) -> Self {
        Self {
            paths,
            atoms,
            cache: MemoCache::new(cache),
        }
    }

    /// Ancestor concepts of `id`.
    ///
    /// Empty for a known concept without paths; `UnknownConcept` only when
    /// the store has no such concept.
    pub async fn ancestors(&self, id: &ConceptId) -> Result<AncestorSet, HierarchyError> {
        if let Some(hit) = self.cache.get(id) {
            return Ok(hit);
        }

        let paths = self.paths.paths(id).await?;
        let atoms: BTreeSet<AtomId> = paths
            .iter()
            .flat_map(|p| p.ancestor_atoms().iter().cloned())
            .collect();

        let resolved = self.atoms.resolve(&atoms).await?;
        let mut ancestors: BTreeSet<ConceptId> = resolved.into_values().collect();
        ancestors.remove(id);

        tracing::debug!(
            concept = %id,
            paths = paths.len(),
            atoms = atoms.len(),
            ancestors = ancestors.len(),
            "Resolved ancestor set"
        );

        let ancestors = Arc::new(ancestors);
        self.cache.insert(id.clone(), Arc::clone(&ancestors));
        Ok(ancestors)
    }

    /// Cache statistics.
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.stats()
    }

    /// Drop cached ancestor sets.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}
