//! Batched atom-to-concept resolution.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{HierarchyError, Stage};
use crate::hierarchy::fetch::call_store;
use crate::store::ConceptStore;
use crate::types::{AtomId, ConceptId};

/// Maps atoms to their owning concepts through one store call.
///
/// Atoms the store cannot resolve are absent from the result. Callers treat
/// a missing entry as "unresolvable", so one bad atom degrades an ancestor
/// set instead of failing it.
pub struct AtomResolver<S: ConceptStore> {
    store: Arc<S>,
    fetch_timeout: Duration,
}

impl<S: ConceptStore> AtomResolver<S> {
    /// Create a resolver over a store.
    pub fn new(store: Arc<S>, fetch_timeout: Duration) -> Self {
        Self { store, fetch_timeout }
    }

    /// Resolve a batch of atoms.
    pub async fn resolve(
        &self,
        atoms: &BTreeSet<AtomId>,
    ) -> Result<BTreeMap<AtomId, ConceptId>, HierarchyError> {
        if atoms.is_empty() {
            return Ok(BTreeMap::new());
        }

        let target = format!("{} atoms", atoms.len());
        let resolved = call_store(
            Stage::AtomResolution,
            target,
            self.fetch_timeout,
            self.store.resolve_atoms_to_concepts(atoms),
        )
        .await?;

        let unresolved = atoms.len().saturating_sub(resolved.len());
        if unresolved > 0 {
            tracing::debug!(
                requested = atoms.len(),
                unresolved = unresolved,
                "Some atoms have no owning concept"
            );
        }

        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryConceptStore;

    #[tokio::test]
    async fn test_resolve_partial() {
        let mut store = InMemoryConceptStore::new();
        store.add_simple_concept("C1", "Root");
        let resolver = AtomResolver::new(Arc::new(store), Duration::from_secs(1));

        let atoms: BTreeSet<AtomId> = ["A1", "A2"].into_iter().map(AtomId::from).collect();
        let resolved = resolver.resolve(&atoms).await.unwrap();

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[&AtomId::new("A1")], ConceptId::new("C1"));
    }

    #[tokio::test]
    async fn test_empty_batch_skips_store() {
        let resolver = AtomResolver::new(Arc::new(InMemoryConceptStore::new()), Duration::from_secs(1));
        let resolved = resolver.resolve(&BTreeSet::new()).await.unwrap();
        assert!(resolved.is_empty());
    }
}
