//! Hierarchy computations over a concept store.
//!
//! ```text
//! ConceptStore → PathIndex → DepthCalculator ─────────────┐
//!                    ↓                                    ↓
//!              AtomResolver → AncestorResolver → LcaFinder → SimilarityEngine
//!                                       (fan-outs via FetchOrchestrator)
//! ```

pub mod cache;
pub mod fetch;
pub mod paths;
pub mod atoms;
pub mod depth;
pub mod ancestors;
pub mod lca;
pub mod similarity;

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::KernelConfig;
use crate::error::{HierarchyError, Stage};
use crate::store::ConceptStore;
use crate::types::{CodeMapping, CodeTranslation, Concept, ConceptId, Depth, LcaResult, Similarity};

pub use ancestors::{AncestorResolver, AncestorSet};
pub use atoms::AtomResolver;
pub use cache::{CacheStats, MemoCache};
pub use depth::{depth_of, DepthCalculator};
pub use fetch::{cancellable, FanOutResults, FetchOrchestrator};
pub use lca::{pick_deepest, LcaFinder};
pub use paths::PathIndex;
pub use similarity::SimilarityEngine;

/// Statistics of the kernel's caches. `None` fields mean caching is off.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct KernelCacheStats {
    /// Decoded path cache.
    pub paths: Option<CacheStats>,
    /// Ancestor set cache.
    pub ancestors: Option<CacheStats>,
}

/// Entry point for the four hierarchy operations plus concept lookups.
///
/// Every operation takes a [`CancellationToken`]; cancelling it stops all
/// in-flight store fetches of that operation and yields
/// [`HierarchyError::Cancelled`].
pub struct TaxonomyKernel<S: ConceptStore> {
    store: Arc<S>,
    config: KernelConfig,
    paths: Arc<PathIndex<S>>,
    depths: Arc<DepthCalculator<S>>,
    ancestors: Arc<AncestorResolver<S>>,
    lca: Arc<LcaFinder<S>>,
    similarity: SimilarityEngine<S>,
}

impl<S: ConceptStore + 'static> TaxonomyKernel<S> {
    /// Wire all components over a shared store handle.
    pub fn new(store: Arc<S>, config: KernelConfig) -> Self {
        let orchestrator = FetchOrchestrator::from_config(&config);
        let paths = Arc::new(PathIndex::new(Arc::clone(&store), &config));
        let atoms = AtomResolver::new(Arc::clone(&store), config.fetch_timeout());
        let depths = Arc::new(DepthCalculator::new(Arc::clone(&paths)));
        let ancestors = Arc::new(AncestorResolver::new(Arc::clone(&paths), atoms, &config.cache));
        let lca = Arc::new(LcaFinder::new(
            Arc::clone(&ancestors),
            Arc::clone(&depths),
            orchestrator.clone(),
            config.depth_fallback,
        ));
        let similarity = SimilarityEngine::new(
            Arc::clone(&lca),
            Arc::clone(&depths),
            orchestrator,
            config.depth_fallback,
        );

        tracing::info!(
            max_parallelism = config.max_parallelism,
            fetch_timeout_ms = config.fetch_timeout_ms,
            cache_enabled = config.cache.enabled,
            cache_entries = config.cache.max_entries,
            depth_fallback = ?config.depth_fallback,
            "Taxonomy kernel initialized"
        );

        Self { store, config, paths, depths, ancestors, lca, similarity }
    }

    /// Kernel over an owned store with default configuration.
    pub fn with_defaults(store: S) -> Self {
        Self::new(Arc::new(store), KernelConfig::default())
    }

    /// Ancestor concepts of `id`, in ascending ID order.
    pub async fn get_ancestors(
        &self,
        id: &ConceptId,
        cancel: &CancellationToken,
    ) -> Result<Vec<ConceptId>, HierarchyError> {
        let set = cancellable(cancel, self.ancestors.ancestors(id)).await?;
        Ok(set.iter().cloned().collect())
    }

    /// Depth of `id`; `Depth::Unknown` when it has no hierarchy path.
    pub async fn get_depth(
        &self,
        id: &ConceptId,
        cancel: &CancellationToken,
    ) -> Result<Depth, HierarchyError> {
        cancellable(cancel, self.depths.depth(id)).await
    }

    /// Lowest common ancestor of two concepts.
    pub async fn find_lca(
        &self,
        c1: &ConceptId,
        c2: &ConceptId,
        cancel: &CancellationToken,
    ) -> Result<LcaResult, HierarchyError> {
        self.lca.find(c1, c2, cancel).await
    }

    /// Wu-Palmer similarity of two concepts.
    pub async fn compute_similarity(
        &self,
        c1: &ConceptId,
        c2: &ConceptId,
        cancel: &CancellationToken,
    ) -> Result<Similarity, HierarchyError> {
        self.similarity.similarity(c1, c2, cancel).await
    }

    /// Concept record with its display name.
    pub async fn get_concept(
        &self,
        id: &ConceptId,
        cancel: &CancellationToken,
    ) -> Result<Concept, HierarchyError> {
        let lookup = fetch::call_store(
            Stage::ConceptLookup,
            id,
            self.config.fetch_timeout(),
            self.store.get_concept(id),
        );
        cancellable(cancel, lookup)
            .await?
            .ok_or_else(|| HierarchyError::UnknownConcept(id.clone()))
    }

    /// Source-vocabulary codes registered for a concept.
    pub async fn get_code_mappings(
        &self,
        id: &ConceptId,
        cancel: &CancellationToken,
    ) -> Result<Vec<CodeMapping>, HierarchyError> {
        let lookup = fetch::call_store(
            Stage::CodeMapping,
            id,
            self.config.fetch_timeout(),
            self.store.get_code_mappings(id),
        );
        cancellable(cancel, lookup)
            .await?
            .ok_or_else(|| HierarchyError::UnknownConcept(id.clone()))
    }

    /// Codes of a concept in one source vocabulary, sorted and deduplicated.
    ///
    /// A known concept without codes in `source` answers an empty list.
    pub async fn get_source_codes(
        &self,
        id: &ConceptId,
        source: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<CodeMapping>, HierarchyError> {
        let mut codes: Vec<CodeMapping> = self
            .get_code_mappings(id, cancel)
            .await?
            .into_iter()
            .filter(|m| m.source == source)
            .collect();
        codes.sort();
        codes.dedup();
        Ok(codes)
    }

    /// Concept registering `code` in vocabulary `source`.
    pub async fn find_concept_by_code(
        &self,
        source: &str,
        code: &str,
        cancel: &CancellationToken,
    ) -> Result<ConceptId, HierarchyError> {
        let lookup = fetch::call_store(
            Stage::CodeLookup,
            format!("{}:{}", source, code),
            self.config.fetch_timeout(),
            self.store.find_concept_by_code(source, code),
        );
        cancellable(cancel, lookup)
            .await?
            .ok_or_else(|| HierarchyError::UnknownCode {
                vocabulary: source.to_string(),
                code: code.to_string(),
            })
    }

    /// Translate a code into another vocabulary through its concept.
    pub async fn translate_code(
        &self,
        source: &str,
        code: &str,
        target: &str,
        cancel: &CancellationToken,
    ) -> Result<CodeTranslation, HierarchyError> {
        let concept = self.find_concept_by_code(source, code, cancel).await?;
        let mappings = self.get_source_codes(&concept, target, cancel).await?;

        tracing::debug!(
            source = source,
            code = code,
            concept = %concept,
            target = target,
            mappings = mappings.len(),
            "Translated code"
        );

        Ok(CodeTranslation {
            source: source.to_string(),
            code: code.to_string(),
            concept,
            target: target.to_string(),
            mappings,
        })
    }

    /// Whether the store is reachable.
    pub async fn is_healthy(&self) -> bool {
        self.store.is_healthy().await
    }

    /// Cache statistics.
    pub fn cache_stats(&self) -> KernelCacheStats {
        KernelCacheStats {
            paths: self.paths.cache_stats(),
            ancestors: self.ancestors.cache_stats(),
        }
    }

    /// Drop every memoized path and ancestor set.
    pub fn clear_caches(&self) {
        self.paths.clear_cache();
        self.ancestors.clear_cache();
    }

    /// Active configuration.
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }
}
