//! Integration tests for the hierarchy queries.
//!
//! These tests drive `TaxonomyKernel` end to end against the in-memory store
//! and two wrappers around it:
//! 1. `FaultyStore` fails path lookups for chosen concepts
//! 2. `SlowStore` delays path lookups and counts the ones that finish
//!
//! Covered behavior:
//! - Path decoding into ancestor sets
//! - Depth over multiple paths
//! - LCA selection, fallback ranking and tie-break
//! - Wu-Palmer scores and error symmetry
//! - Cancellation and upstream timeouts

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use taxonomy_kernel::{
    Atom, AtomId, CancellationToken, CodeMapping, Concept, ConceptId, ConceptStore, Depth,
    DepthFallback, HierarchyError, InMemoryConceptStore, KernelConfig, Stage, StoreError,
    TaxonomyKernel,
};

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn id(s: &str) -> ConceptId {
    ConceptId::new(s)
}

#[derive(Debug, thiserror::Error)]
enum TestStoreError {
    #[error("injected failure for {0}")]
    Injected(ConceptId),
    #[error("inner store: {0}")]
    Inner(String),
}

impl StoreError for TestStoreError {}

/// Fails `get_hierarchy_paths` for every concept in `failing`.
struct FaultyStore {
    inner: InMemoryConceptStore,
    failing: BTreeSet<ConceptId>,
}

#[async_trait]
impl ConceptStore for FaultyStore {
    type Error = TestStoreError;

    async fn get_concept(&self, id: &ConceptId) -> Result<Option<Concept>, Self::Error> {
        self.inner.get_concept(id).await.map_err(|e| TestStoreError::Inner(e.to_string()))
    }

    async fn get_hierarchy_paths(&self, id: &ConceptId) -> Result<Option<Vec<String>>, Self::Error> {
        if self.failing.contains(id) {
            return Err(TestStoreError::Injected(id.clone()));
        }
        self.inner
            .get_hierarchy_paths(id)
            .await
            .map_err(|e| TestStoreError::Inner(e.to_string()))
    }

    async fn resolve_atoms_to_concepts(
        &self,
        atoms: &BTreeSet<AtomId>,
    ) -> Result<BTreeMap<AtomId, ConceptId>, Self::Error> {
        self.inner
            .resolve_atoms_to_concepts(atoms)
            .await
            .map_err(|e| TestStoreError::Inner(e.to_string()))
    }

    async fn get_code_mappings(&self, id: &ConceptId) -> Result<Option<Vec<CodeMapping>>, Self::Error> {
        self.inner.get_code_mappings(id).await.map_err(|e| TestStoreError::Inner(e.to_string()))
    }

    async fn find_concept_by_code(
        &self,
        source: &str,
        code: &str,
    ) -> Result<Option<ConceptId>, Self::Error> {
        self.inner
            .find_concept_by_code(source, code)
            .await
            .map_err(|e| TestStoreError::Inner(e.to_string()))
    }
}

/// Delays `get_hierarchy_paths` for every concept in `slow`.
///
/// `completed` counts delayed lookups that ran to completion; `in_flight`
/// counts delayed lookups whose future has not been dropped yet.
struct SlowStore {
    inner: InMemoryConceptStore,
    slow: BTreeSet<ConceptId>,
    delay: Duration,
    completed: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
}

impl SlowStore {
    fn new(inner: InMemoryConceptStore, slow: &[&str], delay: Duration) -> Self {
        Self {
            inner,
            slow: slow.iter().map(|s| id(s)).collect(),
            delay,
            completed: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }
}

/// Decrements the in-flight counter when the owning lookup is dropped.
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConceptStore for SlowStore {
    type Error = TestStoreError;

    async fn get_concept(&self, id: &ConceptId) -> Result<Option<Concept>, Self::Error> {
        self.inner.get_concept(id).await.map_err(|e| TestStoreError::Inner(e.to_string()))
    }

    async fn get_hierarchy_paths(&self, id: &ConceptId) -> Result<Option<Vec<String>>, Self::Error> {
        if self.slow.contains(id) {
            let _guard = InFlight::enter(&self.in_flight);
            tokio::time::sleep(self.delay).await;
            self.completed.fetch_add(1, Ordering::SeqCst);
        }
        self.inner
            .get_hierarchy_paths(id)
            .await
            .map_err(|e| TestStoreError::Inner(e.to_string()))
    }

    async fn resolve_atoms_to_concepts(
        &self,
        atoms: &BTreeSet<AtomId>,
    ) -> Result<BTreeMap<AtomId, ConceptId>, Self::Error> {
        self.inner
            .resolve_atoms_to_concepts(atoms)
            .await
            .map_err(|e| TestStoreError::Inner(e.to_string()))
    }

    async fn get_code_mappings(&self, id: &ConceptId) -> Result<Option<Vec<CodeMapping>>, Self::Error> {
        self.inner.get_code_mappings(id).await.map_err(|e| TestStoreError::Inner(e.to_string()))
    }

    async fn find_concept_by_code(
        &self,
        source: &str,
        code: &str,
    ) -> Result<Option<ConceptId>, Self::Error> {
        self.inner
            .find_concept_by_code(source, code)
            .await
            .map_err(|e| TestStoreError::Inner(e.to_string()))
    }
}

/// `C100` (depth 1) > `C200` (depth 2) > `C1` (depth 3)
/// `C100` > `C200` > `C21` > `C22` > `C2` (depth 5)
/// `C300` is a second root with child `C301`.
fn measured_store() -> InMemoryConceptStore {
    let mut store = InMemoryConceptStore::new();
    for cid in ["C100", "C200", "C1", "C21", "C22", "C2", "C300", "C301"] {
        store.add_simple_concept(cid, &format!("Concept {}", cid));
    }
    store.add_path("C100", "A100");
    store.add_path("C200", "A100.A200");
    store.add_path("C1", "A100.A200.A1");
    store.add_path("C21", "A100.A200.A21");
    store.add_path("C22", "A100.A200.A21.A22");
    store.add_path("C2", "A100.A200.A21.A22.A2");
    store.add_path("C300", "A300");
    store.add_path("C301", "A300.A301");
    store
}

fn kernel_with<S: ConceptStore + 'static>(store: S, config: KernelConfig) -> TaxonomyKernel<S> {
    TaxonomyKernel::new(Arc::new(store), config)
}

// ─────────────────────────────────────────────────────────────────────────────
// Ancestors and Depth
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_path_decoding_excludes_terminal_concept() {
    let mut store = InMemoryConceptStore::new();
    store.add_concept(Concept::new("C1", "Top"));
    store.add_concept(Concept::new("C2", "Middle"));
    store.add_concept(Concept::new("C9", "Leaf"));
    store.add_atom(Atom::new("A1", "C1", "SRC", "T1", "Top"));
    store.add_atom(Atom::new("A2", "C2", "SRC", "T2", "Middle"));
    store.add_atom(Atom::new("A3", "C9", "SRC", "T9", "Leaf"));
    store.add_path("C9", "A1.A2.A3");

    let kernel = TaxonomyKernel::with_defaults(store);
    let ancestors = kernel.get_ancestors(&id("C9"), &CancellationToken::new()).await.unwrap();

    assert_eq!(ancestors, vec![id("C1"), id("C2")]);
    assert!(!ancestors.contains(&id("C9")));
}

#[tokio::test]
async fn test_depth_takes_longest_path() {
    let mut store = measured_store();
    store.add_simple_concept("C5", "Two parents");
    store.add_path("C5", "A100.A5");
    store.add_path("C5", "A100.A200.A21.A5");

    let kernel = TaxonomyKernel::with_defaults(store);
    let depth = kernel.get_depth(&id("C5"), &CancellationToken::new()).await.unwrap();
    assert_eq!(depth, Depth::Known(4));
}

#[tokio::test]
async fn test_concept_without_paths() {
    let mut store = measured_store();
    store.add_simple_concept("C7", "Detached");

    let kernel = TaxonomyKernel::with_defaults(store);
    let cancel = CancellationToken::new();

    assert_eq!(kernel.get_depth(&id("C7"), &cancel).await.unwrap(), Depth::Unknown);
    assert!(kernel.get_ancestors(&id("C7"), &cancel).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_concept_is_distinct_from_empty() {
    let kernel = TaxonomyKernel::with_defaults(measured_store());
    let err = kernel
        .get_ancestors(&id("C404"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, HierarchyError::UnknownConcept(c) if c == id("C404")));
}

// ─────────────────────────────────────────────────────────────────────────────
// LCA and Similarity
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_wu_palmer_worked_example() {
    let kernel = TaxonomyKernel::with_defaults(measured_store());
    let sim = kernel
        .compute_similarity(&id("C1"), &id("C2"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(sim.lca, id("C200"));
    assert_eq!((sim.depth_c1, sim.depth_c2, sim.depth_lca), (3, 5, 2));
    assert_eq!(sim.score, 0.5);
}

#[tokio::test]
async fn test_disjoint_subtrees_have_no_common_ancestor() {
    let kernel = TaxonomyKernel::with_defaults(measured_store());
    let err = kernel
        .find_lca(&id("C1"), &id("C301"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, HierarchyError::NoCommonAncestor(..)));
    assert_eq!(err.code(), "NO_COMMON_ANCESTOR");
}

#[tokio::test]
async fn test_lca_tie_goes_to_smallest_id() {
    let mut store = InMemoryConceptStore::new();
    for cid in ["C1", "C3", "C4", "C8", "C9"] {
        store.add_simple_concept(cid, cid);
    }
    // C3 and C4 are both depth-2 parents of C8 and C9.
    store.add_path("C1", "A1");
    store.add_path("C3", "A1.A3");
    store.add_path("C4", "A1.A4");
    store.add_path("C8", "A1.A3.A8");
    store.add_path("C8", "A1.A4.A8");
    store.add_path("C9", "A1.A4.A9");
    store.add_path("C9", "A1.A3.A9");

    let kernel = TaxonomyKernel::with_defaults(store);
    let cancel = CancellationToken::new();
    let forward = kernel.find_lca(&id("C8"), &id("C9"), &cancel).await.unwrap();
    let backward = kernel.find_lca(&id("C9"), &id("C8"), &cancel).await.unwrap();

    assert_eq!(forward.lca, id("C3"));
    assert_eq!(backward.lca, id("C3"));
    assert_eq!(forward.depth, 2);
}

#[tokio::test]
async fn test_failed_candidate_depth_ranks_as_zero() {
    let store = FaultyStore {
        inner: measured_store(),
        failing: [id("C200")].into_iter().collect(),
    };
    let kernel = kernel_with(store, KernelConfig::default());

    let lca = kernel
        .find_lca(&id("C1"), &id("C2"), &CancellationToken::new())
        .await
        .unwrap();

    // C200 would win at depth 2; with its depth unavailable the root wins.
    assert_eq!(lca.lca, id("C100"));
    assert_eq!(lca.depth, 1);
}

#[tokio::test]
async fn test_failed_candidate_depth_propagates_when_configured() {
    let store = FaultyStore {
        inner: measured_store(),
        failing: [id("C200")].into_iter().collect(),
    };
    let config = KernelConfig {
        depth_fallback: DepthFallback::Propagate,
        ..KernelConfig::default()
    };
    let kernel = kernel_with(store, config);

    let err = kernel
        .find_lca(&id("C1"), &id("C2"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        HierarchyError::Upstream { stage: Stage::HierarchyPaths, ref target, .. } if target == "C200"
    ));
}

#[tokio::test]
async fn test_operand_failure_is_upstream_not_empty() {
    let store = FaultyStore {
        inner: measured_store(),
        failing: [id("C2")].into_iter().collect(),
    };
    let kernel = kernel_with(store, KernelConfig::default());

    let err = kernel
        .find_lca(&id("C1"), &id("C2"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "UPSTREAM_ERROR");
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_similarity_errors_are_symmetric() {
    let store = FaultyStore {
        inner: measured_store(),
        failing: [id("C1"), id("C2")].into_iter().collect(),
    };
    let kernel = kernel_with(store, KernelConfig::default());
    let cancel = CancellationToken::new();

    let forward = kernel.compute_similarity(&id("C1"), &id("C2"), &cancel).await.unwrap_err();
    let backward = kernel.compute_similarity(&id("C2"), &id("C1"), &cancel).await.unwrap_err();
    assert_eq!(forward.to_string(), backward.to_string());
}

#[tokio::test]
async fn test_self_similarity_without_paths_is_invalid_depth() {
    let mut store = measured_store();
    store.add_simple_concept("C7", "Detached");
    let kernel = TaxonomyKernel::with_defaults(store);
    let cancel = CancellationToken::new();

    // The self pair short-circuits the LCA, so only the depth check can fail.
    let lca = kernel.find_lca(&id("C7"), &id("C7"), &cancel).await.unwrap();
    assert_eq!((lca.lca.clone(), lca.depth), (id("C7"), 0));

    let err = kernel.compute_similarity(&id("C7"), &id("C7"), &cancel).await.unwrap_err();
    assert!(matches!(
        err,
        HierarchyError::InvalidDepth { ref concept, depth: Depth::Unknown } if *concept == id("C7")
    ));
    assert_eq!(err.code(), "INVALID_DEPTH");
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_shallow_branch_similarity() {
    let mut store = measured_store();
    store.add_simple_concept("C6", "Shallow");
    store.add_path("C6", "A100.A6");
    let kernel = TaxonomyKernel::with_defaults(store);

    let sim = kernel
        .compute_similarity(&id("C6"), &id("C1"), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(sim.lca, id("C100"));
    // 2 * 1 / (2 + 3)
    assert!((sim.score - 0.4).abs() < 1e-12);
}

// ─────────────────────────────────────────────────────────────────────────────
// Cancellation and Timeouts
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_cancel_in_flight_lca_leaves_no_pending_fetches() {
    // Only the candidate ancestors are slow, so the cancel lands while
    // their depth fetches are in flight.
    let store = SlowStore::new(measured_store(), &["C100", "C200"], Duration::from_millis(300));
    let completed = Arc::clone(&store.completed);
    let kernel = kernel_with(store, KernelConfig::default());

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = kernel.find_lca(&id("C1"), &id("C2"), &cancel).await.unwrap_err();
    assert!(matches!(err, HierarchyError::Cancelled));

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(completed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cancelled_lca_reaps_fetches_before_returning() {
    let store = SlowStore::new(measured_store(), &["C100", "C200"], Duration::from_millis(300));
    let in_flight = Arc::clone(&store.in_flight);
    let kernel = kernel_with(store, KernelConfig::default());

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = kernel.find_lca(&id("C1"), &id("C2"), &cancel).await.unwrap_err();
    assert!(matches!(err, HierarchyError::Cancelled));
    // No sleep: the aborted depth fetches must already be gone.
    assert_eq!(in_flight.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cancelled_similarity_reaps_fetches_before_returning() {
    // C2's paths are slow, so the cancel lands while its lookup is pending.
    let store = SlowStore::new(measured_store(), &["C2"], Duration::from_millis(300));
    let in_flight = Arc::clone(&store.in_flight);
    let kernel = kernel_with(store, KernelConfig::default());

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = kernel.compute_similarity(&id("C1"), &id("C2"), &cancel).await.unwrap_err();
    assert!(matches!(err, HierarchyError::Cancelled));
    assert_eq!(in_flight.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_already_cancelled_token() {
    let kernel = TaxonomyKernel::with_defaults(measured_store());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = kernel.compute_similarity(&id("C1"), &id("C2"), &cancel).await.unwrap_err();
    assert!(matches!(err, HierarchyError::Cancelled));
}

#[tokio::test]
async fn test_slow_store_times_out_as_retryable() {
    let store = SlowStore::new(measured_store(), &["C1"], Duration::from_millis(500));
    let config = KernelConfig {
        fetch_timeout_ms: 20,
        ..KernelConfig::default()
    };
    let kernel = kernel_with(store, config);

    let err = kernel.get_depth(&id("C1"), &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(
        err,
        HierarchyError::UpstreamTimeout { stage: Stage::HierarchyPaths, timeout_ms: 20, .. }
    ));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_repeat_similarity_uses_cache() {
    let kernel = TaxonomyKernel::with_defaults(measured_store());
    let cancel = CancellationToken::new();

    let first = kernel.compute_similarity(&id("C1"), &id("C2"), &cancel).await.unwrap();
    let stats = kernel.cache_stats();
    assert!(stats.paths.unwrap().len >= 4);
    assert_eq!(stats.ancestors.unwrap().len, 2);

    let second = kernel.compute_similarity(&id("C2"), &id("C1"), &cancel).await.unwrap();
    assert_eq!(first.score.to_bits(), second.score.to_bits());
}
