//! Lowest common ancestor.
//!
//! ## Algorithm
//!
//! 1. `LCA(c, c) = c`, with `c`'s own depth
//! 2. Fetch both ancestor sets concurrently
//! 3. Intersect; an empty intersection is `NoCommonAncestor`
//! 4. Fetch every candidate's depth concurrently (bounded)
//! 5. Deepest candidate wins; equal depths go to the smallest concept ID
//!
//! Step 4 applies [`DepthFallback`]: by default a candidate whose depth
//! fetch failed ranks as depth 0, so it can only win when no candidate has
//! a real depth.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::DepthFallback;
use crate::error::{HierarchyError, Stage};
use crate::hierarchy::ancestors::AncestorResolver;
use crate::hierarchy::depth::DepthCalculator;
use crate::hierarchy::fetch::{cancellable, lookup, ordered_pair, FetchOrchestrator};
use crate::store::ConceptStore;
use crate::types::{ConceptId, LcaResult};

/// Pick the deepest candidate; ties go to the smallest ID.
///
/// Relies on `BTreeMap` iterating in ascending ID order: a later candidate
/// replaces the current best only when strictly deeper.
pub fn pick_deepest(candidates: &BTreeMap<ConceptId, u32>) -> Option<(ConceptId, u32)> {
    let mut best: Option<(&ConceptId, u32)> = None;
    for (id, &depth) in candidates {
        if best.map_or(true, |(_, d)| depth > d) {
            best = Some((id, depth));
        }
    }
    best.map(|(id, d)| (id.clone(), d))
}

/// Finds lowest common ancestors.
pub struct LcaFinder<S: ConceptStore> {
    ancestors: Arc<AncestorResolver<S>>,
    depths: Arc<DepthCalculator<S>>,
    orchestrator: FetchOrchestrator,
    fallback: DepthFallback,
}

impl<S: ConceptStore + 'static> LcaFinder<S> {
    /// Create a finder.
    pub fn new(
        ancestors: Arc<AncestorResolver<S>>,
        depths: Arc<DepthCalculator<S>>,
        orchestrator: FetchOrchestrator,
        fallback: DepthFallback,
    ) -> Self {
        Self { ancestors, depths, orchestrator, fallback }
    }

    /// Lowest common ancestor of `c1` and `c2`.
    ///
    /// Both fan-outs observe `cancel` themselves, so a cancelled call has
    /// reaped every fetch it spawned by the time it returns.
    pub async fn find(
        &self,
        c1: &ConceptId,
        c2: &ConceptId,
        cancel: &CancellationToken,
    ) -> Result<LcaResult, HierarchyError> {
        if c1 == c2 {
            let depth = cancellable(cancel, self.depths.depth(c1)).await?;
            return Ok(LcaResult {
                concept1: c1.clone(),
                concept2: c2.clone(),
                lca: c1.clone(),
                depth: depth.rank(),
            });
        }

        let resolver = Arc::clone(&self.ancestors);
        let sets = self
            .orchestrator
            .fan_out(Stage::Ancestors, [c1.clone(), c2.clone()], cancel, move |id| {
                let resolver = Arc::clone(&resolver);
                async move { resolver.ancestors(&id).await }
            })
            .await?;

        // Checked in ID order so argument order never changes which error wins.
        let (first, second) = ordered_pair(c1, c2);
        let first_set = lookup(&sets, first, Stage::Ancestors)?;
        let second_set = lookup(&sets, second, Stage::Ancestors)?;

        let common: Vec<ConceptId> = first_set.intersection(&second_set).cloned().collect();
        if common.is_empty() {
            return Err(HierarchyError::NoCommonAncestor(c1.clone(), c2.clone()));
        }

        let calculator = Arc::clone(&self.depths);
        let fetched = self
            .orchestrator
            .fan_out(Stage::Depth, common, cancel, move |id| {
                let calculator = Arc::clone(&calculator);
                async move { calculator.depth(&id).await }
            })
            .await?;

        let mut ranked = BTreeMap::new();
        for (candidate, outcome) in fetched {
            let rank = match outcome {
                Ok(depth) => depth.rank(),
                Err(e) => match self.fallback {
                    DepthFallback::Zero => {
                        tracing::warn!(
                            candidate = %candidate,
                            error = %e,
                            "Candidate depth fetch failed, ranking as depth 0"
                        );
                        0
                    }
                    DepthFallback::Propagate => return Err(e),
                },
            };
            ranked.insert(candidate, rank);
        }

        let (lca, depth) = pick_deepest(&ranked)
            .ok_or_else(|| HierarchyError::NoCommonAncestor(c1.clone(), c2.clone()))?;

        tracing::debug!(
            concept1 = %c1,
            concept2 = %c2,
            candidates = ranked.len(),
            lca = %lca,
            depth = depth,
            "Selected lowest common ancestor"
        );

        Ok(LcaResult {
            concept1: c1.clone(),
            concept2: c2.clone(),
            lca,
            depth,
        })
    }
}
