//! Wu-Palmer similarity.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::DepthFallback;
use crate::error::{HierarchyError, Stage};
use crate::hierarchy::depth::DepthCalculator;
use crate::hierarchy::fetch::{lookup, ordered_pair, FetchOrchestrator};
use crate::hierarchy::lca::LcaFinder;
use crate::store::ConceptStore;
use crate::types::{wu_palmer, ConceptId, Similarity};

/// Computes `2 * depth(lca) / (depth(c1) + depth(c2))`.
pub struct SimilarityEngine<S: ConceptStore> {
    lca: Arc<LcaFinder<S>>,
    depths: Arc<DepthCalculator<S>>,
    orchestrator: FetchOrchestrator,
    fallback: DepthFallback,
}

impl<S: ConceptStore + 'static> SimilarityEngine<S> {
    /// Create an engine.
    pub fn new(
        lca: Arc<LcaFinder<S>>,
        depths: Arc<DepthCalculator<S>>,
        orchestrator: FetchOrchestrator,
        fallback: DepthFallback,
    ) -> Self {
        Self { lca, depths, orchestrator, fallback }
    }

    /// Similarity of `c1` and `c2`.
    ///
    /// Fails with `InvalidDepth` when either concept's depth is unknown or
    /// zero. An LCA without a known depth contributes 0.
    pub async fn similarity(
        &self,
        c1: &ConceptId,
        c2: &ConceptId,
        cancel: &CancellationToken,
    ) -> Result<Similarity, HierarchyError> {
        let lca = self.lca.find(c1, c2, cancel).await?;

        let calculator = Arc::clone(&self.depths);
        let fetched = self
            .orchestrator
            .fan_out(
                Stage::Depth,
                [c1.clone(), c2.clone(), lca.lca.clone()],
                cancel,
                move |id| {
                    let calculator = Arc::clone(&calculator);
                    async move { calculator.depth(&id).await }
                },
            )
            .await?;

        let (first, second) = ordered_pair(c1, c2);
        for id in [first, second] {
            let depth = lookup(&fetched, id, Stage::Depth)?;
            if depth.positive().is_none() {
                return Err(HierarchyError::InvalidDepth {
                    concept: id.clone(),
                    depth,
                });
            }
        }

        let depth_c1 = lookup(&fetched, c1, Stage::Depth)?.rank();
        let depth_c2 = lookup(&fetched, c2, Stage::Depth)?.rank();
        let depth_lca = match lookup(&fetched, &lca.lca, Stage::Depth) {
            Ok(depth) => depth.rank(),
            Err(e) => match self.fallback {
                DepthFallback::Zero => {
                    tracing::warn!(lca = %lca.lca, error = %e, "LCA depth fetch failed, using LCA rank");
                    lca.depth
                }
                DepthFallback::Propagate => return Err(e),
            },
        };

        let score = wu_palmer(depth_lca, depth_c1, depth_c2);

        tracing::debug!(
            concept1 = %c1,
            concept2 = %c2,
            lca = %lca.lca,
            depth_c1 = depth_c1,
            depth_c2 = depth_c2,
            depth_lca = depth_lca,
            score = score,
            "Computed Wu-Palmer similarity"
        );

        Ok(Similarity {
            concept1: c1.clone(),
            concept2: c2.clone(),
            lca: lca.lca,
            depth_c1,
            depth_c2,
            depth_lca,
            score,
        })
    }
}
