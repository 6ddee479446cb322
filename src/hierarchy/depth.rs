//! Depth of a concept: the longest of its hierarchy paths.

use std::sync::Arc;

use crate::error::HierarchyError;
use crate::hierarchy::paths::PathIndex;
use crate::store::ConceptStore;
use crate::types::{ConceptId, Depth, HierarchyPath};

/// Depth over a set of decoded paths.
///
/// A concept reachable along several paths takes the longest one. No path
/// gives `Depth::Unknown`.
pub fn depth_of(paths: &[HierarchyPath]) -> Depth {
    Depth::from_path_len(paths.iter().map(HierarchyPath::len).max().unwrap_or(0))
}

/// Computes depths from the shared path index.
///
/// Independent calls share nothing but the index's cache, so any number of
/// them may run concurrently.
pub struct DepthCalculator<S: ConceptStore> {
    paths: Arc<PathIndex<S>>,
}

impl<S: ConceptStore> DepthCalculator<S> {
    /// Create a calculator over a path index.
    pub fn new(paths: Arc<PathIndex<S>>) -> Self {
        Self { paths }
    }

    /// Depth of `id`. `UnknownConcept` if the store has no such concept.
    pub async fn depth(&self, id: &ConceptId) -> Result<Depth, HierarchyError> {
        let paths = self.paths.paths(id).await?;
        Ok(depth_of(&paths))
    }
}
