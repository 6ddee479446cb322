//! Concept store backends.
//!
//! The store is the kernel's only I/O boundary. Everything above it is pure
//! computation over data already fetched.

pub mod memory;

#[cfg(feature = "mysql")]
pub mod mysql;

use std::collections::{BTreeMap, BTreeSet};
use async_trait::async_trait;

use crate::types::{AtomId, CodeMapping, Concept, ConceptId};

/// Error type returned by a store backend.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
    /// Whether the failure was the store's own deadline expiring.
    fn is_timeout(&self) -> bool {
        false
    }
}

/// Backends that cannot fail.
impl StoreError for std::convert::Infallible {}

/// Trait for concept store backends.
///
/// `None` from a per-concept lookup means the concept itself is unknown to
/// the store; a known concept with no data answers `Some` of an empty list.
#[async_trait]
pub trait ConceptStore: Send + Sync {
    /// Error type for store operations.
    type Error: StoreError;

    /// Fetch a concept record.
    async fn get_concept(&self, id: &ConceptId) -> Result<Option<Concept>, Self::Error>;

    /// Fetch the raw hierarchy paths of a concept, root first, each ending
    /// in an atom of the concept.
    async fn get_hierarchy_paths(&self, id: &ConceptId) -> Result<Option<Vec<String>>, Self::Error>;

    /// Resolve atoms to their owning concepts in one batch. Unresolvable
    /// atoms are omitted from the result.
    async fn resolve_atoms_to_concepts(
        &self,
        atoms: &BTreeSet<AtomId>,
    ) -> Result<BTreeMap<AtomId, ConceptId>, Self::Error>;

    /// Fetch all source-vocabulary codes registered for a concept.
    async fn get_code_mappings(&self, id: &ConceptId) -> Result<Option<Vec<CodeMapping>>, Self::Error>;

    /// Find the concept registering `code` in vocabulary `source`. When
    /// several do, the smallest concept ID is returned.
    async fn find_concept_by_code(
        &self,
        source: &str,
        code: &str,
    ) -> Result<Option<ConceptId>, Self::Error>;

    /// Whether the backend is reachable.
    async fn is_healthy(&self) -> bool {
        true
    }
}

pub use memory::InMemoryConceptStore;

#[cfg(feature = "mysql")]
pub use mysql::MysqlConceptStore;
