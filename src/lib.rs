//! # taxonomy-kernel
//!
//! Semantic relationships between concepts of an externally stored taxonomy
//! (UMLS-style: concepts own atoms, atoms form hierarchy paths).
//!
//! The kernel answers four questions:
//!
//! 1. Which concepts are **ancestors** of a concept?
//! 2. How **deep** is a concept?
//! 3. What is the **lowest common ancestor** of two concepts?
//! 4. How **similar** are two concepts (Wu-Palmer)?
//!
//! ## Architecture
//!
//! ```text
//! raw paths → HierarchyPath → atoms → concepts → ancestor sets / depths → LCA → similarity
//!     ↑
//! ConceptStore (MySQL or Memory)
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Ancestor lists are sorted by ConceptId
//! - LCA ties resolve to the smallest ConceptId
//! - `similarity(a, b)` and `similarity(b, a)` are bit-identical
//! - Fan-out results are combined independently of completion order

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod error;
pub mod config;
pub mod canonical;
pub mod store;
pub mod hierarchy;

#[cfg(feature = "service")]
pub mod service;

// Re-exports
pub use types::{ConceptId, AtomId, Concept, Atom, CodeMapping, CodeTranslation};
pub use types::{HierarchyPath, PATH_SEPARATOR};
pub use types::{Depth, LcaResult, Similarity, wu_palmer};
pub use error::{HierarchyError, Stage};
pub use config::{KernelConfig, CacheConfig, DepthFallback};
pub use store::{ConceptStore, StoreError, InMemoryConceptStore};
#[cfg(feature = "mysql")]
pub use store::MysqlConceptStore;
pub use hierarchy::{
    TaxonomyKernel, KernelCacheStats, CacheStats,
    FetchOrchestrator, FanOutResults, cancellable,
    PathIndex, AtomResolver, DepthCalculator, AncestorResolver, AncestorSet,
    LcaFinder, SimilarityEngine, depth_of, pick_deepest,
};
pub use canonical::{to_canonical_bytes, canonical_hash, canonical_hash_hex};

pub use tokio_util::sync::CancellationToken;

// Service re-exports (when service feature is enabled)
#[cfg(feature = "service")]
pub use service::{create_router, ServiceState};

/// Schema version of the response payloads.
/// Increment on breaking changes to any serialized type.
pub const TAXONOMY_KERNEL_SCHEMA_VERSION: &str = "1.0.0";
