//! Core types for the taxonomy kernel.

pub mod concept;
pub mod path;
pub mod measure;

pub use concept::{ConceptId, AtomId, Concept, Atom, CodeMapping, CodeTranslation};
pub use path::{HierarchyPath, PATH_SEPARATOR};
pub use measure::{Depth, LcaResult, Similarity, wu_palmer};
