//! Concept and atom types for the taxonomy kernel.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a concept in the taxonomy (a CUI such as `C0011849`).
///
/// Implements `Ord` so sets and maps of concepts iterate deterministically,
/// which is also what makes the LCA tie-break reproducible.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConceptId(String);

impl ConceptId {
    /// Create a concept ID from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConceptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConceptId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ConceptId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifier of an atom (an AUI such as `A0123456`).
///
/// Atoms are the elements of hierarchy paths; each belongs to one concept.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AtomId(String);

impl AtomId {
    /// Create an atom ID from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AtomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AtomId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AtomId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A concept with its canonical display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Concept {
    /// Concept identifier.
    pub id: ConceptId,
    /// Canonical display name.
    pub name: String,
}

impl Concept {
    /// Create a new concept.
    pub fn new(id: impl Into<ConceptId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A vocabulary-specific term instance belonging to one concept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Atom {
    /// Atom identifier.
    pub id: AtomId,
    /// Owning concept.
    pub concept: ConceptId,
    /// Source vocabulary tag (e.g. `SNOMEDCT_US`, `HPO`, `ICD10CM`).
    pub source: String,
    /// Code of the term inside its source vocabulary.
    pub code: String,
    /// Display string.
    pub name: String,
}

impl Atom {
    /// Create a new atom.
    pub fn new(
        id: impl Into<AtomId>,
        concept: impl Into<ConceptId>,
        source: impl Into<String>,
        code: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            concept: concept.into(),
            source: source.into(),
            code: code.into(),
            name: name.into(),
        }
    }

    /// The source-vocabulary code this atom registers for its concept.
    pub fn code_mapping(&self) -> CodeMapping {
        CodeMapping {
            code: self.code.clone(),
            source: self.source.clone(),
            name: self.name.clone(),
        }
    }
}

/// A code registered for a concept in one source vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CodeMapping {
    /// Code inside the source vocabulary.
    pub code: String,
    /// Source vocabulary tag.
    pub source: String,
    /// Display string of the term.
    pub name: String,
}

/// A code carried from one source vocabulary to another through the
/// concept that registers it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeTranslation {
    /// Vocabulary of the input code.
    pub source: String,
    /// The input code.
    pub code: String,
    /// Concept the input code belongs to.
    pub concept: ConceptId,
    /// Vocabulary translated into.
    pub target: String,
    /// Codes of `concept` in `target`, sorted and deduplicated. Empty when
    /// the concept has no code there.
    pub mappings: Vec<CodeMapping>,
}
