//! In-memory concept store for testing.

use std::collections::{BTreeMap, BTreeSet};
use std::convert::Infallible;
use async_trait::async_trait;

use crate::types::{Atom, AtomId, CodeMapping, Concept, ConceptId};
use super::ConceptStore;

/// In-memory concept store for testing.
///
/// Uses BTreeMap/BTreeSet for deterministic iteration order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConceptStore {
    /// Concepts by ID.
    concepts: BTreeMap<ConceptId, Concept>,
    /// Atoms by ID.
    atoms: BTreeMap<AtomId, Atom>,
    /// Concept -> atoms owned.
    concept_atoms: BTreeMap<ConceptId, BTreeSet<AtomId>>,
    /// Concept -> raw paths.
    paths: BTreeMap<ConceptId, Vec<String>>,
}

impl InMemoryConceptStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a concept to the store.
    pub fn add_concept(&mut self, concept: Concept) {
        self.concepts.insert(concept.id.clone(), concept);
    }

    /// Add an atom to the store.
    pub fn add_atom(&mut self, atom: Atom) {
        self.concept_atoms
            .entry(atom.concept.clone())
            .or_default()
            .insert(atom.id.clone());
        self.atoms.insert(atom.id.clone(), atom);
    }

    /// Add a raw path for a concept.
    pub fn add_path(&mut self, concept: impl Into<ConceptId>, raw: impl Into<String>) {
        self.paths.entry(concept.into()).or_default().push(raw.into());
    }

    /// Add a concept together with one atom whose ID is derived from the
    /// concept ID (`C12` -> `A12`). Convenient for building tree fixtures.
    pub fn add_simple_concept(&mut self, id: &str, name: &str) -> AtomId {
        let atom_id = AtomId::new(format!("A{}", id.trim_start_matches('C')));
        self.add_concept(Concept::new(id, name));
        self.add_atom(Atom::new(atom_id.clone(), id, "TEST", id, name));
        atom_id
    }
}

#[async_trait]
impl ConceptStore for InMemoryConceptStore {
    type Error = Infallible;

    async fn get_concept(&self, id: &ConceptId) -> Result<Option<Concept>, Self::Error> {
        Ok(self.concepts.get(id).cloned())
    }

    async fn get_hierarchy_paths(&self, id: &ConceptId) -> Result<Option<Vec<String>>, Self::Error> {
        if !self.concepts.contains_key(id) {
            return Ok(None);
        }
        Ok(Some(self.paths.get(id).cloned().unwrap_or_default()))
    }

    async fn resolve_atoms_to_concepts(
        &self,
        atoms: &BTreeSet<AtomId>,
    ) -> Result<BTreeMap<AtomId, ConceptId>, Self::Error> {
        Ok(atoms
            .iter()
            .filter_map(|id| self.atoms.get(id).map(|a| (id.clone(), a.concept.clone())))
            .collect())
    }

    async fn get_code_mappings(&self, id: &ConceptId) -> Result<Option<Vec<CodeMapping>>, Self::Error> {
        if !self.concepts.contains_key(id) {
            return Ok(None);
        }
        let mappings = self
            .concept_atoms
            .get(id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|aid| self.atoms.get(aid))
                    .map(Atom::code_mapping)
                    .collect()
            })
            .unwrap_or_default();
        Ok(Some(mappings))
    }

    async fn find_concept_by_code(
        &self,
        source: &str,
        code: &str,
    ) -> Result<Option<ConceptId>, Self::Error> {
        Ok(self
            .atoms
            .values()
            .filter(|a| a.source == source && a.code == code)
            .map(|a| a.concept.clone())
            .min())
    }
}
