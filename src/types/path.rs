//! Hierarchy path decoding.
//!
//! The store encodes a path as a separator-joined list of atom IDs,
//! root first, e.g. `A0434168.A2367943.A3684559`. The last atom belongs to
//! the concept the path was fetched for; every earlier atom is an ancestor
//! position.

use serde::{Deserialize, Serialize};

use super::concept::AtomId;

/// Default separator between atom IDs in a raw path.
pub const PATH_SEPARATOR: char = '.';

/// A decoded root-first sequence of atom IDs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyPath {
    atoms: Vec<AtomId>,
}

impl HierarchyPath {
    /// Create a path from already-decoded atoms.
    pub fn new(atoms: Vec<AtomId>) -> Self {
        Self { atoms }
    }

    /// Decode a raw path string.
    ///
    /// Total: empty input (or input made only of separators) gives an empty
    /// path. Empty segments produced by doubled or trailing separators are
    /// dropped. Atom IDs are not validated here.
    pub fn decode(raw: &str, separator: char) -> Self {
        let atoms = raw
            .split(separator)
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(AtomId::from)
            .collect();
        Self { atoms }
    }

    /// All atoms, root first.
    pub fn atoms(&self) -> &[AtomId] {
        &self.atoms
    }

    /// Number of atoms on the path. This is the path's depth contribution.
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    /// Whether the path has no atoms.
    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// The terminal atom (belongs to the queried concept).
    pub fn terminal(&self) -> Option<&AtomId> {
        self.atoms.last()
    }

    /// Atoms strictly above the terminal atom.
    pub fn ancestor_atoms(&self) -> &[AtomId] {
        match self.atoms.split_last() {
            Some((_, above)) => above,
            None => &[],
        }
    }

    /// Re-encode with the given separator.
    pub fn encode(&self, separator: char) -> String {
        let mut out = String::new();
        for (i, atom) in self.atoms.iter().enumerate() {
            if i > 0 {
                out.push(separator);
            }
            out.push_str(atom.as_str());
        }
        out
    }
}
