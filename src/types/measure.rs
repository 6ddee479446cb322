//! Derived hierarchy measures: depth, LCA and Wu-Palmer similarity.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::concept::ConceptId;

/// Depth of a concept in the hierarchy.
///
/// `Unknown` means the store holds no path for the concept. It is distinct
/// from any known depth; the root of a hierarchy has depth 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Depth {
    /// No hierarchy path exists for the concept.
    Unknown,
    /// Maximum atom count over the concept's paths.
    Known(u32),
}

impl Depth {
    /// Depth from a maximum path length; zero-length means unknown.
    pub fn from_path_len(len: usize) -> Self {
        match len {
            0 => Self::Unknown,
            n => Self::Known(u32::try_from(n).unwrap_or(u32::MAX)),
        }
    }

    /// Whether any path was found.
    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    /// The known value, if any.
    pub fn value(&self) -> Option<u32> {
        match self {
            Self::Known(d) => Some(*d),
            Self::Unknown => None,
        }
    }

    /// Rank used when comparing LCA candidates. Unknown ranks as 0.
    pub fn rank(&self) -> u32 {
        self.value().unwrap_or(0)
    }

    /// A depth usable as a similarity denominator term.
    pub fn positive(&self) -> Option<u32> {
        self.value().filter(|d| *d > 0)
    }
}

impl fmt::Display for Depth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Known(d) => write!(f, "{}", d),
        }
    }
}

/// Lowest common ancestor of two concepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LcaResult {
    /// First queried concept.
    pub concept1: ConceptId,
    /// Second queried concept.
    pub concept2: ConceptId,
    /// The selected common ancestor.
    pub lca: ConceptId,
    /// Depth rank of the LCA. 0 when its depth is unknown or could not be
    /// fetched.
    pub depth: u32,
}

/// Wu-Palmer similarity with the depths that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Similarity {
    /// First queried concept.
    pub concept1: ConceptId,
    /// Second queried concept.
    pub concept2: ConceptId,
    /// Lowest common ancestor used.
    pub lca: ConceptId,
    /// Depth of the first concept.
    pub depth_c1: u32,
    /// Depth of the second concept.
    pub depth_c2: u32,
    /// Depth of the LCA (0 if unknown).
    pub depth_lca: u32,
    /// `2 * depth_lca / (depth_c1 + depth_c2)`, in `[0, 1]`.
    pub score: f64,
}

/// Wu-Palmer score from integer depths.
///
/// The numerator and denominator are summed as integers before the single
/// division, so swapping `depth_c1` and `depth_c2` yields a bit-identical
/// result. The score is clamped to `[0, 1]` for inconsistent data where the
/// LCA is recorded deeper than its descendants.
pub fn wu_palmer(depth_lca: u32, depth_c1: u32, depth_c2: u32) -> f64 {
    let denominator = u64::from(depth_c1) + u64::from(depth_c2);
    if denominator == 0 {
        return 0.0;
    }
    let numerator = 2 * u64::from(depth_lca);
    (numerator as f64 / denominator as f64).clamp(0.0, 1.0)
}
