//! Error taxonomy for hierarchy operations.

use std::fmt;

use crate::types::{ConceptId, Depth};

/// Pipeline stage a store failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Fetching raw hierarchy paths for a concept.
    HierarchyPaths,
    /// Batch-resolving atoms to their owning concepts.
    AtomResolution,
    /// Looking up a concept record.
    ConceptLookup,
    /// Fetching source-vocabulary codes for a concept.
    CodeMapping,
    /// Looking up the concept that owns a source-vocabulary code.
    CodeLookup,
    /// One depth fetch inside a fan-out.
    Depth,
    /// One ancestor-set fetch inside a fan-out.
    Ancestors,
    /// Whole request deadline at the gateway.
    Request,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HierarchyPaths => write!(f, "hierarchy_paths"),
            Self::AtomResolution => write!(f, "atom_resolution"),
            Self::ConceptLookup => write!(f, "concept_lookup"),
            Self::CodeMapping => write!(f, "code_mapping"),
            Self::CodeLookup => write!(f, "code_lookup"),
            Self::Depth => write!(f, "depth"),
            Self::Ancestors => write!(f, "ancestors"),
            Self::Request => write!(f, "request"),
        }
    }
}

/// Error type for hierarchy operations.
///
/// Domain outcomes (`UnknownConcept`, `NoCommonAncestor`, `InvalidDepth`)
/// are kept apart from upstream faults so callers never mistake "no
/// ancestors" for "ancestor lookup failed".
#[derive(Debug, Clone, thiserror::Error)]
pub enum HierarchyError {
    /// The queried concept has no record in the store.
    #[error("Unknown concept: {0}")]
    UnknownConcept(ConceptId),

    /// No concept registers the code in the vocabulary.
    #[error("Unknown code {code} in {vocabulary}")]
    UnknownCode {
        /// Source vocabulary searched.
        vocabulary: String,
        /// Code that was not found.
        code: String,
    },

    /// The two concepts share no ancestor.
    #[error("No common ancestor for {0} and {1}")]
    NoCommonAncestor(ConceptId, ConceptId),

    /// A depth contributing to a similarity score is zero or unknown.
    #[error("Invalid depth {depth} for concept {concept}")]
    InvalidDepth {
        /// Concept whose depth is unusable.
        concept: ConceptId,
        /// The offending depth.
        depth: Depth,
    },

    /// A store call exceeded its deadline.
    #[error("Upstream timeout during {stage} for {target} after {timeout_ms}ms")]
    UpstreamTimeout {
        /// Stage that timed out.
        stage: Stage,
        /// Concept or atom batch being fetched.
        target: String,
        /// Deadline that was exceeded.
        timeout_ms: u64,
    },

    /// Any other store failure.
    #[error("Upstream error during {stage} for {target}: {message}")]
    Upstream {
        /// Stage that failed.
        stage: Stage,
        /// Concept or atom batch being fetched.
        target: String,
        /// Underlying error message.
        message: String,
    },

    /// The operation was cancelled by the caller.
    #[error("Operation cancelled")]
    Cancelled,
}

impl HierarchyError {
    /// Wrap a store error with its stage and target.
    pub fn upstream<E: std::error::Error>(stage: Stage, target: impl fmt::Display, err: E) -> Self {
        Self::Upstream {
            stage,
            target: target.to_string(),
            message: err.to_string(),
        }
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownConcept(_) => "UNKNOWN_CONCEPT",
            Self::UnknownCode { .. } => "UNKNOWN_CODE",
            Self::NoCommonAncestor(..) => "NO_COMMON_ANCESTOR",
            Self::InvalidDepth { .. } => "INVALID_DEPTH",
            Self::UpstreamTimeout { .. } => "UPSTREAM_TIMEOUT",
            Self::Upstream { .. } => "UPSTREAM_ERROR",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Whether a gateway may retry the request. The kernel never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UpstreamTimeout { .. })
    }
}
