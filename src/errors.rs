//! Error types for the cut-forest engine.

use thiserror::Error;

/// Top-level error type for forest, tree, and point-store operations.
///
/// Every failure here is a caller error: a failed operation leaves the
/// structure it was invoked on unchanged.
#[derive(Debug, Error)]
pub enum ForestError {
    /// A point's length does not match the configured dimensionality.
    #[error("invalid dimension: expected {expected}, got {actual}")]
    InvalidDimension {
        /// Dimensionality the structure was built with.
        expected: usize,
        /// Length of the offending point.
        actual: usize,
    },

    /// A NaN coordinate was supplied on an insertion path. NaN is only
    /// meaningful as a missing-value marker in multi-visitor queries.
    #[error("invalid point: coordinate {index} is NaN")]
    InvalidPoint {
        /// Index of the NaN coordinate.
        index: usize,
    },

    /// The point store is full and dynamic resizing is disabled.
    #[error("point store capacity {capacity} exceeded")]
    CapacityExceeded {
        /// Configured maximum number of live points.
        capacity: usize,
    },

    /// Deletion of a point that is not present in the tree.
    #[error("point not found in tree")]
    PointNotFound,

    /// Deletion of a sequence index that is not recorded at the matching leaf.
    #[error("sequence index {0} not found at the matching leaf")]
    SequenceNotFound(u64),

    /// Traversal of a tree with no points.
    #[error("cannot traverse an empty tree")]
    EmptyTree,

    /// A persisted state carries a precision tag this build does not support.
    #[error("precision mismatch: state records {found:?}, expected {expected}")]
    PrecisionMismatch {
        /// Precision tag this implementation supports.
        expected: &'static str,
        /// Tag found in the state record.
        found: String,
    },

    /// A structural operation raced a traversal, or an internal handle was
    /// used after release. Indicates a programming error in the caller.
    #[error("cache state violation: {0}")]
    CacheState(String),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ForestError>;
