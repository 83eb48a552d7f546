//! Error types for veclower.

use thiserror::Error;

use crate::combining::CombiningKind;

/// Errors raised while building, lowering or evaluating a value graph.
///
/// Pattern entry points only return an error for contractions that are
/// malformed; a pattern that merely does not apply returns `Ok(None)`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoweringError {
    /// Shape mismatch between data length and expected size.
    #[error("shape mismatch: expected {expected} elements, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// Index out of bounds.
    #[error("index out of bounds: index {index} is out of range for dimension {dim_size}")]
    IndexOutOfBounds { index: usize, dim_size: usize },

    /// Wrong number of indices provided.
    #[error("wrong number of indices: expected {expected}, got {actual}")]
    WrongNumberOfIndices { expected: usize, actual: usize },

    /// Invalid permutation.
    #[error("invalid permutation {perm:?} for value with {ndim} dimensions")]
    InvalidPermutation { perm: Vec<usize>, ndim: usize },

    /// Operation requires specific rank.
    #[error("expected value of rank {expected}, got rank {actual}")]
    RankMismatch { expected: usize, actual: usize },

    /// The three index maps of a contraction are inconsistent.
    #[error("malformed index maps: {reason}")]
    MalformedIndexMaps { reason: String },

    /// Two operand axes bound to the same label have different extents.
    #[error("lhs dimension {lhs_index} (size {lhs_size}) does not match rhs dimension {rhs_index} (size {rhs_size})")]
    DimensionMismatch {
        lhs_index: usize,
        rhs_index: usize,
        lhs_size: usize,
        rhs_size: usize,
    },

    /// The peeling lowering only understands additive contractions.
    #[error("contractions other than 'add' not supported (got '{kind}')")]
    UnsupportedCombiningKind { kind: CombiningKind },

    /// Operand types violate the rules of an operation.
    #[error("invalid '{op}' operation: {reason}")]
    InvalidOperation { op: &'static str, reason: String },

    /// An argument was evaluated without a bound value.
    #[error("argument '{name}' has no bound value")]
    UnboundArgument { name: String },

    /// A value whose defining operation was erased is still referenced.
    #[error("value %{index} refers to an erased operation")]
    ErasedValue { index: usize },

    /// Evaluation found a cycle in the value graph.
    #[error("value graph contains a cycle")]
    CyclicGraph,
}

impl LoweringError {
    pub(crate) fn invalid(op: &'static str, reason: impl Into<String>) -> Self {
        LoweringError::InvalidOperation {
            op,
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        LoweringError::MalformedIndexMaps {
            reason: reason.into(),
        }
    }
}
