//! Error types for tree construction and feature queries

use thiserror::Error;

/// Why a parse could not be reconciled with its token sequence
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Mismatch {
    #[error("parse has {leaves} leaves but {tokens} tokens were given")]
    LeafCount { leaves: usize, tokens: usize },

    #[error("leaf {index} is {leaf:?} but token {index} is {token:?}")]
    Token {
        index: usize,
        leaf: String,
        token: String,
    },

    #[error("parse root is a bare leaf with no part-of-speech node")]
    BareLeafRoot,
}

/// Error raised by the feature engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeatureError {
    #[error("Structural mismatch: {0}")]
    StructuralMismatch(#[from] Mismatch),

    #[error("Lookup failure: token index {index} out of range for {len} tokens")]
    LookupFailure { index: usize, len: usize },

    #[error("Empty sentence: a parse must contain at least one token")]
    EmptySentence,
}

impl FeatureError {
    pub fn is_structural_mismatch(&self) -> bool {
        matches!(self, FeatureError::StructuralMismatch(_))
    }
}
