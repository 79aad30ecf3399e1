//! Synfeat: per-token syntactic features from constituency parses
//!
//! Turns a bracketed parse and its token sequence into one fixed-width
//! feature tuple per token (part of speech, boundary constituents, lowest
//! common ancestor, tree distances), for use as prosody features in
//! speech synthesis. Core implementation in Rust with Python bindings.

// Core modules (tree first, then queries over it)
pub mod bracket; // Bracketed parse reader
pub mod compose; // Per-token feature tuples
pub mod error; // Structural and lookup errors
pub mod query; // Structural queries over a built tree
pub mod tree; // Arena tree with leaf spans and levels

// Corpus tooling
pub mod align; // Duration and silence merging
pub mod config; // TOML run configuration
pub mod corpus; // Id-keyed line files
pub mod encode; // Tag vocabulary and dense/one-hot coding
pub mod pipeline; // Parallel extraction over a corpus

// Python bindings
#[cfg(feature = "pyo3")]
pub mod python;

// Re-exports for convenience
pub use align::{AlignError, SILENCE, add_silence, merge_files};
pub use bracket::{BracketError, parse_bracketed};
pub use compose::{
    DelimiterClash, FeatureFormat, SentenceFeatures, TokenFeatures, compose, extract_features,
};
pub use config::Config;
pub use corpus::{CorpusError, Record, RecordReader};
pub use encode::{CodeType, EncodeError, TagVocabulary};
pub use error::{FeatureError, Mismatch};
pub use pipeline::{
    BatchSummary, Sentence, SentenceError, SentenceReader, extract_corpus, write_outcomes,
};
pub use query::Distances;
pub use tree::{LeafSpan, Node, NodeId, ParseNode, SyntaxTree};
