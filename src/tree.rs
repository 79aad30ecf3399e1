//! Constituency tree data structures
//!
//! A parse arrives as a recursive [`ParseNode`]. [`SyntaxTree::build`] copies it
//! into an arena, stamps every leaf with its token index, and aggregates the
//! span of token indices dominated by each node. After `build` returns the tree
//! is never mutated again.

use std::fmt;
use std::time::Instant;

use tracing::debug;

use crate::error::{FeatureError, Mismatch};

/// Index of a node in the tree arena
pub type NodeId = usize;

/// A node of a raw constituency parse, as produced by a parser
///
/// Leaves have no children and carry the token text as their label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseNode {
    pub label: String,
    pub children: Vec<ParseNode>,
}

impl ParseNode {
    /// Create an internal node
    pub fn new(label: &str, children: Vec<ParseNode>) -> Self {
        Self {
            label: label.to_string(),
            children,
        }
    }

    /// Create a leaf
    pub fn leaf(label: &str) -> Self {
        Self::new(label, Vec::new())
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Leaf labels in left-to-right order
    pub fn leaves(&self) -> Vec<&str> {
        let mut leaves = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if node.is_leaf() {
                leaves.push(node.label.as_str());
            } else {
                stack.extend(node.children.iter().rev());
            }
        }
        leaves
    }
}

/// Renders Penn Treebank bracket notation, e.g. `(NP (DT the) (NN cat))`
impl fmt::Display for ParseNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_leaf() {
            return write!(f, "{}", self.label);
        }
        write!(f, "({}", self.label)?;
        for child in &self.children {
            write!(f, " {}", child)?;
        }
        write!(f, ")")
    }
}

/// Inclusive range of token indices dominated by a node
///
/// Leaves of an ordered tree are contiguous under any node, so a range is
/// enough to represent the dominated set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafSpan {
    pub first: usize,
    pub last: usize,
}

impl LeafSpan {
    /// Span of a node before aggregation; the identity for `union`
    pub const EMPTY: LeafSpan = LeafSpan {
        first: usize::MAX,
        last: 0,
    };

    pub fn single(index: usize) -> Self {
        Self {
            first: index,
            last: index,
        }
    }

    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        self.first <= index && index <= self.last
    }

    pub fn union(self, other: LeafSpan) -> Self {
        Self {
            first: self.first.min(other.first),
            last: self.last.max(other.last),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.first > self.last
    }

    pub fn len(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            self.last - self.first + 1
        }
    }
}

/// A node in a syntax tree
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    /// Phrase category, POS tag, or token text for leaves
    pub label: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Position among the sentence's tokens; leaves only
    pub leaf_index: Option<usize>,
    /// Token indices dominated by this node
    pub span: LeafSpan,
    /// Distance from the root
    pub level: usize,
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// A constituency tree annotated for feature queries
///
/// The root is always node 0. Nodes are stored in pre-order, so every child
/// has a larger id than its parent.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    nodes: Vec<Node>,
    tokens: Vec<String>,
    /// token index -> leaf node
    leaves: Vec<NodeId>,
    max_leaf_level: usize,
}

impl SyntaxTree {
    /// Build an annotated tree from a parse and the sentence's tokens
    ///
    /// Fails if the parse's leaves do not match the tokens one for one, in
    /// order.
    pub fn build<S: AsRef<str>>(parse: &ParseNode, tokens: &[S]) -> Result<Self, FeatureError> {
        let start = Instant::now();

        if tokens.is_empty() {
            return Err(FeatureError::EmptySentence);
        }
        if parse.is_leaf() {
            return Err(Mismatch::BareLeafRoot.into());
        }

        let mut tree = Self {
            nodes: Vec::new(),
            tokens: tokens.iter().map(|t| t.as_ref().to_string()).collect(),
            leaves: Vec::with_capacity(tokens.len()),
            max_leaf_level: 0,
        };

        let mut leaf_count = 0;
        tree.copy_node(parse, None, 0, &mut leaf_count);

        if leaf_count != tree.tokens.len() {
            return Err(Mismatch::LeafCount {
                leaves: leaf_count,
                tokens: tree.tokens.len(),
            }
            .into());
        }

        tree.aggregate();
        tree.check_order()?;

        debug!(
            tokens = tree.tokens.len(),
            nodes = tree.nodes.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "built syntax tree"
        );
        Ok(tree)
    }

    /// Pre-order copy of `parse` under `parent`
    ///
    /// `leaf_count` is the number of leaves copied so far and becomes the
    /// index of the next leaf.
    fn copy_node(
        &mut self,
        parse: &ParseNode,
        parent: Option<NodeId>,
        level: usize,
        leaf_count: &mut usize,
    ) -> NodeId {
        let id = self.nodes.len();

        let leaf_index = if parse.is_leaf() {
            let index = *leaf_count;
            *leaf_count += 1;
            self.leaves.push(id);
            self.max_leaf_level = self.max_leaf_level.max(level);
            Some(index)
        } else {
            None
        };

        self.nodes.push(Node {
            id,
            label: parse.label.clone(),
            parent,
            children: Vec::with_capacity(parse.children.len()),
            leaf_index,
            span: LeafSpan::EMPTY,
            level,
        });
        if let Some(parent_id) = parent {
            self.nodes[parent_id].children.push(id);
        }

        for child in &parse.children {
            self.copy_node(child, Some(id), level + 1, leaf_count);
        }
        id
    }

    /// Fill in every node's span, children before parents
    fn aggregate(&mut self) {
        // Reverse pre-order visits all children before their parent
        for id in (0..self.nodes.len()).rev() {
            let span = match self.nodes[id].leaf_index {
                Some(index) => LeafSpan::single(index),
                None => self
                    .children(id)
                    .iter()
                    .fold(LeafSpan::EMPTY, |acc, child| acc.union(child.span)),
            };
            self.nodes[id].span = span;
        }
    }

    /// Every leaf must spell the token at its index
    fn check_order(&self) -> Result<(), Mismatch> {
        for (index, (&leaf_id, token)) in self.leaves.iter().zip(&self.tokens).enumerate() {
            let leaf = &self.nodes[leaf_id].label;
            if leaf != token {
                return Err(Mismatch::Token {
                    index,
                    leaf: leaf.clone(),
                    token: token.clone(),
                });
            }
        }
        Ok(())
    }

    /// Number of tokens in the sentence
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn root(&self) -> &Node {
        &self.nodes[0]
    }

    /// Maximum distance from the root over all leaves
    pub fn max_leaf_level(&self) -> usize {
        self.max_leaf_level
    }

    /// Get a node by ID
    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Get the parent of a node
    pub fn parent(&self, node_id: NodeId) -> Option<&Node> {
        self.get_node(node_id)
            .and_then(|node| node.parent)
            .and_then(|parent_id| self.get_node(parent_id))
    }

    /// Get the children of a node
    pub fn children(&self, node_id: NodeId) -> Vec<&Node> {
        if let Some(node) = self.get_node(node_id) {
            node.children
                .iter()
                .filter_map(|&id| self.get_node(id))
                .collect()
        } else {
            Vec::new()
        }
    }

    /// The leaf node of token `widx`
    pub fn leaf(&self, widx: usize) -> Result<&Node, FeatureError> {
        self.leaves
            .get(widx)
            .map(|&id| &self.nodes[id])
            .ok_or(FeatureError::LookupFailure {
                index: widx,
                len: self.tokens.len(),
            })
    }

    /// Token index of a leaf node, if `node_id` is a leaf
    pub fn token_index(&self, node_id: NodeId) -> Option<usize> {
        self.get_node(node_id).and_then(|node| node.leaf_index)
    }
}
