//! Structural queries over an annotated syntax tree
//!
//! Every query takes a token index `widx` and reads the tree built by
//! [`SyntaxTree::build`]. Ancestor walks follow parent links from the token's
//! part-of-speech node up to the root; span containment is decided by index
//! comparison only.

use crate::error::{FeatureError, Mismatch};
use crate::tree::{LeafSpan, Node, SyntaxTree};

/// Iterator from a node up to the root, nearest first
pub struct Ancestors<'a> {
    tree: &'a SyntaxTree,
    next: Option<&'a Node>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next?;
        self.next = self.tree.parent(node.id);
        Some(node)
    }
}

/// The four tree distances of a token, all measured against its LCA
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Distances {
    pub height_of_lca: usize,
    pub current_to_lca: usize,
    pub preceding_to_lca: usize,
}

impl Distances {
    pub fn current_plus_preceding(&self) -> usize {
        self.current_to_lca + self.preceding_to_lca
    }
}

impl SyntaxTree {
    /// Ancestors of token `widx`, from the leaf's parent up to the root
    pub fn ancestors(&self, widx: usize) -> Result<Ancestors<'_>, FeatureError> {
        let leaf = self.leaf(widx)?;
        Ok(Ancestors {
            tree: self,
            next: self.parent(leaf.id),
        })
    }

    /// The token that cross-boundary features of `widx` are measured against
    ///
    /// This is `widx - 1`, except that the first token is paired with the
    /// second one, and a one-token sentence pairs its token with itself.
    pub fn preceding_token(&self, widx: usize) -> Result<usize, FeatureError> {
        self.leaf(widx)?;
        Ok(if self.len() == 1 {
            0
        } else if widx == 0 {
            1
        } else {
            widx - 1
        })
    }

    /// The part-of-speech node of token `widx` (its leaf's parent)
    pub fn pos_node(&self, widx: usize) -> Result<&Node, FeatureError> {
        self.ancestors(widx)?
            .next()
            .ok_or(FeatureError::StructuralMismatch(Mismatch::BareLeafRoot))
    }

    pub fn pos_label(&self, widx: usize) -> Result<&str, FeatureError> {
        Ok(self.pos_node(widx)?.label.as_str())
    }

    /// Height of a node above the deepest leaf of the tree
    pub fn height(&self, node: &Node) -> usize {
        self.max_leaf_level().saturating_sub(node.level)
    }

    /// Nearest ancestor of `widx` that also dominates its preceding token
    pub fn lowest_common_ancestor(&self, widx: usize) -> Result<&Node, FeatureError> {
        let preceding = self.preceding_token(widx)?;
        Ok(self
            .ancestors(widx)?
            .find(|node| node.span.contains(preceding))
            .unwrap_or_else(|| self.root()))
    }

    pub fn lca_label(&self, widx: usize) -> Result<&str, FeatureError> {
        Ok(self.lowest_common_ancestor(widx)?.label.as_str())
    }

    /// Highest ancestor of `widx` in which `widx` is the first token (HBCW)
    pub fn highest_boundary_crossing_word(&self, widx: usize) -> Result<&str, FeatureError> {
        self.last_holding_ancestor(widx, |span| widx <= span.first)
    }

    /// Highest ancestor of `widx` in which `widx` is the last token (HECW)
    pub fn highest_enclosing_current_word(&self, widx: usize) -> Result<&str, FeatureError> {
        self.last_holding_ancestor(widx, |span| widx >= span.last)
    }

    /// HECW of the preceding token (HEPW)
    pub fn highest_enclosing_preceding_word(&self, widx: usize) -> Result<&str, FeatureError> {
        let preceding = self.preceding_token(widx)?;
        self.highest_enclosing_current_word(preceding)
    }

    /// Label of the ancestor just below the first one whose span fails `holds`
    ///
    /// When every ancestor holds, this is the topmost one. When the nearest
    /// ancestor already fails, the walk wraps around and also yields the
    /// topmost one.
    fn last_holding_ancestor(
        &self,
        widx: usize,
        holds: impl Fn(&LeafSpan) -> bool,
    ) -> Result<&str, FeatureError> {
        let path: Vec<&Node> = self.ancestors(widx)?.collect();
        let Some(&topmost) = path.last() else {
            return Err(Mismatch::BareLeafRoot.into());
        };

        let node = match path.iter().position(|node| !holds(&node.span)) {
            Some(0) | None => topmost,
            Some(i) => path[i - 1],
        };
        Ok(node.label.as_str())
    }

    /// `height(lca) - 1`, i.e. the LCA height not counting the leaf level
    pub fn height_of_lca(&self, widx: usize) -> Result<usize, FeatureError> {
        Ok(self.distances(widx)?.height_of_lca)
    }

    pub fn distance_current_to_lca(&self, widx: usize) -> Result<usize, FeatureError> {
        Ok(self.distances(widx)?.current_to_lca)
    }

    pub fn distance_preceding_to_lca(&self, widx: usize) -> Result<usize, FeatureError> {
        Ok(self.distances(widx)?.preceding_to_lca)
    }

    pub fn distance_current_plus_preceding(&self, widx: usize) -> Result<usize, FeatureError> {
        Ok(self.distances(widx)?.current_plus_preceding())
    }

    /// All LCA distances of `widx` from a single LCA lookup
    pub fn distances(&self, widx: usize) -> Result<Distances, FeatureError> {
        let lca = self.height(self.lowest_common_ancestor(widx)?);
        let current = self.height(self.pos_node(widx)?);
        let preceding = self.height(self.pos_node(self.preceding_token(widx)?)?);

        // The LCA dominates both POS nodes, so it is at least as high as either
        // and strictly above the leaves
        Ok(Distances {
            height_of_lca: lca - 1,
            current_to_lca: lca - current,
            preceding_to_lca: lca - preceding,
        })
    }
}
