//! Bracketed parse reader
//!
//! Reads Penn Treebank s-expressions into [`ParseNode`]s using a pest grammar.
//! This is the format constituency parsers such as CoreNLP print, and the
//! format parse files are stored in.

use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;
use thiserror::Error;

use crate::tree::ParseNode;

#[derive(Parser)]
#[grammar = "bracket.pest"]
struct BracketParser;

/// Error type for bracketed parse failures
#[derive(Debug, Error)]
pub enum BracketError {
    #[error("Bracket error: {0}")]
    Syntax(#[from] pest::error::Error<Rule>),

    #[error("Bracket error: no tree found")]
    Empty,

    #[error("Bracket error: unexpected rule {0:?}")]
    UnexpectedRule(Rule),
}

/// Parse a bracketed tree such as `(S (NP (DT The) (NN cat)) (VP (VBD sat)))`
pub fn parse_bracketed(input: &str) -> Result<ParseNode, BracketError> {
    let mut pairs = BracketParser::parse(Rule::tree, input)?;

    let Some(tree_pair) = pairs.next() else {
        return Err(BracketError::Empty);
    };
    // tree contains the root followed by EOI
    let Some(root) = tree_pair.into_inner().next() else {
        return Err(BracketError::Empty);
    };

    build_node(root)
}

/// Convert a node or leaf pair into a ParseNode
fn build_node(pair: Pair<Rule>) -> Result<ParseNode, BracketError> {
    match pair.as_rule() {
        Rule::leaf => Ok(ParseNode::leaf(pair.as_str())),
        Rule::node => {
            let mut label = String::new();
            let mut children = Vec::new();

            for inner in pair.into_inner() {
                match inner.as_rule() {
                    Rule::atom => label = inner.as_str().to_string(),
                    Rule::node | Rule::leaf => children.push(build_node(inner)?),
                    rule => return Err(BracketError::UnexpectedRule(rule)),
                }
            }

            Ok(ParseNode { label, children })
        }
        rule => Err(BracketError::UnexpectedRule(rule)),
    }
}
