//! Feature composition
//!
//! Runs the structural queries for every token of a sentence and lays the
//! results out as a fixed nine-field tuple:
//!
//! ```text
//! token|POS|HBCW|HEPW|LCA|height_of_lca|current_to_lca|preceding_to_lca|sum
//! ```
//!
//! Tuples are joined with `,` to form the sentence's feature string.

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::error::FeatureError;
use crate::tree::{ParseNode, SyntaxTree};

pub const FIELD_DELIMITER: char = '|';
pub const TOKEN_DELIMITER: char = ',';

/// Number of fields in a serialized token tuple
pub const FIELD_COUNT: usize = 9;

/// Delimiters used to serialize feature strings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FeatureFormat {
    pub field_delimiter: char,
    pub token_delimiter: char,
}

impl Default for FeatureFormat {
    fn default() -> Self {
        Self {
            field_delimiter: FIELD_DELIMITER,
            token_delimiter: TOKEN_DELIMITER,
        }
    }
}

/// Error reading a serialized feature string back
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeatureParseError {
    #[error("expected 9 fields, found {0}")]
    FieldCount(usize),

    #[error("field {field} is not a distance: {value:?}")]
    Distance { field: usize, value: String },

    #[error("empty feature string")]
    Empty,
}

/// A token or tag that would be split apart when serialized
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("token {index} has field {value:?} containing delimiter {delimiter:?}")]
pub struct DelimiterClash {
    pub index: usize,
    pub value: String,
    pub delimiter: char,
}

/// Syntactic features of one token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenFeatures {
    pub token: String,
    pub pos: String,
    pub hbcw: String,
    pub hepw: String,
    pub lca: String,
    pub height_of_lca: usize,
    pub distance_current: usize,
    pub distance_preceding: usize,
    pub distance_sum: usize,
}

impl TokenFeatures {
    /// Compute the features of token `widx`
    pub fn of(tree: &SyntaxTree, widx: usize) -> Result<Self, FeatureError> {
        let leaf = tree.leaf(widx)?;
        let distances = tree.distances(widx)?;

        Ok(Self {
            token: leaf.label.clone(),
            pos: tree.pos_label(widx)?.to_string(),
            hbcw: tree.highest_boundary_crossing_word(widx)?.to_string(),
            hepw: tree.highest_enclosing_preceding_word(widx)?.to_string(),
            lca: tree.lca_label(widx)?.to_string(),
            height_of_lca: distances.height_of_lca,
            distance_current: distances.current_to_lca,
            distance_preceding: distances.preceding_to_lca,
            distance_sum: distances.current_plus_preceding(),
        })
    }

    /// The categorical fields: POS, HBCW, HEPW, LCA
    pub fn tags(&self) -> [&str; 4] {
        [
            self.pos.as_str(),
            self.hbcw.as_str(),
            self.hepw.as_str(),
            self.lca.as_str(),
        ]
    }

    /// The integer fields, in serialization order
    pub fn distances(&self) -> [usize; 4] {
        [
            self.height_of_lca,
            self.distance_current,
            self.distance_preceding,
            self.distance_sum,
        ]
    }

    /// Serialize with a custom field delimiter
    pub fn render(&self, delimiter: char) -> String {
        let mut out = String::with_capacity(self.token.len() + 32);
        out.push_str(&self.token);
        for tag in self.tags() {
            out.push(delimiter);
            out.push_str(tag);
        }
        for distance in self.distances() {
            out.push(delimiter);
            out.push_str(&distance.to_string());
        }
        out
    }

    /// Parse a tuple serialized with `delimiter`
    pub fn parse_with(s: &str, delimiter: char) -> Result<Self, FeatureParseError> {
        let fields: Vec<&str> = s.split(delimiter).collect();
        if fields.len() != FIELD_COUNT {
            return Err(FeatureParseError::FieldCount(fields.len()));
        }

        let distance = |field: usize| {
            fields[field]
                .parse::<usize>()
                .map_err(|_| FeatureParseError::Distance {
                    field,
                    value: fields[field].to_string(),
                })
        };

        Ok(Self {
            token: fields[0].to_string(),
            pos: fields[1].to_string(),
            hbcw: fields[2].to_string(),
            hepw: fields[3].to_string(),
            lca: fields[4].to_string(),
            height_of_lca: distance(5)?,
            distance_current: distance(6)?,
            distance_preceding: distance(7)?,
            distance_sum: distance(8)?,
        })
    }
}

impl fmt::Display for TokenFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(FIELD_DELIMITER))
    }
}

impl FromStr for TokenFeatures {
    type Err = FeatureParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_with(s, FIELD_DELIMITER)
    }
}

/// Features of every token of a sentence, in token order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SentenceFeatures {
    pub tokens: Vec<TokenFeatures>,
}

impl SentenceFeatures {
    /// Build a tree from `parse` and compose its features
    pub fn extract<S: AsRef<str>>(tokens: &[S], parse: &ParseNode) -> Result<Self, FeatureError> {
        let tree = SyntaxTree::build(parse, tokens)?;
        compose(&tree)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TokenFeatures> {
        self.tokens.iter()
    }

    /// Check that no token or tag contains either delimiter of `format`
    ///
    /// Feature strings carry no escaping, so a clashing field (a `,` token
    /// or POS tag under the default format) could not be read back.
    pub fn check_delimiters(&self, format: &FeatureFormat) -> Result<(), DelimiterClash> {
        let delimiters = [format.field_delimiter, format.token_delimiter];
        for (index, token) in self.tokens.iter().enumerate() {
            let fields = std::iter::once(token.token.as_str()).chain(token.tags());
            for value in fields {
                if let Some(delimiter) = value.chars().find(|c| delimiters.contains(c)) {
                    return Err(DelimiterClash {
                        index,
                        value: value.to_string(),
                        delimiter,
                    });
                }
            }
        }
        Ok(())
    }

    /// Serialize with the given delimiters
    pub fn render(&self, format: &FeatureFormat) -> String {
        let mut out = String::new();
        for (i, token) in self.tokens.iter().enumerate() {
            if i > 0 {
                out.push(format.token_delimiter);
            }
            out.push_str(&token.render(format.field_delimiter));
        }
        out
    }

    /// Parse a feature string serialized with `format`
    pub fn parse_with(s: &str, format: &FeatureFormat) -> Result<Self, FeatureParseError> {
        if s.is_empty() {
            return Err(FeatureParseError::Empty);
        }
        let tokens = s
            .split(format.token_delimiter)
            .map(|t| TokenFeatures::parse_with(t, format.field_delimiter))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { tokens })
    }
}

impl fmt::Display for SentenceFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(&FeatureFormat::default()))
    }
}

impl FromStr for SentenceFeatures {
    type Err = FeatureParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_with(s, &FeatureFormat::default())
    }
}

impl<'a> IntoIterator for &'a SentenceFeatures {
    type Item = &'a TokenFeatures;
    type IntoIter = std::slice::Iter<'a, TokenFeatures>;

    fn into_iter(self) -> Self::IntoIter {
        self.tokens.iter()
    }
}

/// Compute the features of every token of `tree`, in token order
pub fn compose(tree: &SyntaxTree) -> Result<SentenceFeatures, FeatureError> {
    let start = Instant::now();

    let tokens = (0..tree.len())
        .map(|widx| TokenFeatures::of(tree, widx))
        .collect::<Result<Vec<_>, _>>()?;

    debug!(
        tokens = tokens.len(),
        elapsed_us = start.elapsed().as_micros() as u64,
        "composed syntax features"
    );
    Ok(SentenceFeatures { tokens })
}

/// Feature string of a sentence, e.g. `The|DT|S|NP|NP|1|1|1|2,cat|...`
pub fn extract_features<S: AsRef<str>>(
    tokens: &[S],
    parse: &ParseNode,
) -> Result<String, FeatureError> {
    Ok(SentenceFeatures::extract(tokens, parse)?.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bracket::parse_bracketed;
    use crate::error::Mismatch;

    const THE_CAT_SAT: &str = "(S (NP (DT The) (NN cat)) (VP (VBD sat)))";

    fn features(parse: &str, tokens: &[&str]) -> String {
        extract_features(tokens, &parse_bracketed(parse).unwrap()).unwrap()
    }

    #[test]
    fn test_the_cat_sat() {
        assert_eq!(
            features(THE_CAT_SAT, &["The", "cat", "sat"]),
            "The|DT|S|NP|NP|1|1|1|2,cat|NN|NN|DT|NP|1|1|1|2,sat|VBD|VP|NP|S|2|2|2|4"
        );
    }

    #[test]
    fn test_single_token() {
        assert_eq!(features("(NN hello)", &["hello"]), "hello|NN|NN|NN|NN|0|0|0|0");
    }

    #[test]
    fn test_two_tokens() {
        assert_eq!(
            features("(S (NP (PRP I)) (VP (VBP run)))", &["I", "run"]),
            "I|PRP|S|S|S|2|2|2|4,run|VBP|VP|NP|S|2|2|2|4"
        );
    }

    #[test]
    fn test_one_tuple_per_token() {
        let parse = parse_bracketed(
            "(ROOT (S (NP (DT The) (JJ old) (NN man)) (VP (VBD sat) \
             (PP (IN on) (NP (DT the) (NN bench)))) (. .)))",
        )
        .unwrap();
        let tokens = parse.leaves();
        let sentence = SentenceFeatures::extract(&tokens, &parse).unwrap();

        assert_eq!(sentence.len(), tokens.len());
        for (features, token) in sentence.iter().zip(&tokens) {
            assert_eq!(features.token, *token);
            assert_eq!(
                features.distance_sum,
                features.distance_current + features.distance_preceding
            );
        }
    }

    #[test]
    fn test_deterministic() {
        let parse = parse_bracketed(THE_CAT_SAT).unwrap();
        let tokens = ["The", "cat", "sat"];

        let first = extract_features(&tokens, &parse).unwrap();
        let second = extract_features(&tokens, &parse).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_mismatch_produces_no_features() {
        let parse = parse_bracketed("(S (A a) (B b) (C c))").unwrap();
        let err = extract_features(&["a", "b"], &parse).unwrap_err();

        assert_eq!(
            err,
            FeatureError::StructuralMismatch(Mismatch::LeafCount {
                leaves: 3,
                tokens: 2
            })
        );
    }

    #[test]
    fn test_custom_format() {
        let parse = parse_bracketed(THE_CAT_SAT).unwrap();
        let sentence = SentenceFeatures::extract(&["The", "cat", "sat"], &parse).unwrap();
        let format = FeatureFormat {
            field_delimiter: '\t',
            token_delimiter: ' ',
        };
        let rendered = sentence.render(&format);

        assert!(rendered.starts_with("The\tDT\tS\tNP\tNP\t1\t1\t1\t2 cat\t"));
        assert_eq!(SentenceFeatures::parse_with(&rendered, &format).unwrap(), sentence);
    }

    #[test]
    fn test_delimiter_clash() {
        let parse = parse_bracketed("(S (NP (NN Hi)) (, ,) (NP (NN there)))").unwrap();
        let sentence = SentenceFeatures::extract(&parse.leaves(), &parse).unwrap();

        assert_eq!(
            sentence.check_delimiters(&FeatureFormat::default()),
            Err(DelimiterClash {
                index: 0,
                value: ",".to_string(),
                delimiter: ','
            })
        );

        let format = FeatureFormat {
            field_delimiter: '|',
            token_delimiter: ';',
        };
        assert!(sentence.check_delimiters(&format).is_ok());
        assert_eq!(SentenceFeatures::parse_with(&sentence.render(&format), &format).unwrap(), sentence);
    }

    #[test]
    fn test_parse_feature_string() {
        let sentence: SentenceFeatures = "The|DT|S|NP|NP|1|1|1|2,cat|NN|NN|DT|NP|1|1|1|2"
            .parse()
            .unwrap();

        assert_eq!(sentence.len(), 2);
        assert_eq!(sentence.tokens[1].tags(), ["NN", "NN", "DT", "NP"]);
        assert_eq!(sentence.tokens[1].distances(), [1, 1, 1, 2]);
    }

    #[test]
    fn test_parse_feature_errors() {
        assert_eq!(
            "The|DT|S".parse::<TokenFeatures>().unwrap_err(),
            FeatureParseError::FieldCount(3)
        );
        assert_eq!(
            "The|DT|S|NP|NP|1|x|1|2".parse::<TokenFeatures>().unwrap_err(),
            FeatureParseError::Distance {
                field: 6,
                value: "x".to_string()
            }
        );
        assert_eq!(
            "".parse::<SentenceFeatures>().unwrap_err(),
            FeatureParseError::Empty
        );
    }
}
