//! Tag encoding for raw feature files
//!
//! Acoustic models consume numbers, not labels. The four tag fields of every
//! token (POS, HBCW, HEPW, LCA) are interned into a [`TagVocabulary`] and
//! replaced by either a dense index or a one-hot vector. The token text is
//! dropped, the four distances are kept, and tokens are joined by a space:
//!
//! ```text
//! utt1 The|DT|S|NP|NP|1|1|1|2,cat|NN|NN|DT|NP|1|1|1|2
//! utt1 0|1|2|2|1|1|1|2 3|3|0|2|1|1|1|2
//! ```

use std::fmt;
use std::io::{BufRead, Write};
use std::str::FromStr;

use lasso::{Key, Rodeo, Spur};
use rustc_hash::FxBuildHasher;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::compose::{FeatureFormat, FeatureParseError, SentenceFeatures, TokenFeatures};
use crate::corpus::{CorpusError, RecordReader, write_record};

/// Error collecting or applying a tag vocabulary
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error(transparent)]
    Corpus(#[from] CorpusError),

    #[error("Bad feature string at line {line_num}: {source}")]
    Features {
        line_num: usize,
        #[source]
        source: FeatureParseError,
    },

    #[error("Unknown tag {0:?}")]
    UnknownTag(String),

    #[error("Duplicate tag {tag:?} at line {line_num} of vocabulary")]
    DuplicateTag { tag: String, line_num: usize },

    #[error("Unknown code type {0:?} (expected dense or one_hot)")]
    UnknownCodeType(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// How a tag is written in an encoded feature file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeType {
    /// The tag's vocabulary index
    #[default]
    Dense,
    /// A vocabulary-sized vector with a single 1
    OneHot,
}

impl FromStr for CodeType {
    type Err = EncodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dense" => Ok(CodeType::Dense),
            "one_hot" => Ok(CodeType::OneHot),
            other => Err(EncodeError::UnknownCodeType(other.to_string())),
        }
    }
}

impl fmt::Display for CodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodeType::Dense => f.write_str("dense"),
            CodeType::OneHot => f.write_str("one_hot"),
        }
    }
}

/// Interned set of syntactic tags, indexed in first-seen order
pub struct TagVocabulary {
    tags: Rodeo<Spur, FxBuildHasher>,
}

impl fmt::Debug for TagVocabulary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.tags()).finish()
    }
}

impl Default for TagVocabulary {
    fn default() -> Self {
        Self::new()
    }
}

impl TagVocabulary {
    pub fn new() -> Self {
        Self {
            tags: Rodeo::with_hasher(FxBuildHasher),
        }
    }

    /// Add a tag, returning its index
    pub fn insert(&mut self, tag: &str) -> usize {
        self.tags.get_or_intern(tag).into_usize()
    }

    pub fn index(&self, tag: &str) -> Option<usize> {
        self.tags.get(tag).map(Key::into_usize)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Tags in index order
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tags.strings()
    }

    /// Add the four tag fields of every token
    pub fn observe(&mut self, features: &SentenceFeatures) {
        for token in features {
            for tag in token.tags() {
                self.insert(tag);
            }
        }
    }

    /// Add every tag of a raw feature file
    pub fn collect_from(
        &mut self,
        records: RecordReader,
        format: &FeatureFormat,
    ) -> Result<usize, EncodeError> {
        let mut sentences = 0;
        for record in records {
            let record = record?;
            let features = SentenceFeatures::parse_with(&record.payload, format).map_err(
                |source| EncodeError::Features {
                    line_num: record.line_num,
                    source,
                },
            )?;
            self.observe(&features);
            sentences += 1;
        }

        debug!(sentences, tags = self.len(), "collected tag vocabulary");
        Ok(sentences)
    }

    pub fn dense(&self, tag: &str) -> Result<String, EncodeError> {
        self.lookup(tag).map(|idx| idx.to_string())
    }

    pub fn one_hot(&self, tag: &str, delimiter: char) -> Result<String, EncodeError> {
        let idx = self.lookup(tag)?;
        let mut code = String::with_capacity(self.len() * 2);
        for i in 0..self.len() {
            if i > 0 {
                code.push(delimiter);
            }
            code.push(if i == idx { '1' } else { '0' });
        }
        Ok(code)
    }

    pub fn code(&self, tag: &str, code_type: CodeType, delimiter: char) -> Result<String, EncodeError> {
        match code_type {
            CodeType::Dense => self.dense(tag),
            CodeType::OneHot => self.one_hot(tag, delimiter),
        }
    }

    fn lookup(&self, tag: &str) -> Result<usize, EncodeError> {
        self.index(tag)
            .ok_or_else(|| EncodeError::UnknownTag(tag.to_string()))
    }

    /// Encode one token: four tag codes followed by the four distances
    pub fn encode_token(
        &self,
        token: &TokenFeatures,
        code_type: CodeType,
        delimiter: char,
    ) -> Result<String, EncodeError> {
        let mut fields = Vec::with_capacity(8);
        for tag in token.tags() {
            fields.push(self.code(tag, code_type, delimiter)?);
        }
        fields.extend(token.distances().iter().map(usize::to_string));
        Ok(fields.join(delimiter.to_string().as_str()))
    }

    /// Encode a sentence, joining tokens with a space
    pub fn encode_sentence(
        &self,
        features: &SentenceFeatures,
        code_type: CodeType,
        delimiter: char,
    ) -> Result<String, EncodeError> {
        let tokens = features
            .iter()
            .map(|token| self.encode_token(token, code_type, delimiter))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tokens.join(" "))
    }

    /// Encode every line of a raw feature file, returning the number written
    pub fn encode_file<W: Write>(
        &self,
        records: RecordReader,
        writer: &mut W,
        code_type: CodeType,
        format: &FeatureFormat,
    ) -> Result<usize, EncodeError> {
        let mut written = 0;
        for record in records {
            let record = record?;
            let features = SentenceFeatures::parse_with(&record.payload, format).map_err(
                |source| EncodeError::Features {
                    line_num: record.line_num,
                    source,
                },
            )?;
            let encoded = self.encode_sentence(&features, code_type, format.field_delimiter)?;
            write_record(writer, &record.id, &encoded)?;
            written += 1;
        }

        info!(sentences = written, %code_type, "encoded feature file");
        Ok(written)
    }

    /// Write the vocabulary one tag per line, in index order
    pub fn save<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for tag in self.tags() {
            writeln!(writer, "{}", tag)?;
        }
        Ok(())
    }

    /// Read a vocabulary written by [`TagVocabulary::save`]
    pub fn load<R: BufRead>(reader: R) -> Result<Self, EncodeError> {
        let mut vocab = Self::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let tag = line.trim();
            if tag.is_empty() {
                continue;
            }
            if vocab.index(tag).is_some() {
                return Err(EncodeError::DuplicateTag {
                    tag: tag.to_string(),
                    line_num: i + 1,
                });
            }
            vocab.insert(tag);
        }
        Ok(vocab)
    }
}
