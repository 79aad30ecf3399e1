//! Merging word durations with encoded features
//!
//! A duration file lists, for every sentence, the words of its alignment
//! together with a count (frames or phones), silences included:
//!
//! ```text
//! utt1 <SIL>|3 The|2 cat|4 <SIL>|1
//! ```
//!
//! Each item is prefixed onto the matching encoded feature item. Silences
//! have no features of their own and get an all-zero vector of the same
//! width.

use std::io::Write;

use atoi::FromRadix10Checked;
use thiserror::Error;
use tracing::info;

use crate::corpus::{CorpusError, RecordReader, write_record};

/// Word marking a silence in duration files
pub const SILENCE: &str = "<SIL>";

/// Error merging a single duration line
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemError {
    #[error("duration item {0:?} has no count")]
    MissingCount(String),

    #[error("duration item {0:?} has a count that is not a non-negative integer")]
    BadCount(String),

    #[error("{words} words but {features} feature items")]
    WordCount { words: usize, features: usize },
}

/// Error merging duration and feature files
#[derive(Debug, Error)]
pub enum AlignError {
    #[error(transparent)]
    Corpus(#[from] CorpusError),

    #[error("Feature file ended before sentence {id:?}")]
    MissingFeatures { id: String },

    #[error("Sentence {id:?} (line {line_num}): {source}")]
    Item {
        id: String,
        line_num: usize,
        #[source]
        source: ItemError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Width of a merged item: the fields of one feature item plus the count
pub fn feature_dim(feat_line: &str) -> usize {
    let first = feat_line.split(' ').next().unwrap_or_default();
    first.split('|').count() + 1
}

/// Validate a count field, returning it unchanged
fn check_count<'a>(item: &str, count: &'a str) -> Result<&'a str, ItemError> {
    let bytes = count.as_bytes();
    match u64::from_radix_10_checked(bytes) {
        (Some(_), used) if used == bytes.len() && used > 0 => Ok(count),
        _ => Err(ItemError::BadCount(item.to_string())),
    }
}

/// Merge one duration line with its encoded feature line
///
/// Non-silence words consume feature items in order; every item must be
/// consumed.
pub fn add_silence(dur_line: &str, feat_line: &str, feat_dim: usize) -> Result<String, ItemError> {
    let features: Vec<&str> = feat_line.split(' ').collect();
    let silence_tail = "|0".repeat(feat_dim.saturating_sub(1));

    let mut merged = Vec::new();
    let mut words = 0;
    for item in dur_line.split(' ').filter(|item| !item.is_empty()) {
        let Some((word, count)) = item.split_once('|') else {
            return Err(ItemError::MissingCount(item.to_string()));
        };
        let count = check_count(item, count)?;

        if word == SILENCE {
            merged.push(format!("{count}{silence_tail}"));
        } else {
            let Some(feature) = features.get(words) else {
                return Err(ItemError::WordCount {
                    words: words + 1,
                    features: features.len(),
                });
            };
            merged.push(format!("{count}|{feature}"));
            words += 1;
        }
    }

    if words != features.len() {
        return Err(ItemError::WordCount {
            words,
            features: features.len(),
        });
    }
    Ok(merged.join(" "))
}

/// Merge a duration file with an encoded feature file, line by line
pub fn merge_files<W: Write>(
    durations: RecordReader,
    mut features: RecordReader,
    writer: &mut W,
) -> Result<usize, AlignError> {
    let mut written = 0;

    for dur in durations {
        let dur = dur?;
        let feat = features
            .next()
            .ok_or_else(|| AlignError::MissingFeatures { id: dur.id.clone() })??;
        dur.expect_same_id(&feat)?;

        let merged = add_silence(&dur.payload, &feat.payload, feature_dim(&feat.payload))
            .map_err(|source| AlignError::Item {
                id: dur.id.clone(),
                line_num: dur.line_num,
                source,
            })?;
        write_record(writer, &dur.id, &merged)?;
        written += 1;
    }

    info!(sentences = written, "merged durations with features");
    Ok(written)
}
