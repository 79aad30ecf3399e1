//! Corpus-level feature extraction
//!
//! Pairs parse records with token records, extracts features sentence by
//! sentence, and writes the results as an id-keyed feature file:
//! - Sentences come from a parse file and an optional tokens file
//! - A sentence that fails is reported with its id and skipped
//! - Sequential or parallel extraction, always in input order

use std::io::Write;

use pariter::IteratorExt as _;
use thiserror::Error;
use tracing::{info, warn};

use crate::bracket::{BracketError, parse_bracketed};
use crate::compose::{DelimiterClash, FeatureFormat, SentenceFeatures};
use crate::corpus::{CorpusError, Record, RecordReader, write_record};
use crate::error::FeatureError;

/// Why a single sentence produced no features
#[derive(Debug, Error)]
pub enum SentenceError {
    #[error(transparent)]
    Bracket(#[from] BracketError),

    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error(transparent)]
    Delimiter(#[from] DelimiterClash),
}

/// A sentence waiting for feature extraction
#[derive(Debug, Clone)]
pub struct Sentence {
    pub id: String,
    /// Bracketed constituency parse
    pub parse: String,
    /// Tokens as supplied by the tokenizer; the parse leaves when absent
    pub tokens: Option<Vec<String>>,
}

impl Sentence {
    /// Parse the tree and compose the sentence's features
    pub fn features(&self) -> Result<SentenceFeatures, SentenceError> {
        let parse = parse_bracketed(&self.parse)?;
        let features = match &self.tokens {
            Some(tokens) => SentenceFeatures::extract(tokens, &parse)?,
            None => SentenceFeatures::extract(&parse.leaves(), &parse)?,
        };
        Ok(features)
    }

    /// Features serialized with `format`, which every field must survive
    pub fn render(&self, format: &FeatureFormat) -> Result<String, SentenceError> {
        let features = self.features()?;
        features.check_delimiters(format)?;
        Ok(features.render(format))
    }

    pub fn into_outcome(self, format: &FeatureFormat) -> SentenceOutcome {
        let result = self.render(format);
        SentenceOutcome { id: self.id, result }
    }
}

/// Result of extracting one sentence
#[derive(Debug)]
pub struct SentenceOutcome {
    pub id: String,
    pub result: Result<String, SentenceError>,
}

/// Sentences read from a parse file, optionally aligned with a tokens file
///
/// When a tokens file is given, its ids must match the parse file's ids line
/// for line; a mismatch ends the corpus with an error.
pub struct SentenceReader {
    parses: RecordReader,
    tokens: Option<RecordReader>,
}

impl SentenceReader {
    pub fn new(parses: RecordReader, tokens: Option<RecordReader>) -> Self {
        Self { parses, tokens }
    }

    fn pair(&mut self, parse: Record) -> Result<Sentence, CorpusError> {
        let tokens = match self.tokens.as_mut() {
            None => None,
            Some(reader) => {
                let record = reader.next().ok_or_else(|| CorpusError::Malformed {
                    line_num: parse.line_num,
                    message: format!("tokens file ended before sentence {:?}", parse.id),
                })??;
                parse.expect_same_id(&record)?;
                Some(record.payload.split_whitespace().map(str::to_string).collect())
            }
        };

        Ok(Sentence {
            id: parse.id,
            parse: parse.payload,
            tokens,
        })
    }
}

impl Iterator for SentenceReader {
    type Item = Result<Sentence, CorpusError>;

    fn next(&mut self) -> Option<Self::Item> {
        let parse = match self.parses.next()? {
            Ok(record) => record,
            Err(e) => return Some(Err(e)),
        };
        Some(self.pair(parse))
    }
}

/// Extract features for every sentence, yielding outcomes in input order
///
/// Corpus errors (unreadable or misaligned files) are passed through;
/// per-sentence failures are carried inside the outcome.
pub fn extract_corpus(
    sentences: SentenceReader,
    format: FeatureFormat,
    parallel: bool,
) -> Box<dyn Iterator<Item = Result<SentenceOutcome, CorpusError>>> {
    let extract = move |sentence: Result<Sentence, CorpusError>| {
        sentence.map(|sentence| sentence.into_outcome(&format))
    };

    if parallel {
        Box::new(sentences.parallel_map(extract))
    } else {
        Box::new(sentences.map(extract))
    }
}

/// Counts of a finished extraction run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub written: usize,
    pub skipped: usize,
}

/// Write successful outcomes as `<id> <features>` lines, logging failures
///
/// Stops at the first corpus error; a failed sentence only skips itself.
pub fn write_outcomes<W: Write>(
    outcomes: impl Iterator<Item = Result<SentenceOutcome, CorpusError>>,
    writer: &mut W,
) -> Result<BatchSummary, CorpusError> {
    let mut summary = BatchSummary::default();

    for outcome in outcomes {
        let outcome = outcome?;
        match outcome.result {
            Ok(features) => {
                write_record(writer, &outcome.id, &features).map_err(|source| {
                    CorpusError::Io {
                        line_num: summary.written + summary.skipped + 1,
                        source,
                    }
                })?;
                summary.written += 1;
            }
            Err(e) => {
                warn!(id = %outcome.id, error = %e, "skipping sentence");
                summary.skipped += 1;
            }
        }
    }

    info!(
        written = summary.written,
        skipped = summary.skipped,
        "feature extraction finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARSES: &str = "utt1 (S (NP (DT The) (NN cat)) (VP (VBD sat)))
utt2 (S (A a) (B b) (C c))
utt3 (NN hello)
";

    const TOKENS: &str = "utt1 The cat sat
utt2 a b
utt3 hello
";

    fn reader(parses: &str, tokens: Option<&str>) -> SentenceReader {
        SentenceReader::new(
            RecordReader::from_string(parses),
            tokens.map(RecordReader::from_string),
        )
    }

    fn run(sentences: SentenceReader, parallel: bool) -> (String, BatchSummary) {
        let outcomes = extract_corpus(sentences, FeatureFormat::default(), parallel);
        let mut out = Vec::new();
        let summary = write_outcomes(outcomes, &mut out).unwrap();
        (String::from_utf8(out).unwrap(), summary)
    }

    #[test]
    fn test_mismatched_sentence_is_skipped() {
        let (out, summary) = run(reader(PARSES, Some(TOKENS)), false);

        assert_eq!(summary, BatchSummary { written: 2, skipped: 1 });
        assert_eq!(
            out,
            "utt1 The|DT|S|NP|NP|1|1|1|2,cat|NN|NN|DT|NP|1|1|1|2,sat|VBD|VP|NP|S|2|2|2|4\n\
             utt3 hello|NN|NN|NN|NN|0|0|0|0\n"
        );
    }

    #[test]
    fn test_tokens_default_to_leaves() {
        let (out, summary) = run(reader(PARSES, None), false);

        assert_eq!(summary, BatchSummary { written: 3, skipped: 0 });
        assert!(out.contains("utt2 a|A|S|B|S|"));
    }

    #[test]
    fn test_parallel_keeps_input_order() {
        let mut parses = String::new();
        for i in 0..50 {
            parses.push_str(&format!("utt{i} (S (NP (PRP I)) (VP (VBP run)))\n"));
        }

        let (sequential, _) = run(reader(&parses, None), false);
        let (parallel, summary) = run(reader(&parses, None), true);

        assert_eq!(summary.written, 50);
        assert_eq!(sequential, parallel);
        let ids: Vec<_> = parallel
            .lines()
            .map(|line| line.split(' ').next().unwrap())
            .collect();
        assert_eq!(ids[0], "utt0");
        assert_eq!(ids[49], "utt49");
    }

    #[test]
    fn test_bad_bracket_is_skipped() {
        let (out, summary) = run(reader("utt1 (S (NN hi)\nutt2 (S (NN hi))\n", None), false);

        assert_eq!(summary, BatchSummary { written: 1, skipped: 1 });
        assert!(out.starts_with("utt2 "));
    }

    #[test]
    fn test_punctuation_clash_is_skipped() {
        let parses = "utt1 (S (NP (NN Hi)) (, ,) (NP (NN there)))\nutt2 (S (NN hi))\n";
        let (out, summary) = run(reader(parses, None), false);

        assert_eq!(summary, BatchSummary { written: 1, skipped: 1 });
        assert!(out.starts_with("utt2 "));

        let mut vocab = crate::encode::TagVocabulary::new();
        vocab
            .collect_from(RecordReader::from_string(&out), &FeatureFormat::default())
            .unwrap();
        assert_eq!(vocab.index("NN"), Some(0));
    }

    #[test]
    fn test_punctuation_with_other_delimiter() {
        let sentence = Sentence {
            id: "utt1".to_string(),
            parse: "(S (NP (NN Hi)) (, ,) (NP (NN there)))".to_string(),
            tokens: None,
        };
        let format = FeatureFormat {
            field_delimiter: '|',
            token_delimiter: ';',
        };

        assert!(matches!(
            sentence.render(&FeatureFormat::default()),
            Err(SentenceError::Delimiter(_))
        ));
        let rendered = sentence.render(&format).unwrap();
        assert_eq!(SentenceFeatures::parse_with(&rendered, &format).unwrap().len(), 3);
    }

    #[test]
    fn test_misaligned_ids_stop_the_run() {
        let outcomes = extract_corpus(
            reader(PARSES, Some("utt1 The cat sat\nutt9 a b\n")),
            FeatureFormat::default(),
            false,
        );
        let mut out = Vec::new();
        let err = write_outcomes(outcomes, &mut out).unwrap_err();

        assert!(matches!(err, CorpusError::Misaligned { .. }));
    }

    #[test]
    fn test_short_tokens_file() {
        let mut sentences = reader(PARSES, Some("utt1 The cat sat\n"));

        assert!(sentences.next().unwrap().is_ok());
        assert!(matches!(
            sentences.next().unwrap(),
            Err(CorpusError::Malformed { .. })
        ));
    }

    #[test]
    fn test_sentence_error_reports_reason() {
        let sentence = Sentence {
            id: "utt2".to_string(),
            parse: "(S (A a) (B b) (C c))".to_string(),
            tokens: Some(vec!["a".to_string(), "b".to_string()]),
        };
        let outcome = sentence.into_outcome(&FeatureFormat::default());

        assert_eq!(outcome.id, "utt2");
        let err = outcome.result.unwrap_err();
        assert!(matches!(
            err,
            SentenceError::Feature(FeatureError::StructuralMismatch(_))
        ));
        assert!(err.to_string().contains("3 leaves but 2 tokens"));
    }
}
