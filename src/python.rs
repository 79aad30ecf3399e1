//! Python bindings for synfeat
//!
//! This module provides PyO3-based Python bindings for the Rust core.

use pyo3::exceptions::{PyIOError, PyIndexError, PyValueError};
use pyo3::prelude::*;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use crate::bracket::{BracketError, parse_bracketed};
use crate::compose::{FeatureFormat, compose};
use crate::corpus::{CorpusError, RecordReader};
use crate::error::FeatureError;
use crate::pipeline::{SentenceReader, extract_corpus, write_outcomes};
use crate::tree::SyntaxTree as RustSyntaxTree;

/// Convert FeatureError to Python exception
impl From<FeatureError> for PyErr {
    fn from(err: FeatureError) -> PyErr {
        match err {
            FeatureError::LookupFailure { .. } => PyIndexError::new_err(err.to_string()),
            _ => PyValueError::new_err(err.to_string()),
        }
    }
}

impl From<BracketError> for PyErr {
    fn from(err: BracketError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

impl From<CorpusError> for PyErr {
    fn from(err: CorpusError) -> PyErr {
        match err {
            CorpusError::Open { .. } | CorpusError::Io { .. } => PyIOError::new_err(err.to_string()),
            _ => PyValueError::new_err(err.to_string()),
        }
    }
}

#[pyclass(name = "SyntaxTree")]
#[derive(Clone)]
pub struct PySyntaxTree {
    pub(crate) inner: Arc<RustSyntaxTree>,
}

#[pymethods]
impl PySyntaxTree {
    /// Build a tree from a bracketed parse; tokens default to its leaves
    #[new]
    #[pyo3(signature = (parse, tokens=None))]
    fn new(parse: &str, tokens: Option<Vec<String>>) -> PyResult<Self> {
        let parse = parse_bracketed(parse)?;
        let tree = match tokens {
            Some(tokens) => RustSyntaxTree::build(&parse, &tokens)?,
            None => RustSyntaxTree::build(&parse, &parse.leaves())?,
        };
        Ok(Self {
            inner: Arc::new(tree),
        })
    }

    fn __len__(&self) -> usize {
        self.inner.len()
    }

    #[getter]
    fn tokens(&self) -> Vec<String> {
        self.inner.tokens().to_vec()
    }

    fn pos(&self, widx: usize) -> PyResult<String> {
        Ok(self.inner.pos_label(widx)?.to_string())
    }

    fn hbcw(&self, widx: usize) -> PyResult<String> {
        Ok(self.inner.highest_boundary_crossing_word(widx)?.to_string())
    }

    fn hecw(&self, widx: usize) -> PyResult<String> {
        Ok(self.inner.highest_enclosing_current_word(widx)?.to_string())
    }

    fn hepw(&self, widx: usize) -> PyResult<String> {
        Ok(self.inner.highest_enclosing_preceding_word(widx)?.to_string())
    }

    fn lca(&self, widx: usize) -> PyResult<String> {
        Ok(self.inner.lca_label(widx)?.to_string())
    }

    /// `(height_of_lca, current_to_lca, preceding_to_lca, sum)` of a token
    fn distances(&self, widx: usize) -> PyResult<(usize, usize, usize, usize)> {
        let d = self.inner.distances(widx)?;
        Ok((
            d.height_of_lca,
            d.current_to_lca,
            d.preceding_to_lca,
            d.current_plus_preceding(),
        ))
    }

    /// Feature string of the whole sentence
    fn features(&self) -> PyResult<String> {
        Ok(compose(&self.inner)?.to_string())
    }

    fn __repr__(&self) -> String {
        let tokens = self.inner.tokens();
        let shown: Vec<&str> = tokens.iter().take(3).map(String::as_str).collect();
        let ellipsis = if tokens.len() > 3 { " ..." } else { "" };
        format!("<SyntaxTree '{}{}'>", shown.join(" "), ellipsis)
    }
}

/// Feature string of a sentence, e.g. `The|DT|S|NP|NP|1|1|1|2,cat|...`
#[pyfunction]
#[pyo3(signature = (parse, tokens=None))]
fn extract_features(parse: &str, tokens: Option<Vec<String>>) -> PyResult<String> {
    Ok(PySyntaxTree::new(parse, tokens)?.features()?)
}

/// Extract a parse file into a feature file, returning `(written, skipped)`
#[pyfunction]
#[pyo3(signature = (parses, out, tokens=None, parallel=true))]
fn extract_file(
    parses: PathBuf,
    out: PathBuf,
    tokens: Option<PathBuf>,
    parallel: bool,
) -> PyResult<(usize, usize)> {
    let parses = RecordReader::from_path(&parses)?;
    let tokens = tokens.as_deref().map(RecordReader::from_path).transpose()?;
    let file = File::create(&out).map_err(|e| PyIOError::new_err(e.to_string()))?;

    let outcomes = extract_corpus(
        SentenceReader::new(parses, tokens),
        FeatureFormat::default(),
        parallel,
    );
    let mut writer = BufWriter::new(file);
    let summary = write_outcomes(outcomes, &mut writer)?;
    writer
        .flush()
        .map_err(|e| PyIOError::new_err(e.to_string()))?;
    Ok((summary.written, summary.skipped))
}

#[pyfunction]
fn __version__() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[pymodule]
fn synfeat(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PySyntaxTree>()?;

    m.add_function(wrap_pyfunction!(extract_features, m)?)?;
    m.add_function(wrap_pyfunction!(extract_file, m)?)?;
    m.add_function(wrap_pyfunction!(__version__, m)?)?;

    Ok(())
}
