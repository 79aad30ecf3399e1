//! Id-keyed line files
//!
//! Every file the pipeline reads or writes holds one sentence per line:
//!
//! ```text
//! <id> <payload>
//! ```
//!
//! The payload is a bracketed parse, a token list, a feature string, or a
//! duration list depending on the file. Parallel files are aligned by id,
//! line for line. Files ending in `.gz` are decompressed transparently.

use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, Lines, Write};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use thiserror::Error;

/// Error reading an id-keyed line file
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("Failed to open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error at line {line_num}: {source}")]
    Io {
        line_num: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed record at line {line_num}: {message}")]
    Malformed { line_num: usize, message: String },

    #[error("Misaligned ids at line {line_num}: expected {expected:?}, found {found:?}")]
    Misaligned {
        line_num: usize,
        expected: String,
        found: String,
    },
}

/// One line of an id-keyed file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: String,
    pub payload: String,
    pub line_num: usize,
}

impl Record {
    /// Check that `other` belongs to the same sentence as `self`
    pub fn expect_same_id(&self, other: &Record) -> Result<(), CorpusError> {
        if self.id == other.id {
            Ok(())
        } else {
            Err(CorpusError::Misaligned {
                line_num: other.line_num,
                expected: self.id.clone(),
                found: other.id.clone(),
            })
        }
    }
}

/// Boxed line source, plain or decompressed
pub type LineSource = Box<dyn BufRead + Send>;

/// Reader that iterates over the records of an id-keyed file
///
/// Blank lines are skipped.
pub struct RecordReader<R: BufRead = LineSource> {
    lines: Lines<R>,
    line_num: usize,
}

impl RecordReader {
    /// Create a reader from a file path, decompressing `.gz` files
    pub fn from_path(path: &Path) -> Result<Self, CorpusError> {
        let file = File::open(path).map_err(|source| CorpusError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let source: LineSource = if path.extension().is_some_and(|ext| ext == "gz") {
            Box::new(BufReader::new(MultiGzDecoder::new(file)))
        } else {
            Box::new(BufReader::new(file))
        };
        Ok(Self::new(source))
    }

    /// Create a reader from a string
    pub fn from_string(text: &str) -> Self {
        Self::new(Box::new(Cursor::new(text.to_string())))
    }
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_num: 0,
        }
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = Result<Record, CorpusError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            self.line_num += 1;

            let line = match line {
                Ok(line) => line,
                Err(source) => {
                    return Some(Err(CorpusError::Io {
                        line_num: self.line_num,
                        source,
                    }));
                }
            };

            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            return Some(split_record(line, self.line_num));
        }
    }
}

/// Split a line into id and payload at the first space or tab
pub fn split_record(line: &str, line_num: usize) -> Result<Record, CorpusError> {
    let Some(pos) = memchr::memchr2(b' ', b'\t', line.as_bytes()) else {
        return Err(CorpusError::Malformed {
            line_num,
            message: format!("no payload after id {:?}", line),
        });
    };

    let payload = line[pos + 1..].trim_start();
    if payload.is_empty() {
        return Err(CorpusError::Malformed {
            line_num,
            message: format!("no payload after id {:?}", &line[..pos]),
        });
    }

    Ok(Record {
        id: line[..pos].to_string(),
        payload: payload.to_string(),
        line_num,
    })
}

/// Write one `<id> <payload>` line
pub fn write_record<W: Write>(writer: &mut W, id: &str, payload: &str) -> std::io::Result<()> {
    writeln!(writer, "{} {}", id, payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_records() {
        let text = "utt1 (S (NN hi))\n\nutt2\t(S (NN there))\n";
        let records: Vec<_> = RecordReader::from_string(text)
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "utt1");
        assert_eq!(records[0].payload, "(S (NN hi))");
        assert_eq!(records[0].line_num, 1);
        assert_eq!(records[1].id, "utt2");
        assert_eq!(records[1].payload, "(S (NN there))");
        assert_eq!(records[1].line_num, 3);
    }

    #[test]
    fn test_payload_keeps_inner_spaces() {
        let record = split_record("utt1 the  cat sat", 1).unwrap();

        assert_eq!(record.payload, "the  cat sat");
    }

    #[test]
    fn test_malformed_records() {
        assert!(matches!(
            split_record("utt1", 4),
            Err(CorpusError::Malformed { line_num: 4, .. })
        ));
        assert!(matches!(
            split_record("utt1 ", 5),
            Err(CorpusError::Malformed { line_num: 5, .. })
        ));
    }

    #[test]
    fn test_expect_same_id() {
        let a = split_record("utt1 x", 1).unwrap();
        let b = split_record("utt2 y", 1).unwrap();

        assert!(a.expect_same_id(&a.clone()).is_ok());
        assert!(matches!(
            a.expect_same_id(&b),
            Err(CorpusError::Misaligned { .. })
        ));
    }

    #[test]
    fn test_write_record() {
        let mut out = Vec::new();
        write_record(&mut out, "utt1", "a|b,c|d").unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "utt1 a|b,c|d\n");
    }

    mod files {
        use super::*;
        use flate2::Compression;
        use flate2::write::GzEncoder;
        use std::fs;
        use tempfile::tempdir;

        #[test]
        fn test_from_path() {
            let dir = tempdir().unwrap();
            let path = dir.path().join("parses.txt");
            fs::write(&path, "utt1 (S (NN hi))\nutt2 (S (NN yo))\n").unwrap();

            let records: Vec<_> = RecordReader::from_path(&path)
                .unwrap()
                .collect::<Result<_, _>>()
                .unwrap();

            assert_eq!(records.len(), 2);
            assert_eq!(records[1].id, "utt2");
        }

        #[test]
        fn test_from_gz_path() {
            let dir = tempdir().unwrap();
            let path = dir.path().join("parses.txt.gz");
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(b"utt1 (S (NN hi))\n").unwrap();
            fs::write(&path, encoder.finish().unwrap()).unwrap();

            let records: Vec<_> = RecordReader::from_path(&path)
                .unwrap()
                .collect::<Result<_, _>>()
                .unwrap();

            assert_eq!(records.len(), 1);
            assert_eq!(records[0].payload, "(S (NN hi))");
        }

        #[test]
        fn test_missing_file() {
            let dir = tempdir().unwrap();
            let result = RecordReader::from_path(&dir.path().join("nope.txt"));

            assert!(matches!(result, Err(CorpusError::Open { .. })));
        }
    }
}
