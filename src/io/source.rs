//! Row Source: restartable sequential reading of one delimited input file.
//!
//! A [`RowSource`] never holds records in memory. Each call to
//! [`RowSource::open`] starts an independent [`RowPass`] from the first byte
//! of the file, which is what the two-pass split needs: discovery consumes one
//! pass, routing a second, fresh one.
//!
//! # Design notes
//! - The first non-empty row is the header. It is excluded from the record
//!   stream but kept to resolve the category column by name.
//! - Field-count mismatches are yielded as [`SplitError::MalformedRecord`]
//!   items and the pass continues; the caller decides whether to skip or abort.
//! - An I/O error ends the pass after it is yielded.
//! - Single-byte separators use the `csv` reader (RFC 4180 quoting). Longer
//!   separators split each line literally.

use crate::config::Separator;
use crate::error::{SplitError, SplitResult};
use crate::io::compression::{open_decompressed, strip_codec_extension};
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

type BoxedRead = Box<dyn Read + Send>;

/// One parsed data row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// 1-based line number where the record starts.
    pub line: u64,
    pub fields: Vec<String>,
}

impl Record {
    #[must_use]
    pub fn field(&self, idx: usize) -> Option<&str> {
        self.fields.get(idx).map(String::as_str)
    }
}

/// Restartable reader over one input file.
#[derive(Debug, Clone)]
pub struct RowSource {
    path: PathBuf,
    separator: Separator,
}

impl RowSource {
    pub fn new(path: impl Into<PathBuf>, separator: Separator) -> Self {
        Self {
            path: path.into(),
            separator,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stem used to name output files: the file name without a compression
    /// suffix and without its last extension (`data.csv.gz` → `data`).
    ///
    /// # Errors
    /// Returns [`SplitError::Config`] when the path has no usable file name.
    pub fn stem(&self) -> SplitResult<String> {
        input_stem(&self.path)
    }

    /// Start a new pass from the beginning of the file and consume the header.
    ///
    /// # Errors
    /// Returns [`SplitError::InputIo`] if the file cannot be opened or the
    /// header cannot be read.
    pub fn open(&self) -> SplitResult<RowPass> {
        let reader = open_decompressed(&self.path).map_err(|e| SplitError::input_io(&self.path, e))?;
        let lines = match &self.separator {
            Separator::Byte(b) => {
                let rdr = csv::ReaderBuilder::new()
                    .has_headers(false)
                    .flexible(true)
                    .delimiter(*b)
                    .from_reader(reader);
                Lines::Csv(rdr.into_records())
            }
            Separator::Text(sep) => Lines::Text {
                lines: BufReader::new(reader).lines(),
                sep: sep.clone(),
                line: 0,
            },
        };
        let mut pass = RowPass {
            path: self.path.clone(),
            lines,
            header: None,
            done: false,
        };
        pass.read_header()?;
        Ok(pass)
    }
}

enum Lines {
    Csv(csv::StringRecordsIntoIter<BoxedRead>),
    Text {
        lines: io::Lines<BufReader<BoxedRead>>,
        sep: String,
        line: u64,
    },
}

/// Raw outcome of reading one row, before the header-width check.
enum Raw {
    Row(Record),
    Bad { line: u64, reason: String },
}

impl Lines {
    fn next_raw(&mut self) -> Option<io::Result<Raw>> {
        match self {
            Lines::Csv(it) => {
                let res = it.next()?;
                Some(match res {
                    Ok(rec) => Ok(Raw::Row(Record {
                        line: rec.position().map_or(0, csv::Position::line),
                        fields: rec.iter().map(str::to_owned).collect(),
                    })),
                    Err(e) => {
                        let line = e.position().map_or(0, csv::Position::line);
                        match e.into_kind() {
                            csv::ErrorKind::Io(io_err) => Err(io_err),
                            kind => Ok(Raw::Bad {
                                line,
                                reason: describe_csv_error(&kind),
                            }),
                        }
                    }
                })
            }
            Lines::Text { lines, sep, line } => loop {
                let res = lines.next()?;
                *line += 1;
                match res {
                    Ok(mut text) => {
                        if text.ends_with('\r') {
                            text.pop();
                        }
                        if text.is_empty() {
                            continue;
                        }
                        let fields = text.split(sep.as_str()).map(str::to_owned).collect();
                        return Some(Ok(Raw::Row(Record {
                            line: *line,
                            fields,
                        })));
                    }
                    Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                        return Some(Ok(Raw::Bad {
                            line: *line,
                            reason: "line is not valid UTF-8".into(),
                        }));
                    }
                    Err(e) => return Some(Err(e)),
                }
            },
        }
    }
}

fn describe_csv_error(kind: &csv::ErrorKind) -> String {
    match kind {
        csv::ErrorKind::Utf8 { err, .. } => format!("field {} is not valid UTF-8", err.field() + 1),
        other => format!("{other:?}"),
    }
}

/// One sequential pass over a [`RowSource`].
pub struct RowPass {
    path: PathBuf,
    lines: Lines,
    header: Option<Vec<String>>,
    done: bool,
}

impl RowPass {
    /// Column names, or `None` for a file with no rows at all.
    #[must_use]
    pub fn header(&self) -> Option<&[String]> {
        self.header.as_deref()
    }

    /// Position of `column` in the header.
    ///
    /// # Errors
    /// Returns [`SplitError::ColumnNotFound`] if the header does not contain it,
    /// [`SplitError::AmbiguousColumn`] if it names more than one column.
    pub fn column_index(&self, column: &str) -> SplitResult<usize> {
        let header = self.header.as_deref().unwrap_or_default();
        let mut matches = header
            .iter()
            .enumerate()
            .filter(|(_, c)| *c == column)
            .map(|(i, _)| i);
        let Some(idx) = matches.next() else {
            return Err(SplitError::ColumnNotFound {
                column: column.to_string(),
                path: self.path.clone(),
            });
        };
        let repeats = matches.count();
        if repeats > 0 {
            return Err(SplitError::AmbiguousColumn {
                column: column.to_string(),
                path: self.path.clone(),
                count: repeats + 1,
            });
        }
        Ok(idx)
    }

    fn read_header(&mut self) -> SplitResult<()> {
        match self.lines.next_raw() {
            None => {
                self.done = true;
                Ok(())
            }
            Some(Ok(Raw::Row(rec))) => {
                let mut fields = rec.fields;
                if let Some(first) = fields.first_mut()
                    && let Some(stripped) = first.strip_prefix('\u{feff}')
                {
                    *first = stripped.to_string();
                }
                self.header = Some(fields);
                Ok(())
            }
            Some(Ok(Raw::Bad { line, reason })) => Err(SplitError::MalformedRecord {
                path: self.path.clone(),
                line,
                reason: format!("unreadable header: {reason}"),
            }),
            Some(Err(e)) => Err(SplitError::input_io(&self.path, e)),
        }
    }
}

impl Iterator for RowPass {
    type Item = SplitResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let width = self.header.as_ref().map_or(0, Vec::len);
        match self.lines.next_raw() {
            None => {
                self.done = true;
                None
            }
            Some(Ok(Raw::Row(rec))) if rec.fields.len() == width => Some(Ok(rec)),
            Some(Ok(Raw::Row(rec))) => Some(Err(SplitError::MalformedRecord {
                path: self.path.clone(),
                line: rec.line,
                reason: format!("expected {width} fields, found {}", rec.fields.len()),
            })),
            Some(Ok(Raw::Bad { line, reason })) => Some(Err(SplitError::MalformedRecord {
                path: self.path.clone(),
                line,
                reason,
            })),
            Some(Err(e)) => {
                self.done = true;
                Some(Err(SplitError::input_io(&self.path, e)))
            }
        }
    }
}

/// Stem of an input path with any compression suffix removed first.
pub(crate) fn input_stem(path: &Path) -> SplitResult<String> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| SplitError::Config(format!("{} has no UTF-8 file name", path.display())))?;
    let name = strip_codec_extension(name);
    let stem = Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name);
    Ok(stem.to_string())
}

/// Size and modification time of an input, taken before discovery and checked
/// again before routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSnapshot {
    pub len: u64,
    pub modified: Option<SystemTime>,
}

impl InputSnapshot {
    /// # Errors
    /// Returns [`SplitError::InputIo`] if the file metadata cannot be read.
    pub fn capture(path: &Path) -> SplitResult<Self> {
        let meta = std::fs::metadata(path).map_err(|e| SplitError::input_io(path, e))?;
        Ok(Self {
            len: meta.len(),
            modified: meta.modified().ok(),
        })
    }

    /// # Errors
    /// Returns [`SplitError::InputChanged`] if size or modification time moved.
    pub fn verify(&self, path: &Path) -> SplitResult<()> {
        let now = Self::capture(path)?;
        if now.len != self.len {
            return Err(SplitError::InputChanged {
                path: path.to_path_buf(),
                details: format!("size went from {} to {} bytes", self.len, now.len),
            });
        }
        if now.modified != self.modified {
            return Err(SplitError::InputChanged {
                path: path.to_path_buf(),
                details: "modification time changed".into(),
            });
        }
        Ok(())
    }
}
