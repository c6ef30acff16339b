//! Delimited-text encoder.
//!
//! Writes the header line followed by one line per record, each terminated by
//! `\n`. A single-byte separator goes through `csv::Writer`, so fields that
//! contain the separator, a quote or a line break are quoted and the file reads
//! back field-for-field. A multi-character separator is written literally; a
//! field containing it (or a line break) cannot be represented and is rejected
//! with [`SplitError::Encode`] instead of producing an ambiguous line.

use crate::config::Separator;
use crate::error::{SplitError, SplitResult};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub struct DelimitedEncoder {
    path: PathBuf,
    out: Out,
}

enum Out {
    Csv(csv::Writer<File>),
    Text { w: BufWriter<File>, sep: String },
}

impl DelimitedEncoder {
    /// Create `path` (truncating it) and write the header line.
    ///
    /// # Errors
    /// [`SplitError::SinkIo`] if the file cannot be created or written.
    pub fn create(path: &Path, header: &[&str], separator: &Separator) -> SplitResult<Self> {
        let file = File::create(path).map_err(|e| SplitError::sink_io(path, e))?;
        let out = match separator {
            Separator::Byte(b) => Out::Csv(
                WriterBuilder::new()
                    .delimiter(*b)
                    .terminator(Terminator::Any(b'\n'))
                    .quote_style(QuoteStyle::Necessary)
                    .from_writer(file),
            ),
            Separator::Text(sep) => Out::Text {
                w: BufWriter::new(file),
                sep: sep.clone(),
            },
        };
        let mut enc = Self {
            path: path.to_path_buf(),
            out,
        };
        enc.write_record(header)?;
        Ok(enc)
    }

    /// Append one line.
    ///
    /// # Errors
    /// [`SplitError::Encode`] if the record cannot be represented,
    /// [`SplitError::SinkIo`] on write failure.
    pub fn write_record(&mut self, fields: &[&str]) -> SplitResult<()> {
        match &mut self.out {
            Out::Csv(w) => w.write_record(fields).map_err(|e| csv_error(&self.path, e)),
            Out::Text { w, sep } => {
                for (i, field) in fields.iter().enumerate() {
                    if field.contains(sep.as_str()) || field.contains(['\n', '\r']) {
                        return Err(SplitError::encode(
                            &self.path,
                            format!("field {field:?} contains the separator or a line break"),
                        ));
                    }
                    if i > 0 {
                        w.write_all(sep.as_bytes())
                            .map_err(|e| SplitError::sink_io(&self.path, e))?;
                    }
                    w.write_all(field.as_bytes())
                        .map_err(|e| SplitError::sink_io(&self.path, e))?;
                }
                w.write_all(b"\n")
                    .map_err(|e| SplitError::sink_io(&self.path, e))
            }
        }
    }

    /// Flush buffered output and close the file.
    ///
    /// # Errors
    /// [`SplitError::SinkIo`] if the final flush fails.
    pub fn finish(self) -> SplitResult<()> {
        let Self { path, out } = self;
        let file = match out {
            Out::Csv(w) => w
                .into_inner()
                .map_err(|e| SplitError::sink_io(&path, e.into_error()))?,
            Out::Text { w, .. } => w
                .into_inner()
                .map_err(|e| SplitError::sink_io(&path, e.into_error()))?,
        };
        file.sync_data().map_err(|e| SplitError::sink_io(&path, e))
    }
}

fn csv_error(path: &Path, err: csv::Error) -> SplitError {
    match err.into_kind() {
        csv::ErrorKind::Io(e) => SplitError::sink_io(path, e),
        other => SplitError::encode(path, format!("{other:?}")),
    }
}
