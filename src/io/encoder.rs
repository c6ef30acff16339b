//! Format Encoder: the closed set of output representations.
//!
//! [`FormatEncoder`] is resolved once per sink from the job's [`OutputFormat`].
//! Adding a format means adding a variant, and every `match` below stops
//! compiling until it is handled.

use crate::config::{OutputFormat, Separator};
use crate::error::{SplitError, SplitResult};
use crate::io::csv::DelimitedEncoder;
use std::path::Path;

#[cfg(feature = "io-parquet")]
use crate::io::parquet::ParquetEncoder;
#[cfg(feature = "io-xlsx")]
use crate::io::xlsx::XlsxEncoder;

/// Per-job encoder settings.
#[derive(Debug, Clone)]
pub struct EncoderOptions {
    pub format: OutputFormat,
    pub separator: Separator,
    pub parquet_batch_rows: usize,
}

/// An open encoder writing one sink file.
pub enum FormatEncoder {
    Delimited(DelimitedEncoder),
    #[cfg(feature = "io-parquet")]
    Parquet(ParquetEncoder),
    #[cfg(feature = "io-xlsx")]
    Spreadsheet(XlsxEncoder),
}

impl FormatEncoder {
    /// Open an encoder for `path` and write `header`.
    ///
    /// # Errors
    /// [`SplitError::Config`] if the format is not compiled in, otherwise
    /// whatever the concrete encoder reports.
    pub fn create(path: &Path, header: &[&str], opts: &EncoderOptions) -> SplitResult<Self> {
        match opts.format {
            OutputFormat::DelimitedText => {
                DelimitedEncoder::create(path, header, &opts.separator).map(Self::Delimited)
            }
            #[cfg(feature = "io-parquet")]
            OutputFormat::ColumnarBinary => {
                ParquetEncoder::create(path, header, opts.parquet_batch_rows).map(Self::Parquet)
            }
            #[cfg(feature = "io-xlsx")]
            OutputFormat::Spreadsheet => XlsxEncoder::create(path, header).map(Self::Spreadsheet),
            #[allow(unreachable_patterns)]
            other => Err(SplitError::Config(format!(
                "output format {other:?} is not enabled in this build"
            ))),
        }
    }

    pub fn write_record(&mut self, fields: &[&str]) -> SplitResult<()> {
        match self {
            Self::Delimited(e) => e.write_record(fields),
            #[cfg(feature = "io-parquet")]
            Self::Parquet(e) => e.write_record(fields),
            #[cfg(feature = "io-xlsx")]
            Self::Spreadsheet(e) => e.write_record(fields),
        }
    }

    /// Flush and close the underlying file.
    pub fn finish(self) -> SplitResult<()> {
        match self {
            Self::Delimited(e) => e.finish(),
            #[cfg(feature = "io-parquet")]
            Self::Parquet(e) => e.finish(),
            #[cfg(feature = "io-xlsx")]
            Self::Spreadsheet(e) => e.finish(),
        }
    }
}
