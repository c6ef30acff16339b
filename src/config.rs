//! Job configuration.
//!
//! [`SplitConfig`] is the configuration bundle every job is built from. It can be
//! assembled in code, loaded from JSON with [`SplitConfig::from_json_file`], or
//! filled from command-line flags by the binary. [`SplitConfig::validate`] must
//! pass before a Run starts; the Run Controller calls it for you.

use crate::error::{SplitError, SplitResult};
use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Field separator for reading or writing delimited text.
///
/// A single byte goes through the quoting-aware `csv` machinery. Anything
/// longer is a literal multi-character separator with no quoting support.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Separator {
    Byte(u8),
    Text(String),
}

impl Separator {
    /// The separator as it appears in the data.
    #[must_use]
    pub fn as_str(&self) -> std::borrow::Cow<'_, str> {
        match self {
            Self::Byte(b) => char::from(*b).to_string().into(),
            Self::Text(s) => s.as_str().into(),
        }
    }
}

impl Default for Separator {
    fn default() -> Self {
        Self::Byte(b'|')
    }
}

impl FromStr for Separator {
    type Err = SplitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = match s {
            "\\t" | "tab" => "\t",
            other => other,
        };
        match s.as_bytes() {
            [] => Err(SplitError::Config("separator must not be empty".into())),
            [b'\n'] | [b'\r'] => Err(SplitError::Config(
                "separator must not be a line terminator".into(),
            )),
            [b] if b.is_ascii() => Ok(Self::Byte(*b)),
            _ if s.contains(['\n', '\r']) => Err(SplitError::Config(
                "separator must not contain a line terminator".into(),
            )),
            _ => Ok(Self::Text(s.to_string())),
        }
    }
}

impl fmt::Display for Separator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

impl Serialize for Separator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_str())
    }
}

impl<'de> Deserialize<'de> for Separator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Output representation produced for every sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    DelimitedText,
    ColumnarBinary,
    Spreadsheet,
}

impl OutputFormat {
    /// File extension used when the configuration does not override it.
    #[must_use]
    pub fn default_extension(self) -> &'static str {
        match self {
            Self::DelimitedText => "csv",
            Self::ColumnarBinary => "parquet",
            Self::Spreadsheet => "xlsx",
        }
    }

    /// Whether this build can encode the format.
    #[must_use]
    pub fn is_enabled(self) -> bool {
        match self {
            Self::DelimitedText => true,
            Self::ColumnarBinary => cfg!(feature = "io-parquet"),
            Self::Spreadsheet => cfg!(feature = "io-xlsx"),
        }
    }

    /// Parse a user-facing format name, returning the format and the extension
    /// the name implies (`txt` keeps `.txt`, `tsv` keeps `.tsv`).
    pub fn parse_with_extension(name: &str) -> SplitResult<(Self, &'static str)> {
        match name.trim().to_ascii_lowercase().as_str() {
            "csv" | "delimited" | "delimited-text" => Ok((Self::DelimitedText, "csv")),
            "txt" => Ok((Self::DelimitedText, "txt")),
            "tsv" => Ok((Self::DelimitedText, "tsv")),
            "parquet" | "columnar-binary" => Ok((Self::ColumnarBinary, "parquet")),
            "xlsx" | "spreadsheet" => Ok((Self::Spreadsheet, "xlsx")),
            other => Err(SplitError::Config(format!(
                "output format {other} not supported"
            ))),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = SplitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_with_extension(s).map(|(format, _)| format)
    }
}

/// What to do with a record whose field count does not match the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MalformedPolicy {
    /// Drop the record, emit a warning, count it as skipped.
    #[default]
    Skip,
    /// Fail the job on the first malformed record.
    Abort,
}

impl FromStr for MalformedPolicy {
    type Err = SplitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "abort" => Ok(Self::Abort),
            other => Err(SplitError::Config(format!(
                "unknown malformed-record policy {other} (expected skip or abort)"
            ))),
        }
    }
}

/// Configuration bundle shared by every job of a Run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Header name of the column records are partitioned by.
    pub category_column: String,
    pub input_separator: Separator,
    pub output_separator: Separator,
    pub output_format: OutputFormat,
    /// Keep the category column in the output records.
    pub keep_category_column: bool,
    pub output_directory: PathBuf,
    pub malformed_policy: MalformedPolicy,
    /// Overrides [`OutputFormat::default_extension`].
    pub output_extension: Option<String>,
    /// Rows buffered per Parquet row group.
    pub parquet_batch_rows: usize,
    /// Records read per routing chunk before dispatching to sinks.
    pub routing_chunk_rows: usize,
    /// Jobs run concurrently on a pool of this size; `None` means one worker
    /// per CPU.
    pub threads: Option<usize>,
    /// Dispatch writes to distinct sinks on worker threads.
    pub parallel_routing: bool,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            category_column: String::new(),
            input_separator: Separator::default(),
            output_separator: Separator::default(),
            output_format: OutputFormat::default(),
            keep_category_column: false,
            output_directory: PathBuf::from("output"),
            malformed_policy: MalformedPolicy::default(),
            output_extension: None,
            parquet_batch_rows: 8192,
            routing_chunk_rows: 65_536,
            threads: None,
            parallel_routing: cfg!(feature = "parallel-io"),
        }
    }
}

impl SplitConfig {
    /// Minimal configuration: partition by `category_column` into `output_directory`.
    pub fn new(category_column: impl Into<String>, output_directory: impl Into<PathBuf>) -> Self {
        Self {
            category_column: category_column.into(),
            output_directory: output_directory.into(),
            ..Self::default()
        }
    }

    /// Load a configuration from a JSON file. Missing keys take their defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or is not valid JSON for
    /// this structure.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let cfg: Self = serde_json::from_reader(BufReader::new(f))
            .with_context(|| format!("parse config {}", path.display()))?;
        Ok(cfg)
    }

    /// Extension given to every output file.
    #[must_use]
    pub fn extension(&self) -> &str {
        self.output_extension
            .as_deref()
            .unwrap_or_else(|| self.output_format.default_extension())
    }

    /// Check the configuration before any job starts.
    ///
    /// # Errors
    /// Returns [`SplitError::Config`] describing the first problem found.
    pub fn validate(&self) -> SplitResult<()> {
        if self.category_column.is_empty() {
            return Err(SplitError::Config("category column must be set".into()));
        }
        if self.output_directory.as_os_str().is_empty() {
            return Err(SplitError::Config("output directory must be set".into()));
        }
        if !self.output_format.is_enabled() {
            return Err(SplitError::Config(format!(
                "output format {:?} is not enabled in this build",
                self.output_format
            )));
        }
        if self.parquet_batch_rows == 0 || self.routing_chunk_rows == 0 {
            return Err(SplitError::Config("batch and chunk sizes must be positive".into()));
        }
        if self.threads == Some(0) {
            return Err(SplitError::Config("threads must be positive".into()));
        }
        if let Some(ext) = &self.output_extension
            && (ext.is_empty() || ext.contains(['/', '\\', '\0']))
        {
            return Err(SplitError::Config(format!("invalid output extension {ext:?}")));
        }
        for sep in [&self.input_separator, &self.output_separator] {
            if let Separator::Text(s) = sep
                && s.is_empty()
            {
                return Err(SplitError::Config("separator must not be empty".into()));
            }
        }
        Ok(())
    }
}
