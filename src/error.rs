//! Error taxonomy for split jobs.
//!
//! Every failure a job can hit is a [`SplitError`] variant. The Run Controller
//! never lets one escape: it is turned into a [`FileStats`](crate::FileStats)
//! entry carrying the [`ErrorKind`] tag and the rendered message.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the library.
pub type SplitResult<T> = Result<T, SplitError>;

/// Errors raised while splitting one input file.
#[derive(Debug, Error)]
pub enum SplitError {
    #[error("category column '{column}' not found in header of {}", path.display())]
    ColumnNotFound { column: String, path: PathBuf },

    #[error("category column '{column}' appears {count} times in header of {}", path.display())]
    AmbiguousColumn {
        column: String,
        path: PathBuf,
        count: usize,
    },

    #[error("malformed record at line {line} of {}: {reason}", path.display())]
    MalformedRecord {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    #[error("category '{category}' at line {line} was not seen during discovery")]
    ConsistencyViolation { category: String, line: u64 },

    #[error("input {} changed between discovery and routing: {details}", path.display())]
    InputChanged { path: PathBuf, details: String },

    #[error("category '{value}' cannot be used as a directory name: {reason}")]
    InvalidCategory { value: String, reason: String },

    #[error("output for {} collides with {} (same file stem)", path.display(), other.display())]
    OutputCollision { path: PathBuf, other: PathBuf },

    #[error("cannot encode record for {}: {reason}", path.display())]
    Encode { path: PathBuf, reason: String },

    #[error("sink I/O error on {}: {source}", path.display())]
    SinkIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("input I/O error on {}: {source}", path.display())]
    InputIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl SplitError {
    pub(crate) fn sink_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::SinkIo {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn input_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::InputIo {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn encode(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        Self::Encode {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Stable taxonomy tag for this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ColumnNotFound { .. } => ErrorKind::ColumnNotFound,
            Self::AmbiguousColumn { .. } => ErrorKind::AmbiguousColumn,
            Self::MalformedRecord { .. } => ErrorKind::MalformedRecord,
            Self::ConsistencyViolation { .. } => ErrorKind::ConsistencyViolation,
            Self::InputChanged { .. } => ErrorKind::InputChanged,
            Self::InvalidCategory { .. } => ErrorKind::InvalidCategory,
            Self::OutputCollision { .. } => ErrorKind::OutputCollision,
            Self::Encode { .. } => ErrorKind::Encode,
            Self::SinkIo { .. } => ErrorKind::SinkIo,
            Self::InputIo { .. } => ErrorKind::InputIo,
            Self::Config(_) => ErrorKind::Config,
        }
    }
}

/// Taxonomy tag reported alongside a failed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    ColumnNotFound,
    AmbiguousColumn,
    MalformedRecord,
    ConsistencyViolation,
    InputChanged,
    InvalidCategory,
    OutputCollision,
    #[serde(rename = "EncodeError")]
    Encode,
    #[serde(rename = "SinkIOError")]
    SinkIo,
    #[serde(rename = "InputIOError")]
    InputIo,
    #[serde(rename = "ConfigError")]
    Config,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ColumnNotFound => "ColumnNotFound",
            Self::AmbiguousColumn => "AmbiguousColumn",
            Self::MalformedRecord => "MalformedRecord",
            Self::ConsistencyViolation => "ConsistencyViolation",
            Self::InputChanged => "InputChanged",
            Self::InvalidCategory => "InvalidCategory",
            Self::OutputCollision => "OutputCollision",
            Self::Encode => "EncodeError",
            Self::SinkIo => "SinkIOError",
            Self::InputIo => "InputIOError",
            Self::Config => "ConfigError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
