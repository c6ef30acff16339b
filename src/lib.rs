//! # catsplit
//!
//! A **streaming dataset splitter** for Rust. Given one or more large delimited
//! files (CSV, TSV, pipe-separated, ...), catsplit discovers the distinct values
//! of a category column without loading the file into memory, then rewrites the
//! dataset into one output file per category value.
//!
//! ## Key Features
//!
//! - **Two-pass, memory-bounded** - a discovery pass collects the categories, a
//!   routing pass streams every record to its category's sink
//! - **No dropped or duplicated rows** - every well-formed record lands in exactly
//!   one output file; malformed ones are skipped with a warning or abort the job
//! - **Pluggable output formats** - delimited text, Parquet and `.xlsx` (optional
//!   via feature flags)
//! - **Parallel** - independent input files are split concurrently, and writes to
//!   different category files within one file can be dispatched to worker threads
//! - **Partial-failure reporting** - a bad input never aborts the Run; every file
//!   gets its own [`FileStats`] entry
//! - **Transparent decompression** of `.gz`, `.zst`, `.bz2` and `.xz` inputs
//!
//! ## Quick Start
//!
//! ```no_run
//! use catsplit::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut config = SplitConfig::new("region", "out");
//! config.input_separator = ",".parse()?;
//!
//! let runner = Runner::new(config)?;
//! let stats = runner.run_spec(&InputSpec::directory("exports", Some("*.csv")))?;
//! stats.print();
//! std::process::exit(stats.status().exit_code());
//! # }
//! ```
//!
//! ## Output Layout
//!
//! ```text
//! {output_directory}/{category_value}/{input_stem}.{extension}
//! ```
//!
//! Category values are escaped before they are used as directory names (see
//! [`sink::path`]), so a value such as `../etc` cannot leave the output tree.
//!
//! ## Architecture
//!
//! Leaf-first:
//! 1. [`io::source`] - the Row Source, a restartable sequential reader
//! 2. [`discover`] - the Category Discoverer (first pass)
//! 3. [`sink`] - the Partition Writer Pool, one lazily opened sink per category
//! 4. [`io::encoder`] - the Format Encoder (delimited, Parquet, spreadsheet)
//! 5. [`job`] - the Splitter Pipeline state machine for one file
//! 6. [`runner`] - the Run Controller over many files
//!
//! ## Feature Flags
//!
//! - `io-parquet` - columnar-binary output (requires Arrow)
//! - `io-xlsx` - spreadsheet output
//! - `parallel-io` - parallel dispatch of writes within a job
//! - `compression-gzip`, `compression-zstd`, `compression-bzip2`, `compression-xz` -
//!   compressed input support
//! - `cli` - the `catsplit` command-line binary
//!
//! ## Logging
//!
//! The library emits [`tracing`] events (`info` per job start/end, `warn` per
//! skipped malformed record, `error` per failed job), each carrying `job_id` and
//! `file` fields. Install any subscriber to see them.

pub mod config;
pub mod discover;
pub mod error;
pub mod io;
pub mod job;
pub mod runner;
pub mod sink;
pub mod stats;

pub use config::{MalformedPolicy, OutputFormat, Separator, SplitConfig};
pub use discover::{CategoryId, CategorySet, CategoryTable};
pub use error::{ErrorKind, SplitError, SplitResult};
pub use io::glob::InputSpec;
pub use io::source::{Record, RowSource};
pub use job::{JobId, JobState, JobSummary, SplitJob};
pub use runner::{CancelToken, Runner};
pub use stats::{FileStats, JobStatus, RunStats, RunStatus};

use std::path::Path;

/// Split a single file with `config`, outside of a Run.
///
/// # Errors
/// The job's [`SplitError`] if it fails; output files already written stay on
/// disk.
pub fn split_file(input: impl AsRef<Path>, config: &SplitConfig) -> SplitResult<JobSummary> {
    config.validate()?;
    SplitJob::new(JobId(0), input.as_ref(), config).run()
}
