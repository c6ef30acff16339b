//! Run statistics and status reporting.
//!
//! The Run Controller produces one [`FileStats`] per input file, in input order,
//! and wraps them in a [`RunStats`]. How the summary is shown is up to the
//! caller: [`RunStats::print`] renders a plain-text report, [`RunStats::to_json`]
//! and [`RunStats::save_to_file`] produce JSON for further automation.

use crate::error::ErrorKind;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Outcome of one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Ok,
    Failed,
    /// Never started because the Run was cancelled.
    Cancelled,
}

/// Statistics for one input file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileStats {
    pub file: PathBuf,
    pub job_id: String,
    pub status: JobStatus,
    pub categories_found: usize,
    pub rows_per_category: BTreeMap<String, u64>,
    /// Data rows read during routing, malformed ones included.
    pub rows_read: u64,
    /// Malformed rows skipped under the skip policy.
    pub rows_skipped: u64,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Output files of a failed job exist on disk and must not be trusted.
    pub partial_output: bool,
}

impl FileStats {
    pub(crate) fn new(file: PathBuf, job_id: String) -> Self {
        Self {
            file,
            job_id,
            status: JobStatus::Ok,
            categories_found: 0,
            rows_per_category: BTreeMap::new(),
            rows_read: 0,
            rows_skipped: 0,
            elapsed_ms: 0,
            error_kind: None,
            error: None,
            partial_output: false,
        }
    }

    pub(crate) fn cancelled(file: PathBuf, job_id: String) -> Self {
        Self {
            status: JobStatus::Cancelled,
            ..Self::new(file, job_id)
        }
    }

    /// Rows written across every category file.
    #[must_use]
    pub fn rows_written(&self) -> u64 {
        self.rows_per_category.values().sum()
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == JobStatus::Ok
    }
}

/// Overall outcome of a Run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every job succeeded.
    AllOk,
    /// At least one job failed or was cancelled, at least one succeeded.
    PartialFailure,
    /// No input matched, or no job succeeded.
    TotalFailure,
}

impl RunStatus {
    /// Conventional process exit code for this status.
    #[must_use]
    pub fn exit_code(self) -> i32 {
        match self {
            Self::AllOk => 0,
            Self::TotalFailure => 1,
            Self::PartialFailure => 2,
        }
    }
}

/// Per-file statistics of a whole Run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub per_file: Vec<FileStats>,
}

impl RunStats {
    #[must_use]
    pub fn status(&self) -> RunStatus {
        let ok = self.per_file.iter().filter(|f| f.is_ok()).count();
        if ok == 0 {
            RunStatus::TotalFailure
        } else if ok == self.per_file.len() {
            RunStatus::AllOk
        } else {
            RunStatus::PartialFailure
        }
    }

    /// Entries that did not finish successfully.
    pub fn failures(&self) -> impl Iterator<Item = &FileStats> {
        self.per_file.iter().filter(|f| !f.is_ok())
    }

    /// Lookup by input path.
    #[must_use]
    pub fn get(&self, file: impl AsRef<Path>) -> Option<&FileStats> {
        self.per_file.iter().find(|f| f.file == file.as_ref())
    }

    /// JSON document with the overall status and every per-file entry.
    #[must_use]
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "status": self.status(),
            "per_file": self.per_file,
        })
    }

    /// Save [`RunStats::to_json`] to `path`, pretty-printed.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written to.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
        let mut w = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut w, &self.to_json())
            .with_context(|| format!("write {}", path.display()))?;
        w.write_all(b"\n")?;
        w.flush()?;
        Ok(())
    }

    /// Human-readable report.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "========== Split Summary ==========");
        for f in &self.per_file {
            let _ = writeln!(out, "{} [{}]", f.file.display(), f.job_id);
            match f.status {
                JobStatus::Ok => {
                    let _ = writeln!(
                        out,
                        "  ok: {} categories, {} rows written, {} skipped, {} ms",
                        f.categories_found,
                        f.rows_written(),
                        f.rows_skipped,
                        f.elapsed_ms
                    );
                    for (category, rows) in &f.rows_per_category {
                        let _ = writeln!(out, "    {category:?}: {rows}");
                    }
                }
                JobStatus::Failed => {
                    let kind = f.error_kind.map_or("unknown", ErrorKind::as_str);
                    let _ = writeln!(
                        out,
                        "  FAILED ({kind}): {}",
                        f.error.as_deref().unwrap_or("no details")
                    );
                    if f.partial_output {
                        let _ = writeln!(out, "  partial output left on disk, do not trust");
                    }
                }
                JobStatus::Cancelled => {
                    let _ = writeln!(out, "  cancelled before start");
                }
            }
        }
        let _ = writeln!(out, "-----------------------------------");
        let _ = writeln!(out, "Status: {:?}", self.status());
        let _ = writeln!(out, "===================================");
        out
    }

    /// Print [`RunStats::render`] to stdout.
    pub fn print(&self) {
        print!("{}", self.render());
    }
}
