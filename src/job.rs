//! Splitter Pipeline: the two-pass state machine for one input file.
//!
//! ```text
//! Idle ─► Discovering ─► Routing ─► Finalizing ─► Done
//!   └──────────┴────────────┴───────────┴──────► Failed
//! ```
//!
//! Discovery must finish before any output file is opened, so a job always
//! reads its input twice through two independent [`RowPass`]es. Between the
//! passes the file's size and modification time are compared with the
//! snapshot taken at discovery start, and the routing pass re-checks the
//! header and row count. Any drift fails the job instead of producing output
//! that does not match the discovered categories.
//!
//! Routing reads records in chunks of `routing_chunk_rows`, groups each chunk
//! by category and hands the groups to the [`WriterPool`]. With
//! `parallel_routing` the groups of one chunk are written on rayon workers;
//! each sink is still written by one thread at a time and in input order.

use crate::config::{MalformedPolicy, SplitConfig};
use crate::discover::{CategoryId, CategorySet, CategoryTable, Discovery, discover};
use crate::error::{SplitError, SplitResult};
use crate::io::encoder::EncoderOptions;
use crate::io::source::{InputSnapshot, Record, RowPass, RowSource};
use crate::sink::WriterPool;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, info_span, warn};

#[cfg(feature = "parallel-io")]
use rayon::prelude::*;

/// Identifier of a job within a Run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub usize);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{:04}", self.0)
    }
}

/// Lifecycle of a [`SplitJob`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Discovering,
    Routing,
    Finalizing,
    Done,
    Failed,
}

/// What a successful job produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSummary {
    pub categories_found: usize,
    pub rows_per_category: BTreeMap<String, u64>,
    pub output_files: Vec<PathBuf>,
    pub rows_read: u64,
    pub rows_skipped: u64,
}

/// One input file split end-to-end.
pub struct SplitJob<'a> {
    id: JobId,
    source: RowSource,
    config: &'a SplitConfig,
    state: JobState,
    sinks_opened: usize,
    rows_read: u64,
    rows_skipped: u64,
}

impl<'a> SplitJob<'a> {
    pub fn new(id: JobId, input: impl Into<PathBuf>, config: &'a SplitConfig) -> Self {
        Self {
            id,
            source: RowSource::new(input, config.input_separator.clone()),
            config,
            state: JobState::Idle,
            sinks_opened: 0,
            rows_read: 0,
            rows_skipped: 0,
        }
    }

    #[must_use]
    pub fn id(&self) -> JobId {
        self.id
    }

    #[must_use]
    pub fn input(&self) -> &Path {
        self.source.path()
    }

    #[must_use]
    pub fn state(&self) -> JobState {
        self.state
    }

    /// Sinks opened before the job ended. Non-zero after a failure means
    /// partial output exists on disk.
    #[must_use]
    pub fn sinks_opened(&self) -> usize {
        self.sinks_opened
    }

    /// Rows seen by the routing pass so far, malformed ones included.
    #[must_use]
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    #[must_use]
    pub fn rows_skipped(&self) -> u64 {
        self.rows_skipped
    }

    fn transition(&mut self, to: JobState) {
        debug!(job_id = %self.id, from = ?self.state, to = ?to, "job state change");
        self.state = to;
    }

    /// Run both passes and close every sink.
    ///
    /// # Errors
    /// Any [`SplitError`]; the job is left in [`JobState::Failed`].
    pub fn run(&mut self) -> SplitResult<JobSummary> {
        if self.state != JobState::Idle {
            return Err(SplitError::Config(format!(
                "{} already ran (state {:?})",
                self.id, self.state
            )));
        }
        let span = info_span!("job", job_id = %self.id, file = %self.source.path().display());
        let _entered = span.enter();
        let result = self.run_inner();
        self.settle(result)
    }

    fn settle(&mut self, result: SplitResult<JobSummary>) -> SplitResult<JobSummary> {
        match result {
            Ok(summary) => {
                self.transition(JobState::Done);
                Ok(summary)
            }
            Err(e) => {
                self.transition(JobState::Failed);
                Err(e)
            }
        }
    }

    fn run_inner(&mut self) -> SplitResult<JobSummary> {
        let path = self.source.path().to_path_buf();
        let stem = self.source.stem()?;

        self.transition(JobState::Discovering);
        let snapshot = InputSnapshot::capture(&path)?;
        let pass = self.source.open()?;
        let Some(header) = pass.header().map(<[String]>::to_vec) else {
            info!(job_id = %self.id, file = %path.display(), "input is empty, nothing to split");
            self.transition(JobState::Finalizing);
            return Ok(self.summary(0, BTreeMap::new(), Vec::new()));
        };
        let column_idx = pass.column_index(&self.config.category_column)?;
        if self.output_header(&header, column_idx).is_empty() {
            return Err(SplitError::Config(format!(
                "'{}' is the only column of {}; dropping it leaves nothing to write \
                 (keep the category column instead)",
                self.config.category_column,
                path.display()
            )));
        }
        let discovery = discover(
            pass,
            column_idx,
            self.config.malformed_policy,
            CategoryTable::new(),
        )?;
        info!(
            job_id = %self.id,
            file = %path.display(),
            categories = discovery.categories.len(),
            rows = discovery.rows,
            "discovery finished"
        );

        self.route_phase(stem, &snapshot, &header, column_idx, discovery)
    }

    /// Routing and finalizing, from a finished discovery.
    fn route_phase(
        &mut self,
        stem: String,
        snapshot: &InputSnapshot,
        header: &[String],
        column_idx: usize,
        discovery: Discovery,
    ) -> SplitResult<JobSummary> {
        let path = self.source.path().to_path_buf();
        self.transition(JobState::Routing);
        snapshot.verify(&path)?;
        let pass = self.source.open()?;
        if pass.header() != Some(header) {
            return Err(SplitError::InputChanged {
                path,
                details: "header differs between passes".into(),
            });
        }

        let pool = WriterPool::new(
            &self.config.output_directory,
            stem,
            self.config.extension(),
            self.output_header(header, column_idx),
            EncoderOptions {
                format: self.config.output_format,
                separator: self.config.output_separator.clone(),
                parquet_batch_rows: self.config.parquet_batch_rows,
            },
            &discovery.categories,
        )?;

        let routed = self.route(pass, &pool, &discovery.categories, column_idx);
        self.sinks_opened = pool.opened();
        let routed = match routed {
            Ok(n) => n,
            Err(e) => {
                // Close what was opened; the routing error is the one reported.
                if let Err(close_err) = pool.finish() {
                    debug!(job_id = %self.id, error = %close_err, "close after failure also failed");
                }
                return Err(e);
            }
        };

        if routed != discovery.rows {
            if let Err(close_err) = pool.finish() {
                debug!(job_id = %self.id, error = %close_err, "close after failure also failed");
            }
            return Err(SplitError::InputChanged {
                path,
                details: format!(
                    "discovery saw {} rows, routing saw {routed}",
                    discovery.rows
                ),
            });
        }

        self.transition(JobState::Finalizing);
        let sinks = pool.finish()?;
        let mut rows_per_category = BTreeMap::new();
        let mut output_files = Vec::with_capacity(sinks.len());
        for sink in sinks {
            rows_per_category.insert(
                discovery.categories.value(sink.category).to_string(),
                sink.rows,
            );
            output_files.push(sink.path);
        }
        Ok(self.summary(discovery.categories.len(), rows_per_category, output_files))
    }

    fn summary(
        &self,
        categories_found: usize,
        rows_per_category: BTreeMap<String, u64>,
        output_files: Vec<PathBuf>,
    ) -> JobSummary {
        JobSummary {
            categories_found,
            rows_per_category,
            output_files,
            rows_read: self.rows_read,
            rows_skipped: self.rows_skipped,
        }
    }

    fn output_header(&self, header: &[String], column_idx: usize) -> Vec<String> {
        header
            .iter()
            .enumerate()
            .filter(|(i, _)| self.config.keep_category_column || *i != column_idx)
            .map(|(_, name)| name.clone())
            .collect()
    }

    /// Second pass. Returns the number of well-formed rows routed.
    fn route(
        &mut self,
        pass: RowPass,
        pool: &WriterPool,
        categories: &CategorySet,
        column_idx: usize,
    ) -> SplitResult<u64> {
        let chunk_rows = self.config.routing_chunk_rows.max(1);
        let mut chunk: Vec<(CategoryId, Record)> = Vec::with_capacity(chunk_rows.min(65_536));
        let mut routed = 0u64;

        for item in pass {
            self.rows_read += 1;
            match item {
                Ok(rec) => {
                    let value = &rec.fields[column_idx];
                    let id = categories.id_of(value).ok_or_else(|| {
                        SplitError::ConsistencyViolation {
                            category: value.clone(),
                            line: rec.line,
                        }
                    })?;
                    chunk.push((id, rec));
                    routed += 1;
                    if chunk.len() >= chunk_rows {
                        self.dispatch(pool, &mut chunk, column_idx)?;
                    }
                }
                Err(SplitError::MalformedRecord { line, reason, .. })
                    if self.config.malformed_policy == MalformedPolicy::Skip =>
                {
                    self.rows_skipped += 1;
                    warn!(
                        job_id = %self.id,
                        file = %self.source.path().display(),
                        line,
                        reason = %reason,
                        "skipping malformed record"
                    );
                }
                Err(e) => {
                    // I/O errors end the pass; they are not data rows.
                    if matches!(e, SplitError::InputIo { .. }) {
                        self.rows_read -= 1;
                    }
                    return Err(e);
                }
            }
        }
        self.dispatch(pool, &mut chunk, column_idx)?;
        Ok(routed)
    }

    /// Write a chunk to the pool, one batch per category, and clear it.
    fn dispatch(
        &self,
        pool: &WriterPool,
        chunk: &mut Vec<(CategoryId, Record)>,
        column_idx: usize,
    ) -> SplitResult<()> {
        if chunk.is_empty() {
            return Ok(());
        }
        let keep = self.config.keep_category_column;
        let mut groups: BTreeMap<CategoryId, Vec<Vec<&str>>> = BTreeMap::new();
        for (id, rec) in chunk.iter() {
            let fields: Vec<&str> = rec
                .fields
                .iter()
                .enumerate()
                .filter(|(i, _)| keep || *i != column_idx)
                .map(|(_, f)| f.as_str())
                .collect();
            groups.entry(*id).or_default().push(fields);
        }
        let result = self.write_groups(pool, groups);
        chunk.clear();
        result
    }

    #[cfg(feature = "parallel-io")]
    fn write_groups(
        &self,
        pool: &WriterPool,
        groups: BTreeMap<CategoryId, Vec<Vec<&str>>>,
    ) -> SplitResult<()> {
        if self.config.parallel_routing && groups.len() > 1 {
            let span = tracing::Span::current();
            let groups: Vec<_> = groups.into_iter().collect();
            return groups.into_par_iter().try_for_each(|(id, rows)| {
                let _entered = span.enter();
                pool.write_batch(id, &rows)
            });
        }
        write_sequential(pool, groups)
    }

    #[cfg(not(feature = "parallel-io"))]
    fn write_groups(
        &self,
        pool: &WriterPool,
        groups: BTreeMap<CategoryId, Vec<Vec<&str>>>,
    ) -> SplitResult<()> {
        write_sequential(pool, groups)
    }
}

fn write_sequential(
    pool: &WriterPool,
    groups: BTreeMap<CategoryId, Vec<Vec<&str>>>,
) -> SplitResult<()> {
    for (id, rows) in groups {
        pool.write_batch(id, &rows)?;
    }
    Ok(())
}
