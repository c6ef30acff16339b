//! Run Controller: one [`SplitJob`] per input file.
//!
//! Jobs are independent (disjoint inputs, disjoint output files) and run in
//! parallel on rayon. A failing job never aborts the Run; its error is recorded
//! in the job's [`FileStats`] and the remaining files are processed. Results
//! are reported in input order regardless of completion order.

use crate::config::SplitConfig;
use crate::error::{SplitError, SplitResult};
use crate::io::glob::{InputSpec, resolve_inputs};
use crate::io::source::input_stem;
use crate::job::{JobId, SplitJob};
use crate::stats::{FileStats, JobStatus, RunStats};
use anyhow::Result;
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{error, info, warn};

/// Run-level cancellation flag.
///
/// Once cancelled, no further job is started. Jobs already running finish (or
/// fail) normally and close all of their sinks.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct Runner {
    config: SplitConfig,
    cancel: CancelToken,
}

impl Runner {
    /// # Errors
    /// [`SplitError::Config`] if the configuration does not validate.
    pub fn new(config: SplitConfig) -> SplitResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            cancel: CancelToken::new(),
        })
    }

    /// Use an externally owned cancellation token.
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    #[must_use]
    pub fn config(&self) -> &SplitConfig {
        &self.config
    }

    /// Resolve `spec` and split every matching file.
    ///
    /// # Errors
    /// Only input resolution errors (bad directory or pattern). Per-file
    /// failures are reported inside the returned [`RunStats`].
    pub fn run_spec(&self, spec: &InputSpec) -> Result<RunStats> {
        let inputs = resolve_inputs(spec)?;
        if inputs.is_empty() {
            warn!(spec = ?spec, "no input matched");
        }
        Ok(self.run(&inputs))
    }

    /// Split every file in `inputs`.
    #[must_use]
    pub fn run(&self, inputs: &[PathBuf]) -> RunStats {
        // One worker per CPU unless configured, never more than there are files.
        let workers = self
            .config
            .threads
            .unwrap_or_else(num_cpus::get)
            .clamp(1, inputs.len().max(1));
        info!(files = inputs.len(), workers, "run started");
        let collisions = stem_collisions(inputs);

        let exec = || {
            inputs
                .par_iter()
                .enumerate()
                .map(|(i, path)| self.run_one(JobId(i), path, collisions[i].as_ref()))
                .collect::<Vec<_>>()
        };
        let per_file = match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
            Ok(pool) => pool.install(exec),
            Err(e) => {
                warn!(error = %e, "could not build job pool, using the global pool");
                exec()
            }
        };

        let stats = RunStats { per_file };
        let failed = stats.per_file.iter().filter(|f| f.status == JobStatus::Failed).count();
        let cancelled = stats
            .per_file
            .iter()
            .filter(|f| f.status == JobStatus::Cancelled)
            .count();
        info!(
            files = stats.per_file.len(),
            failed,
            cancelled,
            status = ?stats.status(),
            "run finished"
        );
        stats
    }

    fn run_one(&self, id: JobId, path: &PathBuf, collides_with: Option<&PathBuf>) -> FileStats {
        if self.cancel.is_cancelled() {
            info!(job_id = %id, file = %path.display(), "run cancelled, job not started");
            return FileStats::cancelled(path.clone(), id.to_string());
        }
        let mut stats = FileStats::new(path.clone(), id.to_string());
        let started = Instant::now();
        info!(job_id = %id, file = %path.display(), "job started");

        let mut job = SplitJob::new(id, path, &self.config);
        let result = match collides_with {
            Some(other) => Err(SplitError::OutputCollision {
                path: path.clone(),
                other: other.clone(),
            }),
            None => job.run(),
        };
        stats.rows_read = job.rows_read();
        stats.rows_skipped = job.rows_skipped();
        stats.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(summary) => {
                stats.categories_found = summary.categories_found;
                stats.rows_per_category = summary.rows_per_category;
                info!(
                    job_id = %id,
                    file = %path.display(),
                    categories = stats.categories_found,
                    rows = stats.rows_written(),
                    skipped = stats.rows_skipped,
                    elapsed_ms = stats.elapsed_ms,
                    "job finished"
                );
            }
            Err(e) => {
                stats.status = JobStatus::Failed;
                stats.error_kind = Some(e.kind());
                stats.error = Some(e.to_string());
                stats.partial_output = job.sinks_opened() > 0;
                if stats.partial_output {
                    error!(
                        job_id = %id,
                        file = %path.display(),
                        kind = %e.kind(),
                        error = %e,
                        "job failed; partial output left on disk, do not trust"
                    );
                } else {
                    error!(job_id = %id, file = %path.display(), kind = %e.kind(), error = %e, "job failed");
                }
            }
        }
        stats
    }
}

/// For each input, the earlier input sharing its output stem, if any.
fn stem_collisions(inputs: &[PathBuf]) -> Vec<Option<PathBuf>> {
    let mut seen: HashMap<String, &PathBuf> = HashMap::new();
    inputs
        .iter()
        .map(|path| {
            let stem = input_stem(path).ok()?;
            match seen.get(&stem) {
                Some(first) => Some((*first).clone()),
                None => {
                    seen.insert(stem, path);
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_inputs_with_same_stem_collide() {
        let inputs = vec![
            PathBuf::from("a/data.csv"),
            PathBuf::from("b/other.csv"),
            PathBuf::from("b/data.txt.gz"),
        ];
        let c = stem_collisions(&inputs);
        assert_eq!(c[0], None);
        assert_eq!(c[1], None);
        assert_eq!(c[2], Some(PathBuf::from("a/data.csv")));
    }
}
