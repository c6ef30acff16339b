//! Partition Writer Pool: one output sink per category of a job.
//!
//! A [`WriterPool`] is built from the frozen [`CategorySet`]. Directory names
//! for every category are computed up front, so an unusable category value
//! fails the job before any file is created. Sinks are opened lazily on the
//! first record of their category, each behind its own lock: writes to one
//! sink are serialized while different sinks can be written concurrently.
//!
//! [`WriterPool::finish`] closes every open sink exactly once and keeps going
//! after a failed close, so no file handle outlives the job.

pub mod path;

use crate::discover::{CategoryId, CategorySet};
use crate::error::{SplitError, SplitResult};
use crate::io::encoder::{EncoderOptions, FormatEncoder};
use path::{category_dir_name, sink_path};
use std::fs::create_dir_all;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// An open output file for one (input file, category) pair.
pub struct OutputSink {
    path: PathBuf,
    encoder: FormatEncoder,
    rows: u64,
}

impl OutputSink {
    fn open(path: PathBuf, header: &[&str], opts: &EncoderOptions) -> SplitResult<Self> {
        let encoder = FormatEncoder::create(&path, header, opts)?;
        Ok(Self {
            path,
            encoder,
            rows: 0,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn rows(&self) -> u64 {
        self.rows
    }

    fn write(&mut self, fields: &[&str]) -> SplitResult<()> {
        self.encoder.write_record(fields)?;
        self.rows += 1;
        Ok(())
    }

    fn close(self) -> SplitResult<u64> {
        let rows = self.rows;
        self.encoder.finish()?;
        Ok(rows)
    }
}

enum Slot {
    Unopened,
    Open(OutputSink),
    /// Opening or writing failed; the sink must not be retried.
    Broken,
}

/// Rows written to one category sink, as reported by [`WriterPool::finish`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkSummary {
    pub category: CategoryId,
    pub path: PathBuf,
    pub rows: u64,
}

/// Lazily-opened sinks for every category of one job.
pub struct WriterPool {
    output_dir: PathBuf,
    stem: String,
    extension: String,
    header: Vec<String>,
    options: EncoderOptions,
    dir_names: Vec<String>,
    slots: Vec<Mutex<Slot>>,
    opened: AtomicUsize,
}

impl WriterPool {
    /// Prepare sinks for `categories`.
    ///
    /// `header` is the output header (category column already removed if it is
    /// being dropped).
    ///
    /// # Errors
    /// [`SplitError::InvalidCategory`] if any category value cannot be turned
    /// into a directory name. Nothing is created on disk in that case.
    pub fn new(
        output_dir: impl Into<PathBuf>,
        stem: impl Into<String>,
        extension: impl Into<String>,
        header: Vec<String>,
        options: EncoderOptions,
        categories: &CategorySet,
    ) -> SplitResult<Self> {
        let dir_names = categories
            .iter()
            .map(|(_, value)| category_dir_name(value))
            .collect::<SplitResult<Vec<_>>>()?;
        let slots = (0..categories.len()).map(|_| Mutex::new(Slot::Unopened)).collect();
        Ok(Self {
            output_dir: output_dir.into(),
            stem: stem.into(),
            extension: extension.into(),
            header,
            options,
            dir_names,
            slots,
            opened: AtomicUsize::new(0),
        })
    }

    /// Number of sinks opened so far.
    #[must_use]
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::Acquire)
    }

    /// Path the sink for `id` writes to.
    #[must_use]
    pub fn path_for(&self, id: CategoryId) -> PathBuf {
        sink_path(&self.output_dir, &self.dir_names[id.0], &self.stem, &self.extension)
    }

    /// Create the category directory. Idempotent.
    fn ensure_dir(&self, id: CategoryId) -> SplitResult<()> {
        let dir = self.output_dir.join(&self.dir_names[id.0]);
        create_dir_all(&dir).map_err(|e| SplitError::sink_io(&dir, e))
    }

    fn open_slot(&self, id: CategoryId) -> SplitResult<OutputSink> {
        self.ensure_dir(id)?;
        let path = self.path_for(id);
        let header: Vec<&str> = self.header.iter().map(String::as_str).collect();
        let sink = OutputSink::open(path, &header, &self.options)?;
        self.opened.fetch_add(1, Ordering::AcqRel);
        debug!(path = %sink.path().display(), "opened sink");
        Ok(sink)
    }

    /// Run `f` on the sink of `id` under its lock, opening the sink first if
    /// this is its first use. A failure marks the sink broken and later
    /// writes to it fail immediately.
    fn with_sink<F>(&self, id: CategoryId, f: F) -> SplitResult<()>
    where
        F: FnOnce(&mut OutputSink) -> SplitResult<()>,
    {
        let mut slot = self.slots[id.0]
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if matches!(*slot, Slot::Unopened) {
            match self.open_slot(id) {
                Ok(sink) => *slot = Slot::Open(sink),
                Err(e) => {
                    *slot = Slot::Broken;
                    return Err(e);
                }
            }
        }
        let Slot::Open(sink) = &mut *slot else {
            return Err(SplitError::sink_io(
                self.path_for(id),
                std::io::Error::other("sink failed earlier in this job"),
            ));
        };
        let result = f(sink);
        if result.is_err() {
            *slot = Slot::Broken;
        }
        result
    }

    /// Append records to the sink of `id`, opening it on first use.
    ///
    /// The sink's lock is held for the whole batch, so the batch lands in the
    /// file contiguously and in order.
    ///
    /// # Errors
    /// Any sink or encode error.
    pub fn write_batch(&self, id: CategoryId, records: &[Vec<&str>]) -> SplitResult<()> {
        self.with_sink(id, |sink| {
            for fields in records {
                sink.write(fields)?;
            }
            Ok(())
        })
    }

    /// Append one record to the sink of `id`.
    ///
    /// # Errors
    /// Any sink or encode error.
    pub fn write(&self, id: CategoryId, fields: &[&str]) -> SplitResult<()> {
        self.with_sink(id, |sink| sink.write(fields))
    }

    /// Flush and close every open sink.
    ///
    /// All sinks are closed even when one fails; the first error is returned.
    ///
    /// # Errors
    /// The first close failure.
    pub fn finish(self) -> SplitResult<Vec<SinkSummary>> {
        let mut summaries = Vec::new();
        let mut first_err = None;
        for (idx, slot) in self.slots.into_iter().enumerate() {
            let slot = slot.into_inner().unwrap_or_else(PoisonError::into_inner);
            if let Slot::Open(sink) = slot {
                let path = sink.path().to_path_buf();
                match sink.close() {
                    Ok(rows) => {
                        debug!(path = %path.display(), rows, "closed sink");
                        summaries.push(SinkSummary {
                            category: CategoryId(idx),
                            path,
                            rows,
                        });
                    }
                    Err(e) => {
                        first_err.get_or_insert(e);
                    }
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(summaries),
        }
    }
}
