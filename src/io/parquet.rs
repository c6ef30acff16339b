//! Columnar-binary encoder backed by Arrow + Parquet.
//!
//! Every column is a non-null `Utf8` field named after the header, since the
//! splitter does not infer types. Records are buffered in Arrow string builders
//! and written as one row group per `batch_rows` records, so memory stays
//! bounded by the batch size rather than by the category's row count.

use crate::error::{SplitError, SplitResult};
use arrow::array::{ArrayRef, StringBuilder};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct ParquetEncoder {
    path: PathBuf,
    schema: SchemaRef,
    writer: ArrowWriter<File>,
    columns: Vec<StringBuilder>,
    buffered: usize,
    batch_rows: usize,
}

impl ParquetEncoder {
    /// Create `path` with a string schema derived from `header`.
    ///
    /// # Errors
    /// [`SplitError::SinkIo`] if the file cannot be created,
    /// [`SplitError::Encode`] if the writer rejects the schema.
    pub fn create(path: &Path, header: &[&str], batch_rows: usize) -> SplitResult<Self> {
        let fields: Vec<Field> = header
            .iter()
            .map(|name| Field::new(*name, DataType::Utf8, false))
            .collect();
        let schema: SchemaRef = Arc::new(Schema::new(fields));

        let file = File::create(path).map_err(|e| SplitError::sink_io(path, e))?;
        let props = WriterProperties::builder()
            .set_max_row_group_row_count(Some(batch_rows.max(1)))
            .build();
        let writer = ArrowWriter::try_new(file, Arc::clone(&schema), Some(props))
            .map_err(|e| SplitError::encode(path, e))?;

        let capacity = batch_rows.clamp(1, 8192);
        let columns = header
            .iter()
            .map(|_| StringBuilder::with_capacity(capacity, capacity * 16))
            .collect();
        Ok(Self {
            path: path.to_path_buf(),
            schema,
            writer,
            columns,
            buffered: 0,
            batch_rows: batch_rows.max(1),
        })
    }

    /// Buffer one record, writing a row group when the batch is full.
    ///
    /// # Errors
    /// [`SplitError::Encode`] on a width mismatch, [`SplitError::SinkIo`] if
    /// writing a full batch fails.
    pub fn write_record(&mut self, fields: &[&str]) -> SplitResult<()> {
        if fields.len() != self.columns.len() {
            return Err(SplitError::encode(
                &self.path,
                format!("expected {} fields, got {}", self.columns.len(), fields.len()),
            ));
        }
        for (builder, value) in self.columns.iter_mut().zip(fields) {
            builder.append_value(value);
        }
        self.buffered += 1;
        if self.buffered >= self.batch_rows {
            self.flush_batch()?;
        }
        Ok(())
    }

    fn flush_batch(&mut self) -> SplitResult<()> {
        if self.buffered == 0 {
            return Ok(());
        }
        let arrays: Vec<ArrayRef> = self
            .columns
            .iter_mut()
            .map(|b| Arc::new(b.finish()) as ArrayRef)
            .collect();
        let options = RecordBatchOptions::new().with_row_count(Some(self.buffered));
        let batch = RecordBatch::try_new_with_options(Arc::clone(&self.schema), arrays, &options)
            .map_err(|e| SplitError::encode(&self.path, e))?;
        self.writer
            .write(&batch)
            .map_err(|e| SplitError::sink_io(&self.path, io::Error::other(e)))?;
        self.buffered = 0;
        Ok(())
    }

    /// Write the remaining rows and the Parquet footer.
    ///
    /// # Errors
    /// [`SplitError::SinkIo`] if the last batch or the footer cannot be written.
    pub fn finish(mut self) -> SplitResult<()> {
        self.flush_batch()?;
        let Self { path, writer, .. } = self;
        let file = writer
            .into_inner()
            .map_err(|e| SplitError::sink_io(&path, io::Error::other(e)))?;
        file.sync_data().map_err(|e| SplitError::sink_io(&path, e))
    }
}
