//! Spreadsheet encoder: one worksheet per sink, written as `.xlsx`.
//!
//! Cells are written as strings. The workbook is assembled when the sink is
//! finished, so a spreadsheet sink holds its rows in memory; the format's own
//! limits (1 048 576 rows, 16 384 columns) are checked on every record.

use crate::error::{SplitError, SplitResult};
use rust_xlsxwriter::{DocProperties, ExcelDateTime, Workbook, Worksheet, XlsxError};
use std::path::{Path, PathBuf};

const MAX_ROWS: u32 = 1_048_576;
const MAX_COLS: usize = 16_384;

pub struct XlsxEncoder {
    path: PathBuf,
    sheet: Worksheet,
    next_row: u32,
}

impl XlsxEncoder {
    /// Start a worksheet for `path` with `header` as its first row. The file
    /// itself is created by [`XlsxEncoder::finish`].
    ///
    /// # Errors
    /// [`SplitError::Encode`] if the header does not fit in a worksheet.
    pub fn create(path: &Path, header: &[&str]) -> SplitResult<Self> {
        let mut enc = Self {
            path: path.to_path_buf(),
            sheet: Worksheet::new(),
            next_row: 0,
        };
        enc.write_record(header)?;
        Ok(enc)
    }

    /// # Errors
    /// [`SplitError::Encode`] when a worksheet limit is exceeded.
    pub fn write_record(&mut self, fields: &[&str]) -> SplitResult<()> {
        if self.next_row >= MAX_ROWS {
            return Err(SplitError::encode(
                &self.path,
                format!("worksheet row limit of {MAX_ROWS} reached"),
            ));
        }
        if fields.len() > MAX_COLS {
            return Err(SplitError::encode(
                &self.path,
                format!("{} columns exceed the worksheet limit of {MAX_COLS}", fields.len()),
            ));
        }
        for (col, value) in fields.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            self.sheet
                .write_string(self.next_row, col as u16, *value)
                .map_err(|e| xlsx_error(&self.path, e))?;
        }
        self.next_row += 1;
        Ok(())
    }

    /// Assemble the workbook and save it.
    ///
    /// # Errors
    /// [`SplitError::SinkIo`] if the file cannot be written.
    pub fn finish(self) -> SplitResult<()> {
        let Self { path, sheet, .. } = self;
        let mut workbook = Workbook::new();
        // Fixed creation time keeps repeated runs byte-identical.
        let epoch = ExcelDateTime::from_ymd(2000, 1, 1).map_err(|e| xlsx_error(&path, e))?;
        workbook.set_properties(&DocProperties::new().set_creation_datetime(&epoch));
        workbook.push_worksheet(sheet);
        workbook.save(&path).map_err(|e| xlsx_error(&path, e))
    }
}

fn xlsx_error(path: &Path, err: XlsxError) -> SplitError {
    match err {
        XlsxError::IoError(e) => SplitError::sink_io(path, e),
        other => SplitError::encode(path, other),
    }
}
