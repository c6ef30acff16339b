//! Mapping category values to safe directory names.
//!
//! Category values come straight from the data, so they may contain path
//! separators, `..`, NUL bytes or nothing at all. [`category_dir_name`] escapes
//! every byte that is unsafe in a path component as `%XX` (uppercase hex).
//! `%` itself is escaped, which keeps the mapping injective: two distinct
//! category values never share a directory. The empty value maps to a lone `%`,
//! a name escaping can never produce.

use crate::error::{SplitError, SplitResult};
use std::fmt::Write;
use std::path::{Path, PathBuf};

/// Longest directory name most filesystems accept, in bytes.
pub const MAX_NAME_BYTES: usize = 255;

/// Directory name used for the empty category value.
pub const EMPTY_CATEGORY_DIR: &str = "%";

fn needs_escape(c: char) -> bool {
    matches!(c, '%' | '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') || c.is_control()
}

/// Directory name for `value`.
///
/// # Errors
/// [`SplitError::InvalidCategory`] when the escaped name is longer than
/// [`MAX_NAME_BYTES`].
pub fn category_dir_name(value: &str) -> SplitResult<String> {
    if value.is_empty() {
        return Ok(EMPTY_CATEGORY_DIR.to_string());
    }
    if value == "." || value == ".." {
        return Ok(value.replace('.', "%2E"));
    }
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if needs_escape(c) {
            let mut buf = [0u8; 4];
            for b in c.encode_utf8(&mut buf).bytes() {
                let _ = write!(out, "%{b:02X}");
            }
        } else {
            out.push(c);
        }
    }
    if out.len() > MAX_NAME_BYTES {
        return Err(SplitError::InvalidCategory {
            value: value.chars().take(64).collect(),
            reason: format!(
                "directory name would be {} bytes (limit {MAX_NAME_BYTES})",
                out.len()
            ),
        });
    }
    Ok(out)
}

/// Deterministic sink location:
/// `{output_dir}/{category_dir}/{input_stem}.{extension}`.
#[must_use]
pub fn sink_path(output_dir: &Path, category_dir: &str, stem: &str, extension: &str) -> PathBuf {
    output_dir
        .join(category_dir)
        .join(format!("{stem}.{extension}"))
}
