//! Input resolution: single files, directories and glob patterns.
//!
//! A Run starts from an [`InputSpec`]. [`resolve_inputs`] turns it into the
//! sorted list of files to split, so the order jobs are reported in does not
//! depend on directory iteration order.
//!
//! ```no_run
//! use catsplit::io::glob::{resolve_inputs, InputSpec};
//!
//! let files = resolve_inputs(&InputSpec::directory("exports", Some("*.txt")))?;
//! # use anyhow::Error; Ok::<(), Error>(())
//! ```

use anyhow::{Context, Result, bail};
use glob::{MatchOptions, glob_with};
use std::path::{Path, PathBuf};

/// Pattern used when a directory is given without one.
pub const DEFAULT_PATTERN: &str = "*.csv";

/// What the caller asked to split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSpec {
    /// One input file.
    File(PathBuf),
    /// Every file under `dir` matching `pattern` (relative to `dir`).
    Directory { dir: PathBuf, pattern: String },
}

impl InputSpec {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    pub fn directory(dir: impl Into<PathBuf>, pattern: Option<&str>) -> Self {
        Self::Directory {
            dir: dir.into(),
            pattern: pattern.unwrap_or(DEFAULT_PATTERN).to_string(),
        }
    }

    /// A directory path becomes [`InputSpec::Directory`], anything else a file.
    pub fn from_path(path: impl Into<PathBuf>, pattern: Option<&str>) -> Self {
        let path = path.into();
        if path.is_dir() {
            Self::directory(path, pattern)
        } else {
            Self::File(path)
        }
    }
}

/// Expand a glob pattern into a sorted vector of matching files.
///
/// Supports the usual syntax (`*`, `?`, `**`, `[abc]`, `[!abc]`). Directories
/// that match are skipped. Zero matches is an empty vector, not an error.
///
/// # Errors
/// Returns an error if the pattern is invalid or a matched entry cannot be read.
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: true,
    };
    let paths =
        glob_with(pattern, options).with_context(|| format!("invalid glob pattern: {pattern}"))?;

    let mut result = Vec::new();
    for entry in paths {
        let path =
            entry.with_context(|| format!("error reading glob entry for pattern: {pattern}"))?;
        if path.is_file() {
            result.push(path);
        }
    }
    result.sort();
    Ok(result)
}

/// Resolve an [`InputSpec`] to the list of files a Run will process.
///
/// A single file is returned as-is without checking it exists: a missing file
/// becomes a failed job (`InputIOError`) rather than an empty Run.
///
/// # Errors
/// Returns an error if the directory does not exist or the pattern is invalid.
pub fn resolve_inputs(spec: &InputSpec) -> Result<Vec<PathBuf>> {
    match spec {
        InputSpec::File(path) => Ok(vec![path.clone()]),
        InputSpec::Directory { dir, pattern } => {
            if !dir.is_dir() {
                bail!("input directory {} does not exist", dir.display());
            }
            let full = join_pattern(dir, pattern);
            expand_glob(&full)
        }
    }
}

fn join_pattern(dir: &Path, pattern: &str) -> String {
    let escaped = glob::Pattern::escape(&dir.to_string_lossy());
    let trimmed = escaped.trim_end_matches(['/', '\\']);
    if trimmed.is_empty() {
        format!("/{pattern}")
    } else {
        format!("{trimmed}/{pattern}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_escapes_directory_metacharacters() {
        assert_eq!(join_pattern(Path::new("data/[2024]"), "*.csv"), "data/[[]2024[]]/*.csv");
        assert_eq!(join_pattern(Path::new("data/"), "*.txt"), "data/*.txt");
    }
}
