//! Category discovery: the first pass of a split job.
//!
//! [`discover`] reads one full [`RowPass`] and interns every category value it
//! sees into a job-owned [`CategoryTable`]. Freezing the table yields the
//! [`CategorySet`] that the routing pass looks values up in. Nothing here is
//! shared between jobs.

use crate::config::MalformedPolicy;
use crate::error::{SplitError, SplitResult};
use crate::io::source::RowPass;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Dense index of a category within one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CategoryId(pub(crate) usize);

impl CategoryId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Interning table for category values, scoped to a single job.
#[derive(Debug, Default)]
pub struct CategoryTable {
    ids: HashMap<Arc<str>, CategoryId>,
    values: Vec<Arc<str>>,
}

impl CategoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the id for `value`, assigning the next one on first sight.
    pub fn intern(&mut self, value: &str) -> CategoryId {
        if let Some(id) = self.ids.get(value) {
            return *id;
        }
        let id = CategoryId(self.values.len());
        let value: Arc<str> = Arc::from(value);
        self.values.push(Arc::clone(&value));
        self.ids.insert(value, id);
        id
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Stop accepting new values.
    #[must_use]
    pub fn freeze(self) -> CategorySet {
        CategorySet {
            ids: self.ids,
            values: self.values,
        }
    }
}

/// Immutable set of the categories found by discovery.
#[derive(Debug, Default)]
pub struct CategorySet {
    ids: HashMap<Arc<str>, CategoryId>,
    values: Vec<Arc<str>>,
}

impl CategorySet {
    #[must_use]
    pub fn id_of(&self, value: &str) -> Option<CategoryId> {
        self.ids.get(value).copied()
    }

    /// Value for an id handed out by this set.
    #[must_use]
    pub fn value(&self, id: CategoryId) -> &str {
        &self.values[id.0]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Categories in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (CategoryId, &str)> {
        self.values
            .iter()
            .enumerate()
            .map(|(i, v)| (CategoryId(i), v.as_ref()))
    }

    pub fn contains(&self, value: &str) -> bool {
        self.ids.contains_key(value)
    }
}

/// Result of the discovery pass.
#[derive(Debug)]
pub struct Discovery {
    pub categories: CategorySet,
    /// Well-formed data rows seen.
    pub rows: u64,
    /// Malformed rows passed over (only with [`MalformedPolicy::Skip`]).
    pub malformed: u64,
}

/// Consume `pass` and collect the distinct values of column `column_idx`.
///
/// Malformed rows are not reported here; the routing pass sees the same rows
/// and emits the warnings, so each one is logged once.
///
/// # Errors
/// Returns the first malformed record under [`MalformedPolicy::Abort`], or any
/// input I/O error.
pub fn discover(
    pass: RowPass,
    column_idx: usize,
    policy: MalformedPolicy,
    mut table: CategoryTable,
) -> SplitResult<Discovery> {
    let mut rows = 0u64;
    let mut malformed = 0u64;
    for item in pass {
        match item {
            Ok(rec) => {
                rows += 1;
                table.intern(&rec.fields[column_idx]);
            }
            Err(SplitError::MalformedRecord { line, .. }) if policy == MalformedPolicy::Skip => {
                debug!(line, "malformed record passed over during discovery");
                malformed += 1;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(Discovery {
        categories: table.freeze(),
        rows,
        malformed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_collapses_duplicates() {
        let mut t = CategoryTable::new();
        let eu = t.intern("EU");
        let us = t.intern("US");
        assert_eq!(t.intern("EU"), eu);
        assert_ne!(eu, us);
        let empty = t.intern("");
        assert_eq!(t.len(), 3);

        let set = t.freeze();
        assert_eq!(set.id_of("US"), Some(us));
        assert_eq!(set.id_of(""), Some(empty));
        assert_eq!(set.id_of("APAC"), None);
        assert_eq!(set.value(eu), "EU");
        let order: Vec<&str> = set.iter().map(|(_, v)| v).collect();
        assert_eq!(order, vec!["EU", "US", ""]);
    }
}
