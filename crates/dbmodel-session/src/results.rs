//! Lazy query results.

use std::fmt;
use std::sync::Arc;

use dbmodel_core::{Cursor, Record, RecordClass, Result};

/// Records hydrated one row at a time from a backend cursor.
///
/// A `Results` is consumed once; running the query again means calling
/// [`DataSource::select`](crate::DataSource::select) again. The first error
/// ends the iteration.
pub struct Results {
    class: Arc<RecordClass>,
    cursor: Box<dyn Cursor>,
    done: bool,
}

impl Results {
    pub(crate) fn new(class: Arc<RecordClass>, cursor: Box<dyn Cursor>) -> Self {
        Self {
            class,
            cursor,
            done: false,
        }
    }

    pub fn class(&self) -> &Arc<RecordClass> {
        &self.class
    }

    /// Drains the cursor into a vector, stopping at the first error.
    pub fn all(self) -> Result<Vec<Record>> {
        self.collect()
    }
}

impl Iterator for Results {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = match self.cursor.fetch_one() {
            Ok(Some(row)) => Some(Record::hydrate(&self.class, &row)),
            Ok(None) => None,
            Err(err) => Some(Err(err)),
        };
        if !matches!(item, Some(Ok(_))) {
            self.done = true;
        }
        item
    }
}

impl fmt::Debug for Results {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Results")
            .field("class", &self.class.name())
            .field("done", &self.done)
            .finish()
    }
}
