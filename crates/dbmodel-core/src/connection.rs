//! The backend contract: textual statements in, rows out.
//!
//! A backend only needs to execute SQL text, hand back a cursor over the
//! resulting rows, commit, roll back, and report its [`Dialect`]. Everything
//! else (literal rendering, identity retrieval, hydration) happens above it.

use std::collections::VecDeque;

use crate::dialect::Dialect;
use crate::error::Result;
use crate::value::Value;

/// One result row, positionally ordered like the SELECT list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}

/// Rows produced by one executed statement.
pub trait Cursor {
    /// The next row, or `None` once the result is exhausted.
    fn fetch_one(&mut self) -> Result<Option<Row>>;

    fn fetch_all(&mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.fetch_one()? {
            rows.push(row);
        }
        Ok(rows)
    }
}

/// A cursor over rows that have already been read from the backend.
#[derive(Debug, Default)]
pub struct BufferedCursor {
    rows: VecDeque<Row>,
}

impl BufferedCursor {
    /// The result of a statement that returns no rows.
    pub fn empty() -> Self {
        Self::default()
    }
}

impl From<Vec<Row>> for BufferedCursor {
    fn from(rows: Vec<Row>) -> Self {
        Self { rows: rows.into() }
    }
}

impl Cursor for BufferedCursor {
    fn fetch_one(&mut self) -> Result<Option<Row>> {
        Ok(self.rows.pop_front())
    }

    fn fetch_all(&mut self) -> Result<Vec<Row>> {
        Ok(self.rows.drain(..).collect())
    }
}

/// A live database connection.
///
/// Statements run in submission order on the same session, which is what
/// makes "last inserted id" style identity retrieval possible.
pub trait Connection {
    fn dialect(&self) -> Dialect;

    /// Executes one statement. Errors are returned as [`Error::Backend`](crate::Error::Backend).
    fn execute(&mut self, sql: &str) -> Result<Box<dyn Cursor>>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    /// Releases the connection; cursors obtained earlier may stop working.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
