//! Bounded in-memory log of executed statements.

use std::collections::VecDeque;

use crate::config::DEFAULT_LOG_CAPACITY;

/// Ring buffer holding the text of the most recently executed statements,
/// oldest first.
#[derive(Debug, Clone)]
pub struct SqlLog {
    capacity: usize,
    entries: VecDeque<String>,
}

impl Default for SqlLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl SqlLog {
    /// A log keeping at most `capacity` statements. A capacity of zero keeps
    /// nothing.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_LOG_CAPACITY)),
        }
    }

    pub fn push(&mut self, sql: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(sql.into());
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The most recently executed statement.
    pub fn last(&self) -> Option<&str> {
        self.entries.back().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Statements logged after the first `skip`, e.g. since a saved
    /// [`SqlLog::len`].
    pub fn since(&self, skip: usize) -> impl Iterator<Item = &str> {
        self.iter().skip(skip)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
