//! Scripted in-memory connection for unit tests.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use dbmodel_core::{BufferedCursor, Connection, Cursor, Dialect, Error, Result, Row, Value};

#[derive(Debug, Default)]
struct State {
    statements: Vec<String>,
    responses: VecDeque<Vec<Row>>,
    sequences: HashMap<String, i64>,
    fail_on: Option<String>,
    commits: usize,
    rollbacks: usize,
}

/// Records every statement and answers queries from a script.
///
/// Sequence queries (`nextval`, `GEN_ID`) count up per sequence starting at
/// 1. Every other SELECT pops the next scripted response; with nothing
/// scripted a COUNT answers 0 and anything else returns no rows. Clones
/// share state, so a test keeps one clone to script and inspect while the
/// data source owns the other.
#[derive(Debug, Clone)]
pub(crate) struct MockConnection {
    dialect: Dialect,
    state: Rc<RefCell<State>>,
}

impl MockConnection {
    pub(crate) fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            state: Rc::default(),
        }
    }

    pub(crate) fn push_rows(&self, rows: Vec<Vec<Value>>) {
        let rows = rows.into_iter().map(Row::new).collect();
        self.state.borrow_mut().responses.push_back(rows);
    }

    pub(crate) fn push_count(&self, count: i64) {
        self.push_rows(vec![vec![Value::BigInt(count)]]);
    }

    /// Makes every statement containing `fragment` fail.
    pub(crate) fn fail_on(&self, fragment: &str) {
        self.state.borrow_mut().fail_on = Some(fragment.to_string());
    }

    pub(crate) fn clear_failure(&self) {
        self.state.borrow_mut().fail_on = None;
    }

    pub(crate) fn statements(&self) -> Vec<String> {
        self.state.borrow().statements.clone()
    }

    pub(crate) fn commits(&self) -> usize {
        self.state.borrow().commits
    }

    pub(crate) fn rollbacks(&self) -> usize {
        self.state.borrow().rollbacks
    }
}

fn sequence_of(sql: &str) -> Option<String> {
    for prefix in ["SELECT nextval('", "SELECT GEN_ID("] {
        if let Some(rest) = sql.strip_prefix(prefix) {
            return rest.split(['\'', ',']).next().map(str::to_string);
        }
    }
    None
}

impl Connection for MockConnection {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn execute(&mut self, sql: &str) -> Result<Box<dyn Cursor>> {
        let mut state = self.state.borrow_mut();
        state.statements.push(sql.to_string());
        if state.fail_on.as_deref().is_some_and(|f| sql.contains(f)) {
            return Err(Error::backend(format!("scripted failure: {sql}")));
        }
        if let Some(sequence) = sequence_of(sql) {
            let next = state.sequences.entry(sequence).or_insert(0);
            *next += 1;
            let row = Row::new(vec![Value::BigInt(*next)]);
            return Ok(Box::new(BufferedCursor::from(vec![row])));
        }
        if !sql.starts_with("SELECT") {
            return Ok(Box::new(BufferedCursor::empty()));
        }
        let rows = match state.responses.pop_front() {
            Some(rows) => rows,
            None if sql.contains("COUNT(*)") => vec![Row::new(vec![Value::BigInt(0)])],
            None => Vec::new(),
        };
        Ok(Box::new(BufferedCursor::from(rows)))
    }

    fn commit(&mut self) -> Result<()> {
        self.state.borrow_mut().commits += 1;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.state.borrow_mut().rollbacks += 1;
        Ok(())
    }
}
