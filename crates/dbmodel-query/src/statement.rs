//! SELECT, INSERT, UPDATE and DELETE statement builders.
//!
//! Builders take identifiers and literals that are already rendered for the
//! target dialect and only assemble statement text. Use
//! [`Select::for_class`] and [`column_ref`] to get correctly quoted names
//! for a record class.

use dbmodel_core::{Dialect, RecordClass, TableName};

use crate::clause::{Clause, Clauses, Where};

/// A column reference, qualified with its table when `table` is given.
pub fn column_ref(dialect: Dialect, table: Option<&TableName>, column: &str) -> String {
    match table {
        Some(table) => format!("{}.{}", table.render(dialect), dialect.identifier(column)),
        None => dialect.identifier(column),
    }
}

/// SELECT query builder.
///
/// ```ignore
/// let sql = Select::for_class(&person, Dialect::Postgres, false)
///     .clauses(&[Where::raw("height > 180").into()])
///     .to_sql();
/// ```
#[derive(Debug, Clone, Default)]
pub struct Select {
    columns: Vec<String>,
    from: Vec<String>,
    clauses: Clauses,
}

impl Select {
    pub fn new(from: impl Into<String>) -> Self {
        Self {
            columns: Vec::new(),
            from: vec![from.into()],
            clauses: Clauses::default(),
        }
    }

    /// `SELECT <select bindings of class> FROM <table of class>`.
    ///
    /// With `qualified`, columns are prefixed with the table name so the
    /// query can be joined against other tables.
    pub fn for_class(class: &RecordClass, dialect: Dialect, qualified: bool) -> Self {
        let table = class.table();
        let qualifier = qualified.then_some(table);
        let columns = class
            .select_bindings()
            .map(|b| column_ref(dialect, qualifier, b.column_name()))
            .collect::<Vec<_>>();
        Self::new(table.render(dialect)).columns(columns)
    }

    /// `SELECT COUNT(*) FROM <from>`.
    pub fn count(from: impl Into<String>) -> Self {
        Self::new(from).column("COUNT(*)")
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.columns.push(column.into());
        self
    }

    pub fn columns(mut self, columns: impl IntoIterator<Item = String>) -> Self {
        self.columns.extend(columns);
        self
    }

    /// Adds another relation to the FROM list.
    pub fn from(mut self, relation: impl Into<String>) -> Self {
        self.from.push(relation.into());
        self
    }

    /// ANDs a condition onto the WHERE clause.
    pub fn filter(mut self, condition: Where) -> Self {
        self.clauses.and_where(condition);
        self
    }

    pub fn clauses(mut self, clauses: &[Clause]) -> Self {
        for clause in clauses {
            self.clauses.push(clause);
        }
        self
    }

    /// Like [`Select::clauses`], keeping only WHERE clauses (for COUNT).
    pub fn where_clauses(mut self, clauses: &[Clause]) -> Self {
        for clause in clauses {
            if let Clause::Where(w) = clause {
                self.clauses.and_where(w.clone());
            }
        }
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.clauses.limit = Some(limit);
        self
    }

    pub fn to_sql(&self) -> String {
        format!(
            "SELECT {} FROM {}{}",
            self.columns.join(", "),
            self.from.join(", "),
            self.clauses.to_sql()
        )
    }
}

/// INSERT statement builder.
#[derive(Debug, Clone)]
pub struct Insert {
    table: String,
    columns: Vec<String>,
    values: Vec<String>,
}

impl Insert {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn value(mut self, column: impl Into<String>, literal: impl Into<String>) -> Self {
        self.columns.push(column.into());
        self.values.push(literal.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn to_sql(&self) -> String {
        format!(
            "INSERT INTO {}({}) VALUES ({})",
            self.table,
            self.columns.join(", "),
            self.values.join(", ")
        )
    }
}

/// UPDATE statement builder.
#[derive(Debug, Clone)]
pub struct Update {
    table: String,
    assignments: Vec<(String, String)>,
    filter: Where,
}

impl Update {
    /// UPDATE statements always carry a WHERE clause.
    pub fn new(table: impl Into<String>, filter: Where) -> Self {
        Self {
            table: table.into(),
            assignments: Vec::new(),
            filter,
        }
    }

    pub fn set(mut self, column: impl Into<String>, literal: impl Into<String>) -> Self {
        self.assignments.push((column.into(), literal.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn to_sql(&self) -> String {
        let sets: Vec<String> = self
            .assignments
            .iter()
            .map(|(column, literal)| format!("{column} = {literal}"))
            .collect();
        format!(
            "UPDATE {} SET {} {}",
            self.table,
            sets.join(", "),
            self.filter.to_sql()
        )
    }
}

/// DELETE statement builder.
#[derive(Debug, Clone)]
pub struct Delete {
    table: String,
    filter: Option<Where>,
}

impl Delete {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filter: None,
        }
    }

    pub fn filter(mut self, condition: Where) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(condition),
            None => condition,
        });
        self
    }

    pub fn to_sql(&self) -> String {
        match &self.filter {
            Some(filter) => format!("DELETE FROM {} {}", self.table, filter.to_sql()),
            None => format!("DELETE FROM {}", self.table),
        }
    }
}
