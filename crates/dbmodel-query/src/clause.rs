//! WHERE / ORDER BY / LIMIT / OFFSET fragments.
//!
//! Fragments are composed from SQL text that has already been rendered for
//! a dialect (identifiers quoted, literals escaped). Nothing here renders
//! values itself.

use std::fmt;
use std::ops::{BitAnd, BitOr};

/// A boolean condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Where {
    expr: String,
}

impl Where {
    /// A condition from raw SQL, e.g. `Where::raw("height > 180")`.
    pub fn raw(expr: impl Into<String>) -> Self {
        Self { expr: expr.into() }
    }

    /// `column = literal` from already-rendered parts.
    pub fn eq(column: impl AsRef<str>, literal: impl AsRef<str>) -> Self {
        Self::raw(format!("{} = {}", column.as_ref(), literal.as_ref()))
    }

    /// Joins simple conditions with plain `AND`, without parentheses.
    ///
    /// Meant for equality chains such as key comparisons; returns `None` for
    /// an empty input.
    pub fn all(parts: impl IntoIterator<Item = Where>) -> Option<Self> {
        let parts: Vec<String> = parts.into_iter().map(|w| w.expr).collect();
        if parts.is_empty() {
            None
        } else {
            Some(Self::raw(parts.join(" AND ")))
        }
    }

    /// `(self) AND (other)`.
    pub fn and(self, other: Where) -> Self {
        Self::raw(format!("({}) AND ({})", self.expr, other.expr))
    }

    /// `(self) OR (other)`.
    pub fn or(self, other: Where) -> Self {
        Self::raw(format!("({}) OR ({})", self.expr, other.expr))
    }

    /// The bare condition, without the `WHERE` keyword.
    pub fn expression(&self) -> &str {
        &self.expr
    }

    pub fn to_sql(&self) -> String {
        format!("WHERE {}", self.expr)
    }
}

impl BitAnd for Where {
    type Output = Where;

    fn bitand(self, rhs: Where) -> Where {
        self.and(rhs)
    }
}

impl BitOr for Where {
    type Output = Where;

    fn bitor(self, rhs: Where) -> Where {
        self.or(rhs)
    }
}

impl fmt::Display for Where {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expr)
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// An ORDER BY list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderBy {
    terms: Vec<(String, Direction)>,
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self::default().then_asc(column)
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self::default().then_desc(column)
    }

    pub fn then_asc(mut self, column: impl Into<String>) -> Self {
        self.terms.push((column.into(), Direction::Asc));
        self
    }

    pub fn then_desc(mut self, column: impl Into<String>) -> Self {
        self.terms.push((column.into(), Direction::Desc));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Appends another ORDER BY's terms after this one's.
    pub fn extend(&mut self, other: &OrderBy) {
        self.terms.extend(other.terms.iter().cloned());
    }

    pub fn to_sql(&self) -> String {
        let terms: Vec<String> = self
            .terms
            .iter()
            .map(|(column, dir)| match dir {
                Direction::Asc => column.clone(),
                Direction::Desc => format!("{column} DESC"),
            })
            .collect();
        format!("ORDER BY {}", terms.join(", "))
    }
}

/// Anything that can follow the FROM list of a SELECT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    Where(Where),
    OrderBy(OrderBy),
    Limit(u64),
    Offset(u64),
}

impl From<Where> for Clause {
    fn from(w: Where) -> Self {
        Clause::Where(w)
    }
}

impl From<OrderBy> for Clause {
    fn from(o: OrderBy) -> Self {
        Clause::OrderBy(o)
    }
}

/// The clauses of one query folded together.
///
/// Several WHERE clauses are ANDed in the order given, ORDER BY terms are
/// concatenated, and the last LIMIT / OFFSET wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Clauses {
    pub filter: Option<Where>,
    pub order_by: OrderBy,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Clauses {
    pub fn new(clauses: &[Clause]) -> Self {
        let mut out = Self::default();
        for clause in clauses {
            out.push(clause);
        }
        out
    }

    pub fn push(&mut self, clause: &Clause) {
        match clause {
            Clause::Where(w) => self.and_where(w.clone()),
            Clause::OrderBy(o) => self.order_by.extend(o),
            Clause::Limit(n) => self.limit = Some(*n),
            Clause::Offset(n) => self.offset = Some(*n),
        }
    }

    /// ANDs `condition` onto the current filter.
    pub fn and_where(&mut self, condition: Where) {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(condition),
            None => condition,
        });
    }

    /// Renders the clauses in SQL order, with a leading space when non-empty.
    pub fn to_sql(&self) -> String {
        let mut sql = String::new();
        if let Some(filter) = &self.filter {
            sql.push(' ');
            sql.push_str(&filter.to_sql());
        }
        if !self.order_by.is_empty() {
            sql.push(' ');
            sql.push_str(&self.order_by.to_sql());
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
        sql
    }
}
