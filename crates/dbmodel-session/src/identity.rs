//! Identity strategies: how a backend-generated key value reaches the record.
//!
//! Dialects differ in how a new row's identity becomes known:
//!
//! - **Pre-fetch** (Postgres, Firebird): the next value is pulled from a
//!   sequence or generator before the INSERT and written like any other
//!   column. Safe with concurrent writers.
//! - **Post-insert** (MySQL, SQLite): the INSERT omits the column and the
//!   row is read back through `LAST_INSERT_ID()` or `last_insert_rowid()`.
//!   Only valid on the same connection, right after the INSERT.
//!
//! [`DataSource::insert`](crate::DataSource::insert) asks its strategy for
//! an [`IdentityPlan`] per unset identity binding and carries it out, so the
//! insert algorithm itself has no per-dialect branches.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use dbmodel_core::{Binding, Dialect, Error, IdentityRetrieval, RecordClass, Result, Value};

/// What the data source does for one unset identity binding.
#[derive(Debug, Clone, PartialEq)]
pub enum IdentityPlan {
    /// Assign this value before the INSERT.
    Assign(Value),
    /// Run this one-row, one-column query before the INSERT and assign its
    /// result.
    Prefetch(String),
    /// Leave the column out of the INSERT; afterwards the row is selected
    /// with `column = <expression>`.
    AfterInsert(String),
}

/// Chooses an [`IdentityPlan`] for an identity binding about to be inserted.
pub trait IdentityStrategy: fmt::Debug {
    fn plan(&self, dialect: Dialect, class: &RecordClass, binding: &Binding) -> Result<IdentityPlan>;
}

/// Sequence or generator feeding `binding`: the declared one, or the
/// dialect's naming convention.
pub fn sequence_name(dialect: Dialect, class: &RecordClass, binding: &Binding) -> String {
    binding
        .identity_info()
        .and_then(|identity| identity.sequence())
        .map_or_else(
            || dialect.default_sequence_name(class.table().name(), binding.column_name()),
            str::to_string,
        )
}

fn unavailable(class: &RecordClass, binding: &Binding) -> Error {
    Error::IdentityUnavailable {
        class: class.name().to_string(),
        attribute: binding.name().to_string(),
    }
}

/// Pulls the next value from a sequence before the INSERT.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrefetchSequence;

impl IdentityStrategy for PrefetchSequence {
    fn plan(&self, dialect: Dialect, class: &RecordClass, binding: &Binding) -> Result<IdentityPlan> {
        let sequence = sequence_name(dialect, class, binding);
        dialect
            .next_value_query(&sequence)
            .map(IdentityPlan::Prefetch)
            .ok_or_else(|| unavailable(class, binding))
    }
}

/// Reads the generated value back after the INSERT.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostInsertQuery;

impl IdentityStrategy for PostInsertQuery {
    fn plan(&self, dialect: Dialect, class: &RecordClass, binding: &Binding) -> Result<IdentityPlan> {
        let sequence = sequence_name(dialect, class, binding);
        dialect
            .last_identity_expression(&sequence)
            .map(IdentityPlan::AfterInsert)
            .ok_or_else(|| unavailable(class, binding))
    }
}

/// For backends that cannot generate identities; identity columns must be
/// assigned explicitly.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIdentity;

impl IdentityStrategy for NoIdentity {
    fn plan(&self, _dialect: Dialect, class: &RecordClass, binding: &Binding) -> Result<IdentityPlan> {
        Err(unavailable(class, binding))
    }
}

/// Hands out consecutive integers without asking the backend.
///
/// Useful with backends that have no identity support, and in tests.
#[derive(Debug)]
pub struct LocalCounter {
    next: AtomicI64,
}

impl LocalCounter {
    pub fn starting_at(first: i64) -> Self {
        Self {
            next: AtomicI64::new(first),
        }
    }
}

impl Default for LocalCounter {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl IdentityStrategy for LocalCounter {
    fn plan(&self, _dialect: Dialect, _class: &RecordClass, _binding: &Binding) -> Result<IdentityPlan> {
        Ok(IdentityPlan::Assign(Value::BigInt(
            self.next.fetch_add(1, Ordering::Relaxed),
        )))
    }
}

/// The strategy a data source uses for `dialect` unless told otherwise.
pub fn default_strategy(dialect: Dialect) -> Box<dyn IdentityStrategy> {
    match dialect.identity_retrieval() {
        IdentityRetrieval::PrefetchSequence => Box::new(PrefetchSequence),
        IdentityRetrieval::PostInsertQuery => Box::new(PostInsertQuery),
        IdentityRetrieval::Unsupported => Box::new(NoIdentity),
    }
}
