//! SQL clause builder and key algebra for dbmodel.
//!
//! `dbmodel-query` turns records and record classes into SQL text:
//!
//! - [`clause`]: WHERE / ORDER BY / LIMIT / OFFSET composition.
//! - [`statement`]: SELECT, INSERT, UPDATE and DELETE builders.
//! - [`key`]: primary and foreign keys, their values and WHERE clauses.
//!
//! Literals and identifiers are rendered by [`dbmodel_core::Dialect`]; this
//! crate only assembles them.

pub mod clause;
pub mod key;
pub mod statement;

pub use clause::{Clause, Clauses, Direction, OrderBy, Where};
pub use key::{ForeignKey, ForeignKeyDef, Key, KeyDef, key_where};
pub use statement::{Delete, Insert, Select, Update, column_ref};
