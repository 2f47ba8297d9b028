//! Core types for dbmodel.
//!
//! `dbmodel-core` is the **foundation layer** of the engine. It defines the
//! record model (classes, bindings, records), the value and datatype system,
//! dialect-aware literal rendering, validators, the error taxonomy and the
//! backend contract.
//!
//! # Role In The Architecture
//!
//! - **Record model**: [`RecordClass`] describes a table; [`Binding`] maps a
//!   field to a column; [`Record`] holds one row's values in slots indexed
//!   by binding, plus its dirty set. [`PropertyGroup`] spreads one
//!   attribute over several columns, e.g. one per language.
//! - **Values**: [`Value`] and [`SqlType`] with strict assignment conversion
//!   and lenient hydration conversion.
//! - **Dialects**: [`Dialect`] turns values into SQL literals and knows how
//!   each backend produces identity values.
//! - **Backend contract**: [`Connection`], [`Cursor`] and [`Row`].
//!
//! # Who Uses This Crate
//!
//! - `dbmodel-query` builds clauses, statements and keys from records.
//! - `dbmodel-session` runs the record lifecycle and relationship resolvers.
//! - Backends such as `dbmodel-sqlite` implement [`Connection`].
//!
//! Most applications use the `dbmodel` facade instead of depending on this
//! crate directly.

pub mod binding;
pub mod binding_set;
pub mod class;
pub mod connection;
pub mod dialect;
pub mod error;
pub mod property_group;
pub mod record;
pub mod relationship;
pub mod types;
pub mod validate;
pub mod value;

pub use binding::{Binding, Identity, Loading};
pub use binding_set::BindingSet;
pub use class::{RecordClass, RecordClassBuilder, TableName};
pub use connection::{BufferedCursor, Connection, Cursor, Row};
pub use dialect::{Dialect, IdentityRetrieval};
pub use error::{Error, Result, ValidationError};
pub use property_group::PropertyGroup;
pub use record::{CachedRelation, Record};
pub use relationship::{LinkTable, RelationshipId, RelationshipKind};
pub use types::SqlType;
pub use validate::{
    MaxLength, NotEmpty, NotNull, Pattern, Predicate, Range, Validator, matches_pattern,
    validate_pattern,
};
pub use value::Value;
