//! dbmodel: a lightweight, backend-agnostic object/relational mapper.
//!
//! Declare record classes as bindings from fields to columns, then insert,
//! select, update and delete records through a [`DataSource`]. Records know
//! which attributes changed, so a flush writes only dirty columns. Relations
//! between tables are declared as [`ManyToOne`], [`OneToMany`] and
//! [`ManyToMany`] resolvers.
//!
//! This crate is a facade over the workspace crates:
//!
//! - `dbmodel-core`: records, bindings, values, dialects, errors and the
//!   backend [`Connection`] contract.
//! - `dbmodel-query`: keys, WHERE clauses and statement builders.
//! - `dbmodel-session`: the data source, identity strategies and
//!   relationship resolvers.
//! - `dbmodel-sqlite` (feature `sqlite`): a SQLite backend.
//!
//! # Example
//!
//! ```ignore
//! use dbmodel::prelude::*;
//!
//! let person = RecordClass::builder("person")
//!     .field(Binding::serial("id"))
//!     .field(Binding::text("firstname").not_null())
//!     .field(Binding::integer("height"))
//!     .build()?;
//!
//! let config = DataSourceConfig::parse("adapter=sqlite db=:memory:")?;
//! let mut ds = DataSource::with_config(SqliteConnection::from_config(&config)?, config);
//!
//! let mut diedrich = Record::with_values(&person, [("firstname", "Diedrich".into())])?;
//! ds.insert(&mut diedrich)?;
//!
//! diedrich.set("height", 187)?;
//! ds.flush_updates([&mut diedrich])?;
//! ds.commit()?;
//! ```

pub use dbmodel_core::{
    Binding, BufferedCursor, CachedRelation, Connection, Cursor, Dialect, Error, Identity,
    IdentityRetrieval, LinkTable, Loading, MaxLength, NotEmpty, NotNull, Pattern, Predicate,
    PropertyGroup, Range, Record, RecordClass, RecordClassBuilder, RelationshipId,
    RelationshipKind, Result, Row, SqlType, TableName, ValidationError, Validator, Value,
};
pub use dbmodel_query::{
    Clause, Delete, Direction, ForeignKey, ForeignKeyDef, Insert, Key, KeyDef, OrderBy, Select,
    Update, Where,
};
pub use dbmodel_session::{
    DataSource, DataSourceConfig, IdentityPlan, IdentityStrategy, LocalCounter, ManyToMany,
    ManyToManyView, ManyToOne, NoIdentity, OneToMany, OneToManyView, PostInsertQuery,
    PrefetchSequence, Relationship, Results, Schema, SqlLog,
};

#[cfg(feature = "sqlite")]
pub use dbmodel_sqlite::SqliteConnection;

/// Everything needed to declare classes and work with a data source.
pub mod prelude {
    pub use dbmodel_core::{
        Binding, Connection, Dialect, Error, PropertyGroup, Record, RecordClass, Result, SqlType,
        Value,
    };
    pub use dbmodel_query::{Clause, KeyDef, OrderBy, Select, Where};
    pub use dbmodel_session::{
        DataSource, DataSourceConfig, ManyToMany, ManyToOne, OneToMany, Relationship, Schema,
    };

    #[cfg(feature = "sqlite")]
    pub use dbmodel_sqlite::SqliteConnection;
}
