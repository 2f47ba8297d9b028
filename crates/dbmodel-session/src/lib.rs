//! Record lifecycle and relationships for dbmodel.
//!
//! `dbmodel-session` turns record operations into SQL and runs them on a
//! backend [`Connection`](dbmodel_core::Connection).
//!
//! # Design Philosophy
//!
//! - **Caller owns records**: the [`DataSource`] never tracks live objects;
//!   records to flush are passed in explicitly.
//! - **Immediate writes**: relationship mutations (append, unlink) execute
//!   right away; only plain attribute changes wait for a flush.
//! - **One insert algorithm**: backend differences in identity generation
//!   live behind the [`IdentityStrategy`] trait.
//! - **Observable SQL**: every statement is emitted as a `tracing` event and
//!   kept in a bounded [`SqlLog`].
//!
//! # Example
//!
//! ```ignore
//! let mut ds = DataSource::new(connection);
//!
//! // INSERT, pre-fetching or reading back the identity as the dialect needs
//! ds.insert(&mut person)?;
//!
//! // Assign and flush: one UPDATE with only the dirty columns
//! person.set("height", 187)?;
//! ds.flush_updates([&mut person])?;
//!
//! // Relationships resolve through the data source
//! let tags = ManyToMany::builder("tags", &person_class, &tag_class).build()?;
//! tags.of(&mut person)?.append(&mut ds, &mut tag)?;
//!
//! ds.commit()?;
//! ```

pub mod config;
pub mod datasource;
pub mod identity;
pub mod relationships;
pub mod results;
pub mod schema;
pub mod sql_log;

#[cfg(test)]
mod mock;

pub use config::{DEFAULT_LOG_CAPACITY, DataSourceConfig};
pub use datasource::DataSource;
pub use identity::{
    IdentityPlan, IdentityStrategy, LocalCounter, NoIdentity, PostInsertQuery, PrefetchSequence,
    default_strategy,
};
pub use relationships::{
    ManyToMany, ManyToManyBuilder, ManyToManyView, ManyToOne, ManyToOneBuilder, OneToMany,
    OneToManyBuilder, OneToManyView, Relationship,
};
pub use results::Results;
pub use schema::Schema;
pub use sql_log::SqlLog;
