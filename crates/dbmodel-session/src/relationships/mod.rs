//! Relationship resolvers.
//!
//! A relationship is declared once, between two record classes, and then
//! resolved per owning record:
//!
//! - [`ManyToOne`]: a foreign key on the owner pointing at one target row.
//! - [`OneToMany`]: the child rows whose foreign key points at the owner.
//! - [`ManyToMany`]: rows of the target paired with the owner through a link
//!   table, with [`ManyToMany::reverse`] producing the other side.
//!
//! Resolved targets are cached on the owning record, keyed by the
//! relationship's [`RelationshipId`]. Mutations write through to the
//! database immediately and invalidate the cache. A failed query leaves
//! the cache untouched.
//!
//! The [`Relationship`] enum wraps the three kinds for registries such as
//! [`Schema`](crate::Schema).

mod many_to_many;
mod many_to_one;
mod one_to_many;

use std::sync::Arc;

use dbmodel_core::{Error, Record, RecordClass, RelationshipId, RelationshipKind, Result};

pub use many_to_many::{ManyToMany, ManyToManyBuilder, ManyToManyView};
pub use many_to_one::{ManyToOne, ManyToOneBuilder};
pub use one_to_many::{OneToMany, OneToManyBuilder, OneToManyView};

/// Any declared relationship.
#[derive(Debug, Clone)]
pub enum Relationship {
    ManyToOne(ManyToOne),
    OneToMany(OneToMany),
    ManyToMany(ManyToMany),
}

impl Relationship {
    pub fn kind(&self) -> RelationshipKind {
        match self {
            Relationship::ManyToOne(_) => RelationshipKind::ManyToOne,
            Relationship::OneToMany(_) => RelationshipKind::OneToMany,
            Relationship::ManyToMany(_) => RelationshipKind::ManyToMany,
        }
    }

    pub fn id(&self) -> RelationshipId {
        match self {
            Relationship::ManyToOne(r) => r.id(),
            Relationship::OneToMany(r) => r.id(),
            Relationship::ManyToMany(r) => r.id(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Relationship::ManyToOne(r) => r.name(),
            Relationship::OneToMany(r) => r.name(),
            Relationship::ManyToMany(r) => r.name(),
        }
    }

    /// The class the relationship is declared on.
    pub fn owner(&self) -> &Arc<RecordClass> {
        match self {
            Relationship::ManyToOne(r) => r.owner(),
            Relationship::OneToMany(r) => r.owner(),
            Relationship::ManyToMany(r) => r.owner(),
        }
    }

    /// The class of the related records.
    pub fn target(&self) -> &Arc<RecordClass> {
        match self {
            Relationship::ManyToOne(r) => r.target(),
            Relationship::OneToMany(r) => r.target(),
            Relationship::ManyToMany(r) => r.target(),
        }
    }

    pub fn as_many_to_one(&self) -> Option<&ManyToOne> {
        match self {
            Relationship::ManyToOne(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_one_to_many(&self) -> Option<&OneToMany> {
        match self {
            Relationship::OneToMany(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_many_to_many(&self) -> Option<&ManyToMany> {
        match self {
            Relationship::ManyToMany(r) => Some(r),
            _ => None,
        }
    }
}

impl From<ManyToOne> for Relationship {
    fn from(r: ManyToOne) -> Self {
        Relationship::ManyToOne(r)
    }
}

impl From<OneToMany> for Relationship {
    fn from(r: OneToMany) -> Self {
        Relationship::OneToMany(r)
    }
}

impl From<ManyToMany> for Relationship {
    fn from(r: ManyToMany) -> Self {
        Relationship::ManyToMany(r)
    }
}

/// Fails with [`Error::WrongClass`] unless `record` is a `expected` (or a
/// subclass of it).
pub(crate) fn check_class(expected: &Arc<RecordClass>, record: &Record) -> Result<()> {
    if record.class().is_subclass_of(expected) {
        Ok(())
    } else {
        Err(Error::WrongClass {
            expected: expected.name().to_string(),
            found: record.class().name().to_string(),
        })
    }
}

/// Conventional foreign key names: `<table>_<column>` for each column.
pub(crate) fn default_key_names<'a>(
    table: &str,
    columns: impl IntoIterator<Item = &'a str>,
) -> Vec<String> {
    columns
        .into_iter()
        .map(|column| format!("{table}_{column}"))
        .collect()
}
