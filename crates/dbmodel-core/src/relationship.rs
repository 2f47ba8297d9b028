//! Relationship metadata shared by the resolvers.
//!
//! The resolvers themselves (many-to-one, one-to-many, many-to-many) live in
//! `dbmodel-session` because they issue queries. This module holds what a
//! record needs to know about them: an identity to key its relationship
//! cache by, the kind, and the link table description for many-to-many.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::class::TableName;

/// The type of relationship between two record classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationshipKind {
    /// Many `city` rows point at one `country`.
    ManyToOne,
    /// One `country` has many `city` rows pointing at it.
    OneToMany,
    /// `person` rows and `tag` rows paired through a link table.
    ManyToMany,
}

/// Process-unique identity of a declared relationship.
///
/// Records key their relationship caches by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelationshipId(u64);

impl RelationshipId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A many-to-many link table: one column group per side.
///
/// `parent_columns` pair up with the parent class's key, `child_columns`
/// with the child class's key, both in key order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTable {
    table: TableName,
    parent_columns: Vec<String>,
    child_columns: Vec<String>,
}

impl LinkTable {
    pub fn new(table: TableName, parent_columns: Vec<String>, child_columns: Vec<String>) -> Self {
        Self {
            table,
            parent_columns,
            child_columns,
        }
    }

    pub fn table(&self) -> &TableName {
        &self.table
    }

    pub fn parent_columns(&self) -> &[String] {
        &self.parent_columns
    }

    pub fn child_columns(&self) -> &[String] {
        &self.child_columns
    }

    /// The same link table seen from the other side.
    pub fn reversed(&self) -> Self {
        Self {
            table: self.table.clone(),
            parent_columns: self.child_columns.clone(),
            child_columns: self.parent_columns.clone(),
        }
    }
}
