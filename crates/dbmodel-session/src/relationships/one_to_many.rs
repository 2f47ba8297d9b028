use std::sync::Arc;

use dbmodel_core::{CachedRelation, Record, RecordClass, RelationshipId, Result};
use dbmodel_query::{Clause, ForeignKeyDef, KeyDef, Where};

use super::many_to_one::as_strs;
use super::{check_class, default_key_names};
use crate::datasource::DataSource;
use crate::results::Results;

/// The child rows whose foreign key points at the owner.
///
/// ```ignore
/// let cities = OneToMany::builder("cities", &country, &city).build()?;
/// let n = cities.of(&mut germany)?.len(&mut ds, &[])?;
/// cities.of(&mut germany)?.append(&mut ds, &mut hamburg)?;
/// ```
#[derive(Debug, Clone)]
pub struct OneToMany {
    id: RelationshipId,
    name: String,
    // mine: the owner's key; other: the child's foreign key.
    foreign_key: ForeignKeyDef,
}

impl OneToMany {
    pub fn builder(
        name: impl Into<String>,
        owner: &Arc<RecordClass>,
        child: &Arc<RecordClass>,
    ) -> OneToManyBuilder {
        OneToManyBuilder {
            name: name.into(),
            owner: Arc::clone(owner),
            child: Arc::clone(child),
            parent_key: None,
            child_key: None,
        }
    }

    pub fn id(&self) -> RelationshipId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> &Arc<RecordClass> {
        self.foreign_key.mine().class()
    }

    pub fn target(&self) -> &Arc<RecordClass> {
        self.foreign_key.other().class()
    }

    pub fn foreign_key(&self) -> &ForeignKeyDef {
        &self.foreign_key
    }

    /// The children of `parent`.
    pub fn of<'a>(&'a self, parent: &'a mut Record) -> Result<OneToManyView<'a>> {
        check_class(self.owner(), parent)?;
        Ok(OneToManyView {
            relationship: self,
            parent,
        })
    }
}

/// Builder for [`OneToMany`].
#[derive(Debug)]
pub struct OneToManyBuilder {
    name: String,
    owner: Arc<RecordClass>,
    child: Arc<RecordClass>,
    parent_key: Option<Vec<String>>,
    child_key: Option<Vec<String>>,
}

impl OneToManyBuilder {
    /// Owner attributes the children refer to; defaults to the owner's
    /// primary key.
    pub fn parent_key(mut self, attributes: &[&str]) -> Self {
        self.parent_key = Some(attributes.iter().map(|a| (*a).to_string()).collect());
        self
    }

    /// Child attributes holding the foreign key, in parent key order.
    ///
    /// Defaults to `<owner table>_<key column>` for each parent key column.
    pub fn child_key(mut self, attributes: &[&str]) -> Self {
        self.child_key = Some(attributes.iter().map(|a| (*a).to_string()).collect());
        self
    }

    pub fn build(self) -> Result<OneToMany> {
        let mine = match &self.parent_key {
            Some(names) => KeyDef::new(&self.owner, &as_strs(names))?,
            None => KeyDef::primary(&self.owner)?,
        };
        let child_names = self
            .child_key
            .unwrap_or_else(|| default_key_names(self.owner.table().name(), mine.columns()));
        let other = KeyDef::new(&self.child, &as_strs(&child_names))?;
        Ok(OneToMany {
            id: RelationshipId::next(),
            name: self.name,
            foreign_key: ForeignKeyDef::new(mine, other)?,
        })
    }
}

/// A [`OneToMany`] bound to one parent record.
#[derive(Debug)]
pub struct OneToManyView<'a> {
    relationship: &'a OneToMany,
    parent: &'a mut Record,
}

impl OneToManyView<'_> {
    fn child_filter(&self, ds: &DataSource) -> Result<Where> {
        self.relationship
            .foreign_key
            .bind(&*self.parent)?
            .other_where(ds.dialect())
    }

    fn with_filter(&self, ds: &DataSource, clauses: &[Clause]) -> Result<Vec<Clause>> {
        let mut all: Vec<Clause> = Vec::with_capacity(clauses.len() + 1);
        all.push(self.child_filter(ds)?.into());
        all.extend_from_slice(clauses);
        Ok(all)
    }

    /// Children matching the parent's key and `clauses`, fetched lazily.
    pub fn select(&self, ds: &mut DataSource, clauses: &[Clause]) -> Result<Results> {
        let clauses = self.with_filter(ds, clauses)?;
        ds.select(self.relationship.target(), &clauses)
    }

    /// Number of children. Counts the cache when the children have been
    /// loaded and no extra clauses are given, otherwise runs a COUNT.
    pub fn len(&self, ds: &mut DataSource, clauses: &[Clause]) -> Result<u64> {
        if clauses.is_empty() {
            if let Some(cached) = self.cached() {
                return Ok(cached.len() as u64);
            }
        }
        let clauses = self.with_filter(ds, clauses)?;
        ds.count(self.relationship.target(), &clauses)
    }

    /// Fetches all children and caches them on the parent.
    pub fn load(&mut self, ds: &mut DataSource) -> Result<&[Record]> {
        let children = self.select(ds, &[])?.all()?;
        let id = self.relationship.id;
        self.parent.cache_relation(id, CachedRelation::Many(children));
        Ok(self.cached().unwrap_or_default())
    }

    /// The children cached by [`OneToManyView::load`], if any.
    pub fn cached(&self) -> Option<&[Record]> {
        match self.parent.cached_relation(self.relationship.id) {
            Some(CachedRelation::Many(children)) => Some(children),
            _ => None,
        }
    }

    /// Points `child` at the parent and writes it immediately: an unstored
    /// child is inserted, a stored one updated.
    pub fn append(&mut self, ds: &mut DataSource, child: &mut Record) -> Result<()> {
        let rel = self.relationship;
        check_class(rel.target(), child)?;
        let values = rel.foreign_key.mine().bind(&*self.parent)?.values()?;

        let mut updated = child.clone();
        for (binding, value) in rel.foreign_key.other().bindings().zip(values) {
            binding.set(&mut updated, value)?;
        }
        *child = updated;

        if child.is_stored() {
            ds.update(child)?;
        } else {
            ds.insert(child)?;
        }
        self.parent.invalidate_relation(rel.id);
        Ok(())
    }

    /// Drops the cached children.
    pub fn invalidate(&mut self) {
        self.parent.invalidate_relation(self.relationship.id);
    }
}
