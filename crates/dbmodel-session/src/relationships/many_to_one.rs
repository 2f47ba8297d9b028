use std::sync::Arc;

use dbmodel_core::{CachedRelation, Error, Record, RecordClass, RelationshipId, Result, Value};
use dbmodel_query::{ForeignKeyDef, KeyDef};

use super::{check_class, default_key_names};
use crate::datasource::DataSource;

/// A foreign key on the owner pointing at one row of the target class.
///
/// ```ignore
/// let country = ManyToOne::builder("country", &city, &country_class).build()?;
/// let berlin_country = country.get(&mut ds, &mut berlin)?;
/// country.set(&mut berlin, Some(&germany))?;
/// ```
#[derive(Debug, Clone)]
pub struct ManyToOne {
    id: RelationshipId,
    name: String,
    foreign_key: ForeignKeyDef,
    cache: bool,
}

impl ManyToOne {
    pub fn builder(
        name: impl Into<String>,
        owner: &Arc<RecordClass>,
        target: &Arc<RecordClass>,
    ) -> ManyToOneBuilder {
        ManyToOneBuilder {
            name: name.into(),
            owner: Arc::clone(owner),
            target: Arc::clone(target),
            foreign_key: None,
            target_key: None,
            cache: true,
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

    /// Owner attributes (mine) paired with target attributes (other).
    pub fn foreign_key(&self) -> &ForeignKeyDef {
        &self.foreign_key
    }

    pub fn caches(&self) -> bool {
        self.cache
    }

    /// The target of `record`, or `None` when its foreign key is unset or
    /// NULL.
    ///
    /// Issues one SELECT unless a cached result is available. A foreign key
    /// that is only partly NULL is an [`Error::IllegalForeignKey`].
    pub fn get(&self, ds: &mut DataSource, record: &mut Record) -> Result<Option<Record>> {
        check_class(self.owner(), record)?;
        if self.cache {
            if let Some(CachedRelation::One(cached)) = record.cached_relation(self.id) {
                return Ok(cached.as_deref().cloned());
            }
        }

        let target = self.resolve(ds, record)?;
        if self.cache {
            record.cache_relation(self.id, CachedRelation::One(target.clone().map(Box::new)));
        }
        Ok(target)
    }

    fn resolve(&self, ds: &mut DataSource, record: &Record) -> Result<Option<Record>> {
        let missing: Vec<bool> = self
            .foreign_key
            .mine()
            .bindings()
            .map(|b| record.slot(b.index()).is_none_or(Value::is_null))
            .collect();
        if missing.iter().all(|m| *m) {
            return Ok(None);
        }
        if missing.iter().any(|m| *m) {
            return Err(Error::IllegalForeignKey(format!(
                "{}.{}: foreign key ({}) is partly NULL",
                record.class().name(),
                self.name,
                self.foreign_key.mine().attribute_names().join(", ")
            )));
        }

        let filter = self.foreign_key.bind(record)?.other_where(ds.dialect())?;
        tracing::debug!(relationship = %self.name, %filter, "resolving many-to-one");
        ds.select_one(self.target(), &[filter.into()])
    }

    /// Points `record` at `target` by copying the target's key into the
    /// foreign key attributes, which become dirty. `None` sets them to NULL.
    ///
    /// Nothing is written to the database; flush the record to persist the
    /// change. A target of the wrong class is rejected before anything else
    /// happens.
    pub fn set(&self, record: &mut Record, target: Option<&Record>) -> Result<()> {
        check_class(self.owner(), record)?;
        let values = match target {
            Some(target) => {
                check_class(self.target(), target)?;
                self.foreign_key.other().bind(target)?.values()?
            }
            None => vec![Value::Null; self.foreign_key.mine().len()],
        };

        let mut updated = record.clone();
        for (binding, value) in self.foreign_key.mine().bindings().zip(values) {
            binding.set(&mut updated, value)?;
        }
        *record = updated;

        match target {
            Some(target) if self.cache => record.cache_relation(
                self.id,
                CachedRelation::One(Some(Box::new(target.clone()))),
            ),
            _ => record.invalidate_relation(self.id),
        }
        Ok(())
    }
}

/// Builder for [`ManyToOne`].
#[derive(Debug)]
pub struct ManyToOneBuilder {
    name: String,
    owner: Arc<RecordClass>,
    target: Arc<RecordClass>,
    foreign_key: Option<Vec<String>>,
    target_key: Option<Vec<String>>,
    cache: bool,
}

impl ManyToOneBuilder {
    /// Owner attributes holding the foreign key, in target key order.
    ///
    /// Defaults to `<target table>_<key column>` for each target key column.
    pub fn foreign_key(mut self, attributes: &[&str]) -> Self {
        self.foreign_key = Some(attributes.iter().map(|a| (*a).to_string()).collect());
        self
    }

    /// Target attributes the foreign key refers to; defaults to the target's
    /// primary key.
    pub fn target_key(mut self, attributes: &[&str]) -> Self {
        self.target_key = Some(attributes.iter().map(|a| (*a).to_string()).collect());
        self
    }

    /// With `false`, every [`ManyToOne::get`] queries the database.
    pub fn cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    /// Checks arity and datatypes of the key pair.
    pub fn build(self) -> Result<ManyToOne> {
        let other = match &self.target_key {
            Some(names) => KeyDef::new(&self.target, &as_strs(names))?,
            None => KeyDef::primary(&self.target)?,
        };
        let mine_names = self.foreign_key.unwrap_or_else(|| {
            default_key_names(self.target.table().name(), other.columns())
        });
        let mine = KeyDef::new(&self.owner, &as_strs(&mine_names))?;
        Ok(ManyToOne {
            id: RelationshipId::next(),
            name: self.name,
            foreign_key: ForeignKeyDef::new(mine, other)?,
            cache: self.cache,
        })
    }
}

pub(crate) fn as_strs(names: &[String]) -> Vec<&str> {
    names.iter().map(String::as_str).collect()
}
