//! Records: per-instance slot storage, dirty tracking and relationship caches.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::binding::Binding;
use crate::binding_set::BindingSet;
use crate::class::RecordClass;
use crate::connection::Row;
use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::relationship::RelationshipId;
use crate::value::Value;

/// A resolved relationship cached on its owning record.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedRelation {
    /// Many-to-one target; `None` when the foreign key is NULL.
    One(Option<Box<Record>>),
    /// Materialized one-to-many or many-to-many children.
    Many(Vec<Record>),
}

/// One row's worth of data for a [`RecordClass`].
///
/// A slot is `None` while its binding is unset and `Some(Value::Null)` once
/// NULL has been assigned or fetched. The dirty set holds the bindings
/// assigned since the record was last inserted, flushed or hydrated.
#[derive(Clone)]
pub struct Record {
    class: Arc<RecordClass>,
    slots: Vec<Option<Value>>,
    dirty: BindingSet,
    stored: bool,
    persisted_key: Option<Vec<Value>>,
    relations: HashMap<RelationshipId, CachedRelation>,
}

impl Record {
    /// An empty record; every binding is unset.
    pub fn new(class: &Arc<RecordClass>) -> Self {
        let len = class.bindings().len();
        Self {
            class: Arc::clone(class),
            slots: vec![None; len],
            dirty: BindingSet::empty(len),
            stored: false,
            persisted_key: None,
            relations: HashMap::new(),
        }
    }

    /// A new record with the given attributes assigned (and validated).
    pub fn with_values<I, K>(class: &Arc<RecordClass>, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let mut record = Self::new(class);
        for (name, value) in values {
            record.set(name.as_ref(), value)?;
        }
        Ok(record)
    }

    /// Builds a stored record from a row whose columns line up with the
    /// class's [select bindings](RecordClass::select_bindings).
    pub fn hydrate(class: &Arc<RecordClass>, row: &Row) -> Result<Self> {
        let expected = class.select_bindings().count();
        if row.len() != expected {
            return Err(Error::InvalidValue(format!(
                "a {} row has {expected} columns, got {}",
                class.name(),
                row.len()
            )));
        }
        let mut record = Self::new(class);
        for (binding, raw) in class.select_bindings().zip(row.values()) {
            binding.set_from_result(&mut record, raw.clone())?;
        }
        record.mark_stored();
        Ok(record)
    }

    pub fn class(&self) -> &Arc<RecordClass> {
        &self.class
    }

    pub fn get(&self, attribute: &str) -> Result<&Value> {
        self.class.binding(attribute)?.get(self)
    }

    pub fn set(&mut self, attribute: &str, value: impl Into<Value>) -> Result<()> {
        let binding = Arc::clone(self.class.binding(attribute)?);
        binding.set(self, value)
    }

    pub fn is_set(&self, attribute: &str) -> bool {
        self.class
            .find_binding(attribute)
            .is_some_and(|b| b.is_set(self))
    }

    pub fn sql_literal(&self, attribute: &str, dialect: Dialect) -> Result<String> {
        self.class.binding(attribute)?.sql_literal(self, dialect)
    }

    pub fn set_from_result(&mut self, attribute: &str, raw: Value) -> Result<()> {
        let binding = Arc::clone(self.class.binding(attribute)?);
        binding.set_from_result(self, raw)
    }

    /// Raw slot access by binding index; `None` while unset.
    pub fn slot(&self, index: usize) -> Option<&Value> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub(crate) fn store(&mut self, index: usize, value: Value, dirty: bool) {
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = Some(value);
            if dirty {
                self.dirty.insert(index);
            } else {
                self.dirty.remove(index);
            }
        }
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Bindings assigned since the last insert or flush, in slot order.
    pub fn dirty_bindings(&self) -> impl Iterator<Item = &Arc<Binding>> {
        self.dirty.iter().map(|idx| &self.class.bindings()[idx])
    }

    pub fn clear_dirty(&mut self) {
        self.dirty.clear();
    }

    /// True once the record exists in the database.
    pub fn is_stored(&self) -> bool {
        self.stored
    }

    /// Marks the record as persisted: the dirty set is cleared and the
    /// current primary key values become the key used to address the row.
    ///
    /// Called by the data source after INSERT, UPDATE and hydration.
    pub fn mark_stored(&mut self) {
        self.stored = true;
        self.dirty.clear();
        self.persisted_key = self.current_key_values();
    }

    /// Marks the record as no longer persisted, e.g. after DELETE.
    pub fn mark_unstored(&mut self) {
        self.stored = false;
        self.persisted_key = None;
        self.relations.clear();
    }

    /// Primary key values of the stored row, as of the last insert, flush or
    /// hydration.
    pub fn persisted_key(&self) -> Option<&[Value]> {
        self.persisted_key.as_deref()
    }

    fn current_key_values(&self) -> Option<Vec<Value>> {
        let key = self.class.primary_key().ok()?;
        key.iter().map(|b| self.slot(b.index()).cloned()).collect()
    }

    pub fn cached_relation(&self, id: RelationshipId) -> Option<&CachedRelation> {
        self.relations.get(&id)
    }

    pub fn cache_relation(&mut self, id: RelationshipId, relation: CachedRelation) {
        self.relations.insert(id, relation);
    }

    pub fn invalidate_relation(&mut self, id: RelationshipId) {
        self.relations.remove(&id);
    }

    /// Assigned attributes as a JSON object keyed by attribute name.
    ///
    /// Unset bindings are left out; client-side defaults are not filled in.
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .class
            .bindings()
            .iter()
            .filter_map(|b| {
                self.slot(b.index())
                    .map(|v| (b.name().to_string(), v.to_json()))
            })
            .collect();
        serde_json::Value::Object(map)
    }
}

impl PartialEq for Record {
    /// Same class and same slot contents. Storage state is not compared.
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.class, &other.class) && self.slots == other.slots
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.class.name());
        for binding in self.class.bindings() {
            match self.slot(binding.index()) {
                Some(value) => s.field(binding.name(), value),
                None => s.field(binding.name(), &format_args!("<unset>")),
            };
        }
        s.field("stored", &self.stored).finish()
    }
}
