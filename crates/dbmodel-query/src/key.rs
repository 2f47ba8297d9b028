//! Key algebra: primary keys, foreign keys and their WHERE clauses.
//!
//! A [`KeyDef`] is the shape of a key (a class plus an ordered list of its
//! bindings). Binding it to a record yields a [`Key`], which can report
//! whether it is set, extract its values and render
//! `col1 = lit1 AND col2 = lit2` in declaration order. A [`ForeignKeyDef`]
//! pairs a key on one class with a key on another class.

use std::sync::Arc;

use dbmodel_core::{Binding, Dialect, Error, Record, RecordClass, Result, SqlType, TableName, Value};

use crate::clause::Where;
use crate::statement::column_ref;

/// Renders `c1 = l1 AND c2 = l2 ...` from parallel column and literal lists.
pub fn key_where<S: AsRef<str>>(
    dialect: Dialect,
    qualifier: Option<&TableName>,
    columns: &[S],
    literals: &[String],
) -> Option<Where> {
    Where::all(
        columns
            .iter()
            .zip(literals)
            .map(|(column, literal)| Where::eq(column_ref(dialect, qualifier, column.as_ref()), literal)),
    )
}

/// The shape of a key: an ordered, non-empty list of bindings of one class.
#[derive(Debug, Clone)]
pub struct KeyDef {
    class: Arc<RecordClass>,
    indices: Vec<usize>,
}

impl KeyDef {
    /// The primary key of `class`.
    pub fn primary(class: &Arc<RecordClass>) -> Result<Self> {
        let indices = class.primary_key()?.iter().map(|b| b.index()).collect();
        Ok(Self {
            class: Arc::clone(class),
            indices,
        })
    }

    /// A key over the named attributes of `class`, in the given order.
    pub fn new(class: &Arc<RecordClass>, attributes: &[&str]) -> Result<Self> {
        if attributes.is_empty() {
            return Err(Error::IllegalPrimaryKey(format!(
                "a key on {} needs at least one attribute",
                class.name()
            )));
        }
        let indices = class
            .bindings_named(attributes)?
            .iter()
            .map(|b| b.index())
            .collect();
        Ok(Self {
            class: Arc::clone(class),
            indices,
        })
    }

    pub fn class(&self) -> &Arc<RecordClass> {
        &self.class
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn bindings(&self) -> impl Iterator<Item = &Arc<Binding>> {
        self.indices.iter().map(|idx| &self.class.bindings()[*idx])
    }

    pub fn attribute_names(&self) -> Vec<&str> {
        self.bindings().map(|b| b.name()).collect()
    }

    pub fn columns(&self) -> Vec<&str> {
        self.bindings().map(|b| b.column_name()).collect()
    }

    pub fn sql_types(&self) -> Vec<SqlType> {
        self.bindings().map(|b| b.sql_type()).collect()
    }

    /// Binds the key to a record of this class (or a subclass).
    pub fn bind<'r>(&self, record: &'r Record) -> Result<Key<'r>> {
        if !record.class().is_subclass_of(&self.class) {
            return Err(Error::WrongClass {
                expected: self.class.name().to_string(),
                found: record.class().name().to_string(),
            });
        }
        Ok(Key {
            def: self.clone(),
            record,
        })
    }

    /// Literals for raw key values, converted through each binding's datatype.
    pub fn literals_for(&self, values: &[Value], dialect: Dialect) -> Result<Vec<String>> {
        if values.len() != self.len() {
            return Err(Error::IllegalPrimaryKey(format!(
                "key ({}) of {} has {} columns, got {} values",
                self.attribute_names().join(", "),
                self.class.name(),
                self.len(),
                values.len()
            )));
        }
        self.bindings()
            .zip(values)
            .map(|(binding, value)| {
                binding
                    .sql_type()
                    .convert(value.clone())
                    .map(|v| dialect.literal(&v))
                    .map_err(|rejected| Error::Conversion {
                        class: self.class.name().to_string(),
                        attribute: binding.name().to_string(),
                        expected: binding.sql_type(),
                        found: rejected.type_name(),
                    })
            })
            .collect()
    }

    /// WHERE clause matching raw key values, without needing a record.
    pub fn where_for(
        &self,
        values: &[Value],
        dialect: Dialect,
        qualifier: Option<&TableName>,
    ) -> Result<Where> {
        let literals = self.literals_for(values, dialect)?;
        key_where(dialect, qualifier, &self.columns(), &literals)
            .ok_or_else(|| Error::IllegalPrimaryKey(format!("empty key on {}", self.class.name())))
    }
}

/// A key bound to one record.
#[derive(Debug, Clone)]
pub struct Key<'r> {
    def: KeyDef,
    record: &'r Record,
}

impl<'r> Key<'r> {
    /// The primary key of `record`.
    pub fn primary(record: &'r Record) -> Result<Self> {
        KeyDef::primary(record.class())?.bind(record)
    }

    /// A key over the named attributes of `record`.
    pub fn of(record: &'r Record, attributes: &[&str]) -> Result<Self> {
        KeyDef::new(record.class(), attributes)?.bind(record)
    }

    pub fn def(&self) -> &KeyDef {
        &self.def
    }

    pub fn record(&self) -> &'r Record {
        self.record
    }

    pub fn columns(&self) -> Vec<&str> {
        self.def.columns()
    }

    /// True iff every constituent binding holds a value (NULL counts).
    pub fn is_set(&self) -> bool {
        self.def.bindings().all(|b| self.record.slot(b.index()).is_some())
    }

    fn not_set(&self) -> Error {
        Error::KeyNotSet {
            class: self.record.class().name().to_string(),
            attributes: self
                .def
                .attribute_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }

    /// Values in declaration order.
    pub fn values(&self) -> Result<Vec<Value>> {
        self.def
            .bindings()
            .map(|b| self.record.slot(b.index()).cloned())
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| self.not_set())
    }

    pub fn sql_literals(&self, dialect: Dialect) -> Result<Vec<String>> {
        Ok(self.values()?.iter().map(|v| dialect.literal(v)).collect())
    }

    /// `col1 = lit1 AND col2 = lit2 ...` in declaration order.
    pub fn where_clause(&self, dialect: Dialect) -> Result<Where> {
        self.qualified_where_clause(dialect, None)
    }

    /// Like [`Key::where_clause`] with table-qualified column names.
    pub fn qualified_where_clause(
        &self,
        dialect: Dialect,
        qualifier: Option<&TableName>,
    ) -> Result<Where> {
        let literals = self.sql_literals(dialect)?;
        key_where(dialect, qualifier, &self.columns(), &literals).ok_or_else(|| self.not_set())
    }

    /// Same table and positionally equal values.
    ///
    /// Keys of different tables are never equal, even when their values
    /// coincide; use [`Key::values_equal`] for a pure value comparison.
    pub fn equals(&self, other: &Key<'_>) -> Result<bool> {
        let values_equal = self.values_equal(other)?;
        Ok(values_equal && self.record.class().table() == other.record.class().table())
    }

    /// Positional value comparison, ignoring which table the keys belong to.
    pub fn values_equal(&self, other: &Key<'_>) -> Result<bool> {
        Ok(self.values()? == other.values()?)
    }
}

/// Datatypes that may be paired in a foreign key.
fn compatible(a: SqlType, b: SqlType) -> bool {
    a == b || matches!((a, b), (SqlType::Integer | SqlType::BigInt, SqlType::Integer | SqlType::BigInt))
}

/// A key on the owning ("my") class paired with a key on the target
/// ("other") class.
///
/// Construction checks that both sides have the same arity and pairwise
/// compatible datatypes; `Integer` and `BigInt` count as compatible.
#[derive(Debug, Clone)]
pub struct ForeignKeyDef {
    mine: KeyDef,
    other: KeyDef,
}

impl ForeignKeyDef {
    pub fn new(mine: KeyDef, other: KeyDef) -> Result<Self> {
        if mine.len() != other.len() {
            return Err(Error::IllegalForeignKey(format!(
                "{}({}) has {} columns but {}({}) has {}",
                mine.class().name(),
                mine.attribute_names().join(", "),
                mine.len(),
                other.class().name(),
                other.attribute_names().join(", "),
                other.len()
            )));
        }
        for (a, b) in mine.bindings().zip(other.bindings()) {
            if !compatible(a.sql_type(), b.sql_type()) {
                return Err(Error::IllegalForeignKey(format!(
                    "{}.{} is {} but {}.{} is {}",
                    mine.class().name(),
                    a.name(),
                    a.sql_type(),
                    other.class().name(),
                    b.name(),
                    b.sql_type()
                )));
            }
        }
        Ok(Self { mine, other })
    }

    pub fn mine(&self) -> &KeyDef {
        &self.mine
    }

    pub fn other(&self) -> &KeyDef {
        &self.other
    }

    pub fn bind<'r>(&self, record: &'r Record) -> Result<ForeignKey<'r>> {
        Ok(ForeignKey {
            key: self.mine.bind(record)?,
            other: self.other.clone(),
        })
    }
}

/// A foreign key bound to the record on the "my" side.
#[derive(Debug, Clone)]
pub struct ForeignKey<'r> {
    key: Key<'r>,
    other: KeyDef,
}

impl<'r> ForeignKey<'r> {
    pub fn is_set(&self) -> bool {
        self.key.is_set()
    }

    /// Values of the "my" columns, shared by both sides.
    pub fn values(&self) -> Result<Vec<Value>> {
        self.key.values()
    }

    pub fn my_columns(&self) -> Vec<&str> {
        self.key.columns()
    }

    pub fn other_columns(&self) -> Vec<&str> {
        self.other.columns()
    }

    /// Matches rows of the owning class that hold these key values.
    pub fn my_where(&self, dialect: Dialect) -> Result<Where> {
        self.key.where_clause(dialect)
    }

    /// Matches rows of the target class identified by these key values.
    pub fn other_where(&self, dialect: Dialect) -> Result<Where> {
        self.other_where_qualified(dialect, None)
    }

    pub fn other_where_qualified(
        &self,
        dialect: Dialect,
        qualifier: Option<&TableName>,
    ) -> Result<Where> {
        self.other.where_for(&self.values()?, dialect, qualifier)
    }

    pub fn equals(&self, other: &ForeignKey<'_>) -> Result<bool> {
        self.key.equals(&other.key)
    }
}
