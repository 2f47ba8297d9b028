//! Attribute bindings: per-class column metadata.
//!
//! A [`Binding`] maps one field of a record class to one column. It never
//! holds a value; values live in the slots of each [`Record`], indexed by
//! [`Binding::index`]. The same `Arc<Binding>` is shared by a class and all
//! of its subclasses, so an inherited binding has the same slot index in
//! every class of the hierarchy.

use std::fmt;
use std::sync::Arc;

use crate::dialect::Dialect;
use crate::error::{Error, Result, ValidationError};
use crate::record::Record;
use crate::types::SqlType;
use crate::validate::{MaxLength, NotNull, Validator};
use crate::value::Value;

/// How a binding participates in SELECTs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Loading {
    /// Selected and hydrated with the rest of the row.
    #[default]
    Eager,
    /// Left out of SELECT lists and fetched on demand.
    Delayed {
        /// Keep the fetched value in the record's slot.
        cache: bool,
    },
}

/// Metadata for a backend-generated identity column (serial, auto-increment).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    sequence: Option<String>,
}

impl Identity {
    /// Explicitly configured sequence or generator name, if any.
    pub fn sequence(&self) -> Option<&str> {
        self.sequence.as_deref()
    }
}

/// Column metadata for one field of a record class.
///
/// Built with the constructors below and handed to
/// [`RecordClassBuilder::field`](crate::RecordClassBuilder::field), which
/// assigns the slot index.
///
/// ```ignore
/// let email = Binding::varchar("email", 120).validator(Pattern::email());
/// let id = Binding::serial("id");
/// ```
pub struct Binding {
    name: String,
    column: String,
    sql_type: SqlType,
    index: usize,
    validators: Vec<Arc<dyn Validator>>,
    default_value: Option<Value>,
    has_default: bool,
    identity: Option<Identity>,
    loading: Loading,
}

impl Binding {
    /// A binding whose column name is the field name.
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        let name = name.into();
        Self {
            column: name.clone(),
            name,
            sql_type,
            index: 0,
            validators: Vec::new(),
            default_value: None,
            has_default: false,
            identity: None,
            loading: Loading::Eager,
        }
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, SqlType::Integer)
    }

    pub fn big_integer(name: impl Into<String>) -> Self {
        Self::new(name, SqlType::BigInt)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, SqlType::Float)
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, SqlType::Text)
    }

    /// Text with a maximum length in characters.
    pub fn varchar(name: impl Into<String>, max_length: usize) -> Self {
        Self::text(name).validator(MaxLength(max_length))
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, SqlType::Boolean)
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, SqlType::Date)
    }

    pub fn time(name: impl Into<String>) -> Self {
        Self::new(name, SqlType::Time)
    }

    pub fn timestamp(name: impl Into<String>) -> Self {
        Self::new(name, SqlType::Timestamp)
    }

    pub fn binary(name: impl Into<String>) -> Self {
        Self::new(name, SqlType::Binary)
    }

    pub fn json(name: impl Into<String>) -> Self {
        Self::new(name, SqlType::Json)
    }

    /// An integer identity column generated by the backend.
    pub fn serial(name: impl Into<String>) -> Self {
        Self::integer(name).identity()
    }

    // ------------------------------------------------------------------
    // Builder
    // ------------------------------------------------------------------

    /// Override the column name.
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    /// Append a validator to the chain. Validators run in the order added.
    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    pub(crate) fn shared_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn not_null(self) -> Self {
        self.validator(NotNull)
    }

    /// A client-side default returned by `get` while the binding is unset.
    ///
    /// The default is never written by an INSERT unless it is assigned.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// The column has a server-side default; it is read back after INSERT
    /// when left unset.
    pub fn has_default(mut self) -> Self {
        self.has_default = true;
        self
    }

    /// The column is generated by the backend on INSERT.
    pub fn identity(mut self) -> Self {
        self.identity.get_or_insert_with(Identity::default);
        self.has_default = true;
        self
    }

    /// Name of the sequence (or Firebird generator) feeding this identity.
    pub fn sequence(mut self, sequence: impl Into<String>) -> Self {
        self.identity.get_or_insert_with(Identity::default).sequence = Some(sequence.into());
        self.has_default = true;
        self
    }

    /// Exclude from SELECTs; load on demand and keep the loaded value.
    pub fn delayed(mut self) -> Self {
        self.loading = Loading::Delayed { cache: true };
        self
    }

    /// Exclude from SELECTs; load on demand every time it is asked for.
    pub fn delayed_uncached(mut self) -> Self {
        self.loading = Loading::Delayed { cache: false };
        self
    }

    pub(crate) fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    // ------------------------------------------------------------------
    // Metadata
    // ------------------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_name(&self) -> &str {
        &self.column
    }

    pub const fn sql_type(&self) -> SqlType {
        self.sql_type
    }

    /// Slot index in every record of the owning class hierarchy.
    pub const fn index(&self) -> usize {
        self.index
    }

    pub fn validators(&self) -> &[Arc<dyn Validator>] {
        &self.validators
    }

    pub fn client_default(&self) -> Option<&Value> {
        self.default_value.as_ref()
    }

    /// True when the backend supplies a value for an unset column.
    pub const fn has_server_default(&self) -> bool {
        self.has_default
    }

    pub fn identity_info(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub const fn is_identity(&self) -> bool {
        self.identity.is_some()
    }

    pub const fn loading(&self) -> Loading {
        self.loading
    }

    pub const fn is_delayed(&self) -> bool {
        matches!(self.loading, Loading::Delayed { .. })
    }

    // ------------------------------------------------------------------
    // Per-record access
    // ------------------------------------------------------------------

    fn check_owner(&self, record: &Record) -> Result<()> {
        match record.class().bindings().get(self.index) {
            Some(b) if std::ptr::eq(b.as_ref(), self) => Ok(()),
            _ => Err(Error::NoSuchAttribute {
                class: record.class().name().to_string(),
                attribute: self.name.clone(),
            }),
        }
    }

    /// True if the record holds a value for this binding (defaults don't count).
    pub fn is_set(&self, record: &Record) -> bool {
        self.check_owner(record).is_ok() && record.slot(self.index).is_some()
    }

    /// The assigned value, or the client-side default when unset.
    pub fn get<'r>(&self, record: &'r Record) -> Result<&'r Value> {
        self.check_owner(record)?;
        let class = record.class();
        record
            .slot(self.index)
            .or_else(|| class.bindings()[self.index].default_value.as_ref())
            .ok_or_else(|| Error::AttributeUnset {
                class: class.name().to_string(),
                attribute: self.name.clone(),
            })
    }

    /// Converts, validates and stores `value`, marking the binding dirty.
    ///
    /// An identity of a stored record is write-once: assigning the value it
    /// already holds is a no-op, any other value is an
    /// [`Error::ImmutableAttribute`]. On error the record is unchanged.
    pub fn set(&self, record: &mut Record, value: impl Into<Value>) -> Result<()> {
        self.check_owner(record)?;
        let value = self.convert(record, value.into(), SqlType::convert)?;
        if self.identity.is_some() && record.is_stored() {
            if let Some(current) = record.slot(self.index) {
                if *current == value {
                    return Ok(());
                }
                return Err(Error::ImmutableAttribute {
                    class: record.class().name().to_string(),
                    attribute: self.name.clone(),
                });
            }
        }
        for validator in &self.validators {
            if let Err(reason) = validator.check(&value) {
                return Err(ValidationError {
                    class: record.class().name().to_string(),
                    attribute: self.name.clone(),
                    value,
                    reason,
                }
                .into());
            }
        }
        record.store(self.index, value, true);
        Ok(())
    }

    /// Renders the assigned value as a literal of `dialect`.
    ///
    /// Client-side defaults are not rendered; an unset binding is an error.
    pub fn sql_literal(&self, record: &Record, dialect: Dialect) -> Result<String> {
        self.check_owner(record)?;
        record
            .slot(self.index)
            .map(|value| dialect.literal(value))
            .ok_or_else(|| Error::AttributeUnset {
                class: record.class().name().to_string(),
                attribute: self.name.clone(),
            })
    }

    /// Stores a raw value fetched from the backend.
    ///
    /// Runs the hydration conversion only; validators are skipped and the
    /// binding ends up clean.
    pub fn set_from_result(&self, record: &mut Record, raw: Value) -> Result<()> {
        self.check_owner(record)?;
        let value = self.convert(record, raw, SqlType::from_sql)?;
        record.store(self.index, value, false);
        Ok(())
    }

    fn convert(
        &self,
        record: &Record,
        value: Value,
        conversion: fn(SqlType, Value) -> std::result::Result<Value, Value>,
    ) -> Result<Value> {
        conversion(self.sql_type, value).map_err(|rejected| Error::Conversion {
            class: record.class().name().to_string(),
            attribute: self.name.clone(),
            expected: self.sql_type,
            found: rejected.type_name(),
        })
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("name", &self.name)
            .field("column", &self.column)
            .field("sql_type", &self.sql_type)
            .field("index", &self.index)
            .field("validators", &self.validators.len())
            .field("identity", &self.identity)
            .field("loading", &self.loading)
            .finish()
    }
}
