//! Attributes spread over several columns of one datatype.
//!
//! A property group is declared once and expands into one binding per
//! postfix, named `<attribute>_<postfix>`. The usual case is a text stored
//! in several languages:
//!
//! ```ignore
//! let city = RecordClass::builder("city")
//!     .field(Binding::serial("id"))
//!     .property_group(PropertyGroup::new("name", SqlType::Text, &["de", "en"]).with_default("en"))
//!     .build()?;
//!
//! let name = city.property_group("name")?;
//! name.set(&mut munich, "de", "München")?;
//! assert_eq!(name.get_default(&munich)?, &Value::Text("Munich".into()));
//! ```
//!
//! The member bindings are ordinary attributes, so `name_de` can also be
//! assigned through [`Record::set`] or [`Record::with_values`].

use std::sync::Arc;

use crate::binding::Binding;
use crate::error::{Error, Result};
use crate::record::Record;
use crate::types::SqlType;
use crate::validate::Validator;
use crate::value::Value;

/// One member of a [`PropertyGroup`].
#[derive(Debug, Clone, PartialEq, Eq)]
struct Member {
    postfix: String,
    column: String,
}

/// Declaration of a grouped attribute.
///
/// Handed to [`RecordClassBuilder::property_group`](crate::RecordClassBuilder::property_group),
/// which adds the member bindings after the fields declared so far.
#[derive(Debug, Clone)]
pub struct PropertyGroup {
    name: String,
    sql_type: SqlType,
    members: Vec<Member>,
    default_postfix: Option<String>,
    validators: Vec<Arc<dyn Validator>>,
    has_default: bool,
}

impl PropertyGroup {
    /// A group with one member per postfix, stored in `<name>_<postfix>`.
    pub fn new(name: impl Into<String>, sql_type: SqlType, postfixes: &[&str]) -> Self {
        let name = name.into();
        let members = postfixes
            .iter()
            .map(|postfix| Member {
                postfix: (*postfix).to_string(),
                column: format!("{name}_{postfix}"),
            })
            .collect();
        Self {
            name,
            sql_type,
            members,
            default_postfix: None,
            validators: Vec::new(),
            has_default: false,
        }
    }

    /// Postfix used by [`PropertyGroup::get_default`].
    pub fn with_default(mut self, postfix: impl Into<String>) -> Self {
        self.default_postfix = Some(postfix.into());
        self
    }

    /// Stores the member for `postfix` in `column` instead of
    /// `<name>_<postfix>`.
    pub fn column(mut self, postfix: &str, column: impl Into<String>) -> Self {
        let column = column.into();
        match self.members.iter_mut().find(|m| m.postfix == postfix) {
            Some(member) => member.column = column,
            None => self.members.push(Member {
                postfix: postfix.to_string(),
                column,
            }),
        }
        self
    }

    /// Validator shared by every member.
    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    /// Every member column has a server-side default.
    pub fn has_default(mut self) -> Self {
        self.has_default = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn sql_type(&self) -> SqlType {
        self.sql_type
    }

    pub fn postfixes(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|m| m.postfix.as_str())
    }

    pub fn default_postfix(&self) -> Option<&str> {
        self.default_postfix.as_deref()
    }

    /// Name of the member binding for `postfix`.
    pub fn attribute_name(&self, postfix: &str) -> Option<String> {
        self.members
            .iter()
            .any(|m| m.postfix == postfix)
            .then(|| format!("{}_{postfix}", self.name))
    }

    pub(crate) fn check(&self, class: &str) -> Result<()> {
        if self.members.is_empty() {
            return Err(Error::Declaration(format!(
                "{class}.{}: a property group needs at least one postfix",
                self.name
            )));
        }
        for (i, member) in self.members.iter().enumerate() {
            if member.postfix.is_empty() {
                return Err(Error::Declaration(format!(
                    "{class}.{}: empty postfix",
                    self.name
                )));
            }
            if self.members[..i].iter().any(|m| m.postfix == member.postfix) {
                return Err(Error::Declaration(format!(
                    "{class}.{}: postfix {} appears twice",
                    self.name, member.postfix
                )));
            }
        }
        if let Some(default) = &self.default_postfix {
            if self.attribute_name(default).is_none() {
                return Err(Error::Declaration(format!(
                    "{class}.{}: default postfix {default} is not a member",
                    self.name
                )));
            }
        }
        Ok(())
    }

    /// The member bindings, in postfix order.
    pub(crate) fn bindings(&self) -> Vec<Binding> {
        self.members
            .iter()
            .map(|member| {
                let mut binding = Binding::new(format!("{}_{}", self.name, member.postfix), self.sql_type)
                    .column(member.column.clone());
                for validator in &self.validators {
                    binding = binding.shared_validator(Arc::clone(validator));
                }
                if self.has_default {
                    binding = binding.has_default();
                }
                binding
            })
            .collect()
    }

    fn member_binding<'c>(&self, record: &'c Record, postfix: &str) -> Result<&'c Arc<Binding>> {
        let attribute = self.attribute_name(postfix).ok_or_else(|| Error::NoSuchAttribute {
            class: record.class().name().to_string(),
            attribute: format!("{}[{postfix}]", self.name),
        })?;
        record.class().binding(&attribute)
    }

    /// The value stored for `postfix`.
    pub fn get<'r>(&self, record: &'r Record, postfix: &str) -> Result<&'r Value> {
        self.member_binding(record, postfix)?.get(record)
    }

    /// The value stored for the default postfix.
    pub fn get_default<'r>(&self, record: &'r Record) -> Result<&'r Value> {
        let postfix = self.default_postfix.as_deref().ok_or_else(|| {
            Error::Declaration(format!(
                "{}.{} has no default postfix",
                record.class().name(),
                self.name
            ))
        })?;
        self.get(record, postfix)
    }

    /// Assigns the member for `postfix`; only that column becomes dirty.
    pub fn set(&self, record: &mut Record, postfix: &str, value: impl Into<Value>) -> Result<()> {
        let binding = Arc::clone(self.member_binding(record, postfix)?);
        binding.set(record, value)
    }

    /// Assigns several members at once. Either every value is stored or,
    /// on error, none is.
    pub fn set_all<I, K>(&self, record: &mut Record, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let mut staged = record.clone();
        for (postfix, value) in values {
            self.set(&mut staged, postfix.as_ref(), value)?;
        }
        *record = staged;
        Ok(())
    }

    /// `(postfix, value)` for every member; unset members map to `None`.
    pub fn values<'r>(&self, record: &'r Record) -> Vec<(&str, Option<&'r Value>)> {
        self.members
            .iter()
            .map(|member| {
                let value = self
                    .member_binding(record, &member.postfix)
                    .ok()
                    .and_then(|binding| record.slot(binding.index()));
                (member.postfix.as_str(), value)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::RecordClass;
    use crate::validate::NotEmpty;

    fn city() -> Arc<RecordClass> {
        RecordClass::builder("city")
            .field(Binding::serial("id"))
            .property_group(
                PropertyGroup::new("name", SqlType::Text, &["de", "en"])
                    .with_default("en")
                    .validator(NotEmpty),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_members_expand_to_bindings() {
        let class = city();
        let names: Vec<_> = class.bindings().iter().map(|b| b.column_name()).collect();
        assert_eq!(names, vec!["id", "name_de", "name_en"]);
        let group = class.property_group("name").unwrap();
        assert_eq!(group.postfixes().collect::<Vec<_>>(), vec!["de", "en"]);
        assert_eq!(group.attribute_name("de").as_deref(), Some("name_de"));
        assert_eq!(group.attribute_name("fr"), None);
    }

    #[test]
    fn test_get_and_set_by_postfix() {
        let class = city();
        let group = class.property_group("name").unwrap();
        let mut munich = Record::with_values(&class, [("name_en", Value::from("Munich"))]).unwrap();

        group.set(&mut munich, "de", "München").unwrap();
        assert_eq!(group.get(&munich, "de").unwrap(), &Value::Text("München".into()));
        assert_eq!(group.get_default(&munich).unwrap(), &Value::Text("Munich".into()));
        assert_eq!(
            group.values(&munich),
            vec![
                ("de", Some(&Value::Text("München".into()))),
                ("en", Some(&Value::Text("Munich".into()))),
            ]
        );
    }

    #[test]
    fn test_only_assigned_member_is_dirty() {
        let class = city();
        let group = class.property_group("name").unwrap();
        let mut munich = Record::with_values(
            &class,
            [("id", Value::Int(2)), ("name_de", "München".into()), ("name_en", "Munich".into())],
        )
        .unwrap();
        munich.mark_stored();

        group.set(&mut munich, "de", "Landeshauptstadt München").unwrap();
        let dirty: Vec<_> = munich.dirty_bindings().map(|b| b.name()).collect();
        assert_eq!(dirty, vec!["name_de"]);
    }

    #[test]
    fn test_unknown_postfix() {
        let class = city();
        let group = class.property_group("name").unwrap();
        let mut record = Record::new(&class);
        let err = group.set(&mut record, "fr", "Munich").unwrap_err();
        assert!(matches!(err, Error::NoSuchAttribute { ref attribute, .. } if attribute == "name[fr]"));
        assert!(matches!(group.get(&record, "fr"), Err(Error::NoSuchAttribute { .. })));
    }

    #[test]
    fn test_set_all_is_all_or_nothing() {
        let class = city();
        let group = class.property_group("name").unwrap();
        let mut record = Record::new(&class);

        let err = group
            .set_all(&mut record, [("de", Value::from("München")), ("en", Value::from(""))])
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(!record.is_set("name_de"));
        assert!(!record.is_dirty());

        group
            .set_all(&mut record, [("de", Value::from("München")), ("en", Value::from("Munich"))])
            .unwrap();
        assert_eq!(record.get("name_en").unwrap(), &Value::Text("Munich".into()));
    }

    #[test]
    fn test_custom_column_and_missing_default() {
        let class = RecordClass::builder("item_category")
            .field(Binding::serial("id"))
            .property_group(PropertyGroup::new("title", SqlType::Text, &["en", "de"]).column("de", "titel"))
            .build()
            .unwrap();
        assert_eq!(class.binding("title_de").unwrap().column_name(), "titel");
        let group = class.property_group("title").unwrap();
        let record = Record::new(&class);
        assert!(matches!(group.get_default(&record), Err(Error::Declaration(_))));
    }

    #[test]
    fn test_bad_declarations() {
        for group in [
            PropertyGroup::new("name", SqlType::Text, &[]),
            PropertyGroup::new("name", SqlType::Text, &["de", "de"]),
            PropertyGroup::new("name", SqlType::Text, &["de"]).with_default("en"),
        ] {
            let err = RecordClass::builder("city").property_group(group).build().unwrap_err();
            assert!(matches!(err, Error::Declaration(_)));
        }

        let err = RecordClass::builder("city")
            .field(Binding::text("name"))
            .property_group(PropertyGroup::new("name", SqlType::Text, &["de"]))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Declaration(_)));
    }
}
