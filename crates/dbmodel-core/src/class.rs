//! Record classes: the declared shape of a table.

use std::fmt;
use std::sync::Arc;

use crate::binding::Binding;
use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::property_group::PropertyGroup;

/// A possibly schema-qualified table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName {
    schema: Option<String>,
    name: String,
}

impl TableName {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    pub fn with_schema(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    /// The table as it appears in SQL, each part quoted when needed.
    pub fn render(&self, dialect: Dialect) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", dialect.identifier(schema), dialect.identifier(&self.name)),
            None => dialect.identifier(&self.name),
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{schema}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// The declared shape of a record type: table, ordered bindings, primary key.
///
/// Classes are immutable once built and shared as `Arc<RecordClass>`.
/// Bindings inherited from a parent class come first, in the parent's order,
/// followed by the class's own bindings in declaration order.
#[derive(Debug)]
pub struct RecordClass {
    name: String,
    table: TableName,
    bindings: Vec<Arc<Binding>>,
    primary_key: Option<Vec<usize>>,
    parent: Option<Arc<RecordClass>>,
    groups: Vec<Arc<PropertyGroup>>,
}

impl RecordClass {
    pub fn builder(name: impl Into<String>) -> RecordClassBuilder {
        RecordClassBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &TableName {
        &self.table
    }

    pub fn parent(&self) -> Option<&Arc<RecordClass>> {
        self.parent.as_ref()
    }

    /// All bindings in slot order.
    pub fn bindings(&self) -> &[Arc<Binding>] {
        &self.bindings
    }

    pub fn find_binding(&self, name: &str) -> Option<&Arc<Binding>> {
        self.bindings.iter().find(|b| b.name() == name)
    }

    pub fn binding(&self, name: &str) -> Result<&Arc<Binding>> {
        self.find_binding(name).ok_or_else(|| Error::NoSuchAttribute {
            class: self.name.clone(),
            attribute: name.to_string(),
        })
    }

    /// Property groups, inherited ones first.
    pub fn property_groups(&self) -> &[Arc<PropertyGroup>] {
        &self.groups
    }

    pub fn property_group(&self, name: &str) -> Result<&Arc<PropertyGroup>> {
        self.groups
            .iter()
            .find(|g| g.name() == name)
            .ok_or_else(|| Error::NoSuchAttribute {
                class: self.name.clone(),
                attribute: name.to_string(),
            })
    }

    /// Bindings that take part in SELECTs and hydration, in slot order.
    pub fn select_bindings(&self) -> impl Iterator<Item = &Arc<Binding>> {
        self.bindings.iter().filter(|b| !b.is_delayed())
    }

    pub fn identity_bindings(&self) -> impl Iterator<Item = &Arc<Binding>> {
        self.bindings.iter().filter(|b| b.is_identity())
    }

    pub fn has_primary_key(&self) -> bool {
        self.primary_key.is_some()
    }

    /// Primary key bindings in declaration order.
    pub fn primary_key(&self) -> Result<Vec<&Arc<Binding>>> {
        let indices = self.primary_key.as_ref().ok_or_else(|| Error::NoPrimaryKey {
            class: self.name.clone(),
        })?;
        Ok(indices.iter().map(|idx| &self.bindings[*idx]).collect())
    }

    /// Resolves attribute names to bindings, keeping their order.
    pub fn bindings_named(&self, names: &[&str]) -> Result<Vec<&Arc<Binding>>> {
        names.iter().map(|name| self.binding(name)).collect()
    }

    /// True if `self` is `other` or derives from it.
    pub fn is_subclass_of(&self, other: &RecordClass) -> bool {
        let mut current = Some(self);
        while let Some(class) = current {
            if std::ptr::eq(class, other) {
                return true;
            }
            current = class.parent.as_deref();
        }
        false
    }
}

/// Builder for [`RecordClass`].
///
/// ```ignore
/// let person = RecordClass::builder("person")
///     .field(Binding::text("firstname"))
///     .field(Binding::text("lastname"))
///     .field(Binding::integer("height"))
///     .primary_key(&["firstname", "lastname"])
///     .build()?;
/// ```
#[derive(Debug)]
pub struct RecordClassBuilder {
    name: String,
    table: Option<String>,
    schema: Option<String>,
    parent: Option<Arc<RecordClass>>,
    fields: Vec<Binding>,
    groups: Vec<PropertyGroup>,
    primary_key: Option<Vec<String>>,
}

impl RecordClassBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: None,
            schema: None,
            parent: None,
            fields: Vec::new(),
            groups: Vec::new(),
            primary_key: None,
        }
    }

    /// Table name; defaults to the class name.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Inherit bindings and primary key from `parent`.
    pub fn extends(mut self, parent: &Arc<RecordClass>) -> Self {
        self.parent = Some(Arc::clone(parent));
        self
    }

    pub fn field(mut self, binding: Binding) -> Self {
        self.fields.push(binding);
        self
    }

    /// Adds the member bindings of `group` after the fields declared so
    /// far.
    pub fn property_group(mut self, group: PropertyGroup) -> Self {
        self.fields.extend(group.bindings());
        self.groups.push(group);
        self
    }

    /// Declare the primary key by attribute name, in key order.
    ///
    /// Without a declaration a binding named `id` becomes the key.
    pub fn primary_key(mut self, attributes: &[&str]) -> Self {
        self.primary_key = Some(attributes.iter().map(|a| (*a).to_string()).collect());
        self
    }

    pub fn build(self) -> Result<Arc<RecordClass>> {
        if self.name.is_empty() {
            return Err(Error::Declaration("record class name must not be empty".into()));
        }

        let mut bindings: Vec<Arc<Binding>> = self
            .parent
            .as_ref()
            .map(|p| p.bindings.clone())
            .unwrap_or_default();

        for field in self.fields {
            if field.name().is_empty() {
                return Err(Error::Declaration(format!(
                    "{}: attribute name must not be empty",
                    self.name
                )));
            }
            if bindings.iter().any(|b| b.name() == field.name()) {
                return Err(Error::Declaration(format!(
                    "{}: duplicate attribute {}",
                    self.name,
                    field.name()
                )));
            }
            if bindings.iter().any(|b| b.column_name() == field.column_name()) {
                return Err(Error::Declaration(format!(
                    "{}: column {} is mapped twice",
                    self.name,
                    field.column_name()
                )));
            }
            let index = bindings.len();
            bindings.push(Arc::new(field.with_index(index)));
        }

        let mut groups: Vec<Arc<PropertyGroup>> = self
            .parent
            .as_ref()
            .map(|p| p.groups.clone())
            .unwrap_or_default();
        for group in self.groups {
            group.check(&self.name)?;
            let taken = bindings.iter().any(|b| b.name() == group.name())
                || groups.iter().any(|g| g.name() == group.name());
            if taken {
                return Err(Error::Declaration(format!(
                    "{}: property group {} clashes with another attribute",
                    self.name,
                    group.name()
                )));
            }
            groups.push(Arc::new(group));
        }

        let inherited_key = self.parent.as_ref().and_then(|p| p.primary_key.clone());
        let primary_key = match (inherited_key, self.primary_key) {
            (Some(_), Some(_)) => {
                return Err(Error::Declaration(format!(
                    "{}: the primary key is declared once, on the root of the class hierarchy",
                    self.name
                )));
            }
            (Some(inherited), None) => Some(inherited),
            (None, Some(names)) => Some(resolve_key(&self.name, &bindings, &names)?),
            (None, None) => bindings
                .iter()
                .find(|b| b.name() == "id")
                .map(|b| vec![b.index()]),
        };

        Ok(Arc::new(RecordClass {
            table: TableName {
                schema: self.schema,
                name: self.table.unwrap_or_else(|| self.name.clone()),
            },
            name: self.name,
            bindings,
            primary_key,
            parent: self.parent,
            groups,
        }))
    }
}

fn resolve_key(class: &str, bindings: &[Arc<Binding>], names: &[String]) -> Result<Vec<usize>> {
    if names.is_empty() {
        return Err(Error::IllegalPrimaryKey(format!(
            "{class}: a primary key needs at least one attribute"
        )));
    }
    let mut indices = Vec::with_capacity(names.len());
    for name in names {
        let binding = bindings.iter().find(|b| b.name() == name).ok_or_else(|| {
            Error::NoSuchAttribute {
                class: class.to_string(),
                attribute: name.clone(),
            }
        })?;
        if binding.is_delayed() {
            return Err(Error::IllegalPrimaryKey(format!(
                "{class}.{name} is delayed and can not be part of the primary key"
            )));
        }
        if indices.contains(&binding.index()) {
            return Err(Error::IllegalPrimaryKey(format!(
                "{class}.{name} appears twice in the primary key"
            )));
        }
        indices.push(binding.index());
    }
    Ok(indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Arc<RecordClass> {
        RecordClass::builder("document")
            .field(Binding::serial("id"))
            .field(Binding::text("title"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let class = base();
        assert_eq!(class.table().name(), "document");
        let key: Vec<_> = class.primary_key().unwrap().iter().map(|b| b.name()).collect();
        assert_eq!(key, vec!["id"]);
        assert_eq!(class.binding("title").unwrap().index(), 1);
    }

    #[test]
    fn test_composite_key_keeps_declaration_order() {
        let class = RecordClass::builder("person")
            .field(Binding::text("firstname"))
            .field(Binding::text("lastname"))
            .primary_key(&["lastname", "firstname"])
            .build()
            .unwrap();
        let key: Vec<_> = class.primary_key().unwrap().iter().map(|b| b.name()).collect();
        assert_eq!(key, vec!["lastname", "firstname"]);
    }

    #[test]
    fn test_subclass_inherits_bindings_in_order() {
        let parent = base();
        let child = RecordClass::builder("article")
            .extends(&parent)
            .field(Binding::text("body").delayed())
            .build()
            .unwrap();
        let names: Vec<_> = child.bindings().iter().map(|b| b.name()).collect();
        assert_eq!(names, vec!["id", "title", "body"]);
        assert!(Arc::ptr_eq(&child.bindings()[0], &parent.bindings()[0]));
        assert_eq!(child.table().name(), "article");
        assert!(child.is_subclass_of(&parent));
        assert!(!parent.is_subclass_of(&child));
        assert_eq!(child.select_bindings().count(), 2);
        assert_eq!(child.primary_key().unwrap()[0].name(), "id");
    }

    #[test]
    fn test_duplicate_attribute_across_hierarchy() {
        let parent = base();
        let err = RecordClass::builder("article")
            .extends(&parent)
            .field(Binding::text("title"))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Declaration(_)));
    }

    #[test]
    fn test_primary_key_not_redeclared() {
        let parent = base();
        let err = RecordClass::builder("article")
            .extends(&parent)
            .primary_key(&["title"])
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Declaration(_)));
    }

    #[test]
    fn test_bad_primary_keys() {
        let err = RecordClass::builder("x")
            .field(Binding::text("a"))
            .primary_key(&[])
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::IllegalPrimaryKey(_)));

        let err = RecordClass::builder("x")
            .field(Binding::text("a"))
            .primary_key(&["b"])
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::NoSuchAttribute { .. }));
    }

    #[test]
    fn test_no_primary_key() {
        let class = RecordClass::builder("log")
            .field(Binding::text("line"))
            .build()
            .unwrap();
        assert!(!class.has_primary_key());
        assert!(matches!(class.primary_key(), Err(Error::NoPrimaryKey { .. })));
    }

    #[test]
    fn test_table_rendering() {
        let t = TableName::with_schema("public", "user");
        assert_eq!(t.render(Dialect::Postgres), "public.\"user\"");
        assert_eq!(t.to_string(), "public.user");
    }
}
