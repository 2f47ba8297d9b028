//! Registry of record classes and their relationships.

use std::sync::Arc;

use dbmodel_core::{Error, RecordClass, Result};

use crate::relationships::Relationship;

/// Record classes and the relationships declared on them, looked up by
/// name.
///
/// Relationships declared on a class are visible from its subclasses.
///
/// ```ignore
/// let mut schema = Schema::new();
/// schema.add_class(&person)?;
/// schema.add_relationship(ManyToMany::builder("tags", &person, &tag).build()?)?;
/// let tags = schema.relationship(&person, "tags")?.as_many_to_many();
/// ```
#[derive(Debug, Default)]
pub struct Schema {
    classes: Vec<Arc<RecordClass>>,
    relationships: Vec<Relationship>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a class. Class names must be unique.
    pub fn add_class(&mut self, class: &Arc<RecordClass>) -> Result<()> {
        if self.classes.iter().any(|c| c.name() == class.name()) {
            return Err(Error::Declaration(format!(
                "record class {} is already registered",
                class.name()
            )));
        }
        self.classes.push(Arc::clone(class));
        Ok(())
    }

    pub fn class(&self, name: &str) -> Option<&Arc<RecordClass>> {
        self.classes.iter().find(|c| c.name() == name)
    }

    pub fn classes(&self) -> &[Arc<RecordClass>] {
        &self.classes
    }

    /// Registers a relationship under its name on its owner class.
    ///
    /// Both classes are registered as well if they are not yet.
    pub fn add_relationship(&mut self, relationship: impl Into<Relationship>) -> Result<()> {
        let relationship = relationship.into();
        let owner = relationship.owner();
        if self
            .relationships
            .iter()
            .any(|r| Arc::ptr_eq(r.owner(), owner) && r.name() == relationship.name())
        {
            return Err(Error::Declaration(format!(
                "{} already has a relationship named {}",
                owner.name(),
                relationship.name()
            )));
        }
        for class in [relationship.owner(), relationship.target()] {
            if !self.classes.iter().any(|c| Arc::ptr_eq(c, class)) {
                self.add_class(class)?;
            }
        }
        tracing::debug!(
            owner = relationship.owner().name(),
            name = relationship.name(),
            kind = ?relationship.kind(),
            "registered relationship"
        );
        self.relationships.push(relationship);
        Ok(())
    }

    /// The relationship `name` declared on `class` or one of its ancestors.
    pub fn relationship(&self, class: &RecordClass, name: &str) -> Result<&Relationship> {
        self.relationships
            .iter()
            .find(|r| r.name() == name && class.is_subclass_of(r.owner()))
            .ok_or_else(|| Error::NoSuchAttribute {
                class: class.name().to_string(),
                attribute: name.to_string(),
            })
    }

    /// Relationships visible from `class`, in registration order.
    pub fn relationships_of<'s>(&'s self, class: &'s RecordClass) -> impl Iterator<Item = &'s Relationship> {
        self.relationships
            .iter()
            .filter(move |r| class.is_subclass_of(r.owner()))
    }
}
