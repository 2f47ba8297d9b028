//! Error types for dbmodel.

use std::error::Error as StdError;

use thiserror::Error;

use crate::types::SqlType;
use crate::value::Value;

/// The result type used throughout dbmodel.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can go wrong in the engine.
///
/// Declaration-time variants (`Declaration`, `IllegalForeignKey`,
/// `IllegalPrimaryKey`, `NoSuchAttribute` from a builder) abort class or
/// relationship construction. Per-record variants leave the record exactly
/// as it was before the failing call.
#[derive(Debug, Error)]
pub enum Error {
    #[error("attribute {class}.{attribute} has not been set")]
    AttributeUnset { class: String, attribute: String },

    #[error("attribute {class}.{attribute} can not be overwritten once stored")]
    ImmutableAttribute { class: String, attribute: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{class}.{attribute} expects a {expected} value, got {found}")]
    Conversion {
        class: String,
        attribute: String,
        expected: SqlType,
        found: &'static str,
    },

    #[error("key ({}) of {class} is not set", .attributes.join(", "))]
    KeyNotSet {
        class: String,
        attributes: Vec<String>,
    },

    #[error("primary key of this {class} is not known")]
    PrimaryKeyNotKnown { class: String },

    #[error("{class} has no primary key")]
    NoPrimaryKey { class: String },

    #[error("illegal primary key: {0}")]
    IllegalPrimaryKey(String),

    #[error("illegal foreign key: {0}")]
    IllegalForeignKey(String),

    #[error("{class} has no attribute {attribute}")]
    NoSuchAttribute { class: String, attribute: String },

    #[error("invalid declaration: {0}")]
    Declaration(String),

    #[error("expected an instance of {expected}, got {found}")]
    WrongClass { expected: String, found: String },

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("this {class} has already been inserted")]
    ObjectAlreadyInserted { class: String },

    #[error("this {class} has not been inserted yet")]
    ObjectNotStored { class: String },

    #[error("this {class} contains no data to insert")]
    NoData { class: String },

    #[error("no {class} found")]
    NotFound { class: String },

    #[error("expected zero or one {class}, found {count}")]
    MultipleRecords { class: String, count: usize },

    #[error("{class}.{attribute} can not be generated by this backend; assign it explicitly")]
    IdentityUnavailable { class: String, attribute: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Backend(#[source] Box<dyn StdError + Send + Sync>),
}

impl Error {
    /// Wraps a backend error so it propagates unmodified.
    pub fn backend(err: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Error::Backend(err.into())
    }
}

/// A value rejected by a validator.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid value for {class}.{attribute}: {reason}")]
pub struct ValidationError {
    /// Record class the assignment was made on.
    pub class: String,
    /// Attribute (field) name.
    pub attribute: String,
    /// The offending value.
    pub value: Value,
    /// What the validator complained about.
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = Error::KeyNotSet {
            class: "person".into(),
            attributes: vec!["firstname".into(), "lastname".into()],
        };
        assert_eq!(err.to_string(), "key (firstname, lastname) of person is not set");

        let err = Error::from(ValidationError {
            class: "person".into(),
            attribute: "email".into(),
            value: Value::Text("nope".into()),
            reason: "does not match".into(),
        });
        assert_eq!(err.to_string(), "invalid value for person.email: does not match");
    }

    #[test]
    fn test_backend_error_passes_through() {
        let io = std::io::Error::other("connection reset");
        let err = Error::backend(io);
        assert_eq!(err.to_string(), "connection reset");
        assert!(StdError::source(&err).is_some());
    }
}
