//! Error types for schema compilation and value coercion

use thiserror::Error;

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Errors that can occur while compiling schemas or coercing values
#[derive(Error, Debug)]
pub enum SchemaError {
    /// Malformed or inconsistent schema document
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// A namespace URI was bound to two different prefixes
    #[error("Conflicting prefix binding for namespace '{uri}': '{existing}' vs '{requested}'")]
    NamespaceConflict {
        uri: String,
        existing: String,
        requested: String,
    },

    /// The compiler could not consume part of the schema tree
    #[error("Unsupported schema construct: <{residual}>")]
    UnsupportedSchema { residual: String },

    /// A type or element reference did not resolve
    #[error("Definition '{name}' not found in schema registry")]
    UnknownType { name: String },

    /// A duplicate definition with a different body
    #[error("Duplicate definition: '{name}' is defined multiple times")]
    DuplicateDefinition { name: String },

    /// A leaf value could not be parsed to its declared type
    #[error("Cannot coerce '{value}' to {expected}")]
    Coercion { value: String, expected: &'static str },

    /// XML parsing error in a schema body
    #[error("XML parsing error: {0}")]
    Xml(String),
}

impl From<xmltree::ParseError> for SchemaError {
    fn from(err: xmltree::ParseError) -> Self {
        SchemaError::Xml(err.to_string())
    }
}

impl SchemaError {
    pub(crate) fn coercion(value: &str, expected: &'static str) -> Self {
        SchemaError::Coercion {
            value: value.to_string(),
            expected,
        }
    }
}
