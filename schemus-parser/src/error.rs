//! Error types for document validation and schema acquisition

use schemus_xsd::SchemaError;
use thiserror::Error;

/// Result type for parser operations
pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Errors that can occur while acquiring schemas or validating documents
///
/// Validation-level variants carry the namespaced path of the offending
/// node and, where applicable, the allowed alternatives.
#[derive(Error, Debug)]
pub enum ParseError {
    /// Schema compilation or value coercion error
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A required namespace has no schema in the registry
    #[error("No schema registered for namespace '{uri}'")]
    MissingSchema { uri: String },

    /// Two different locations were hinted for one namespace
    #[error("Conflicting schema locations for namespace '{uri}': {urls:?}")]
    MismatchedSchemaLocation { uri: String, urls: Vec<String> },

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Schema fetch failed, with the (namespace, location) pair attached
    #[error("Failed to fetch schema for namespace '{uri}' from '{url}': {source}")]
    Fetch {
        uri: String,
        url: String,
        #[source]
        source: Box<ParseError>,
    },

    /// A document namespace has no prefix in the registry
    #[error("Unknown namespace '{uri}' at {path}")]
    UnknownNamespace { uri: String, path: String },

    /// An element not allowed by the schema at this position
    #[error("Unknown element at {path}, allowed: [{allowed}]")]
    UnknownElement { path: String, allowed: String },

    /// An attribute not allowed by the schema on this element
    #[error("Unexpected attribute '{name}' at {path}, allowed: [{allowed}]")]
    UnexpectedAttribute {
        name: String,
        path: String,
        allowed: String,
    },

    /// Children appeared under an element whose type has none
    #[error("Element at {path} does not allow children")]
    UnexpectedChildren { path: String },

    /// Document structure does not fit the schema shape
    #[error("Schema mismatch at {path}: {reason}")]
    SchemaMismatch { path: String, reason: String },

    /// A leaf value failed to coerce to its declared type
    #[error("Coercion failed at {path}: {source}")]
    Coercion {
        path: String,
        #[source]
        source: SchemaError,
    },

    /// Malformed XML document
    #[error("Invalid XML document: {0}")]
    InvalidDocument(String),

    /// Invalid parser configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Other errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<quick_xml::Error> for ParseError {
    fn from(err: quick_xml::Error) -> Self {
        ParseError::InvalidDocument(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for ParseError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        ParseError::InvalidDocument(err.to_string())
    }
}
