//! # XML Schema model and compiler
//!
//! This crate builds an in-memory registry of types, elements, and
//! attributes from XML Schema (XSD) documents. It is the schema half of the
//! schemus workspace; the `schemus-parser` crate consumes the registry to
//! validate and normalize documents.
//!
//! ## Features
//!
//! - **Destructive compilation** - Every recognized XSD construct is
//!   consumed out of the schema tree; leftovers are reported as unsupported
//!   rather than silently skipped
//! - **Built-in type table** - The XSD primitives map to native value
//!   parsers (integers, doubles, booleans, UTC instants, byte arrays)
//! - **Union support** - Terminal lookups come back as lists so single
//!   types and unions share one trial-parsing path
//! - **Idempotent commits** - Re-adding a schema body is a no-op; failed
//!   compilations leave the registry untouched
//!
//! ## Usage
//!
//! ```
//! use schemus_xsd::{QName, SchemaRegistry};
//!
//! let mut registry = SchemaRegistry::new();
//! let pending = registry.add_schema(
//!     "http://example.com/orders",
//!     br#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
//!                    targetNamespace="http://example.com/orders">
//!           <xs:element name="amount" type="xs:decimal"/>
//!         </xs:schema>"#,
//! )?;
//! assert!(pending.is_empty());
//! assert!(registry
//!     .element(&QName::new("http://example.com/orders", "amount"))
//!     .is_some());
//! # Ok::<(), schemus_xsd::SchemaError>(())
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod builtins;
mod compiler;
pub mod error;
pub mod model;
pub mod multimap;
pub mod qname;
pub mod registry;
pub mod resolve;
pub mod value;

pub use builtins::ValueParser;
pub use error::{Result, SchemaError};
pub use model::{AttrSpec, ChildSpec, ComplexType, ResolvedElement, SimpleType, TypeEntry};
pub use multimap::MultiMap;
pub use qname::{NameResolver, QName};
pub use registry::{
    KnownSchemas, PendingImports, SchemaRegistry, XML_NAMESPACE, XSD_NAMESPACE, XSI_NAMESPACE,
};
pub use resolve::{complex_candidates, ChildSet};
pub use value::Value;
