//! Per-parser-instance schema registry
//!
//! Holds everything the compiler produces: named types, global elements,
//! global attributes, the namespace-prefix table, and the bookkeeping sets
//! that make schema acquisition idempotent. Registries grow monotonically;
//! entries are write-once after a schema is committed.

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::builtins::{ValueParser, BUILTIN_TYPES};
use crate::compiler;
use crate::error::{Result, SchemaError};
use crate::model::{AttrSpec, ChildSpec, SimpleType, TypeEntry};
use crate::multimap::MultiMap;
use crate::qname::QName;

/// The XML namespace, pre-bound to the `xml` prefix
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// The XML Schema namespace
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// The XML Schema Instance namespace (`xsi:schemaLocation` et al.)
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Pending imports returned by schema compilation: namespace -> locations
pub type PendingImports = MultiMap<String, String>;

/// Snapshot of committed schema bodies: namespace -> bodies
pub type KnownSchemas = MultiMap<String, Vec<u8>>;

/// Registry of compiled schema components
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    pub(crate) types: IndexMap<QName, TypeEntry>,
    pub(crate) elements: IndexMap<QName, ChildSpec>,
    pub(crate) attributes: IndexMap<QName, AttrSpec>,
    /// namespace URI -> prefix; one prefix per URI for the registry's life
    prefixes: IndexMap<String, String>,
    /// namespace -> schema bodies already committed
    parsed: KnownSchemas,
    /// (namespace, url) pairs already fetched
    downloaded: HashSet<(String, String)>,
}

impl SchemaRegistry {
    /// Create a registry pre-seeded with the built-in types and the `xml`
    /// prefix binding
    pub fn new() -> SchemaRegistry {
        let mut types = IndexMap::new();
        for name in BUILTIN_TYPES {
            types.insert(
                QName::local(*name),
                TypeEntry::Simple(SimpleType {
                    bases: Vec::new(),
                    parse: ValueParser::for_builtin(name),
                    restriction: false,
                }),
            );
        }
        // anySimpleType terminates base chains and coerces as identity
        types.insert(
            QName::local("anySimpleType"),
            TypeEntry::Simple(SimpleType::default()),
        );
        let mut prefixes = IndexMap::new();
        prefixes.insert(XML_NAMESPACE.to_string(), "xml".to_string());
        SchemaRegistry {
            types,
            elements: IndexMap::new(),
            attributes: IndexMap::new(),
            prefixes,
            parsed: KnownSchemas::new(),
            downloaded: HashSet::new(),
        }
    }

    /// Compile a schema body and commit it under the given namespace
    ///
    /// Re-adding a body already committed for the namespace is a no-op that
    /// returns an empty pending-import map. Commits are all-or-nothing: on
    /// any compiler error the registry is left untouched.
    ///
    /// # Returns
    ///
    /// The `<import>`/`<include>` locations the schema depends on, keyed by
    /// namespace.
    pub fn add_schema(&mut self, namespace: &str, body: &[u8]) -> Result<PendingImports> {
        if self.parsed.contains(&namespace.to_string(), &body.to_vec()) {
            return Ok(PendingImports::new());
        }
        let mut staged = self.clone();
        let pending = compiler::compile(&mut staged, namespace, body)?;
        staged
            .parsed
            .insert(namespace.to_string(), body.to_vec());
        *self = staged;
        Ok(pending)
    }

    /// Snapshot of all committed schema bodies
    pub fn known_schemas(&self) -> KnownSchemas {
        self.parsed.clone()
    }

    /// Whether some body has been committed for this namespace
    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.parsed.contains_key(&namespace.to_string())
    }

    pub fn is_downloaded(&self, namespace: &str, url: &str) -> bool {
        self.downloaded
            .contains(&(namespace.to_string(), url.to_string()))
    }

    pub fn mark_downloaded(&mut self, namespace: &str, url: &str) {
        self.downloaded
            .insert((namespace.to_string(), url.to_string()));
    }

    /// Bind a namespace URI to a prefix
    ///
    /// # Errors
    ///
    /// Fails with [`SchemaError::NamespaceConflict`] when the URI is already
    /// bound to a different prefix.
    pub fn bind_prefix(&mut self, uri: &str, prefix: &str) -> Result<()> {
        match self.prefixes.get(uri) {
            Some(existing) if existing == prefix => Ok(()),
            Some(existing) => Err(SchemaError::NamespaceConflict {
                uri: uri.to_string(),
                existing: existing.clone(),
                requested: prefix.to_string(),
            }),
            None => {
                self.prefixes.insert(uri.to_string(), prefix.to_string());
                Ok(())
            }
        }
    }

    /// The prefix bound to a namespace URI, if any
    pub fn prefix_for(&self, uri: &str) -> Option<&str> {
        self.prefixes.get(uri).map(|p| p.as_str())
    }

    pub fn type_entry(&self, name: &QName) -> Option<&TypeEntry> {
        self.types.get(name)
    }

    pub fn element(&self, name: &QName) -> Option<&ChildSpec> {
        self.elements.get(name)
    }

    /// Iterate all global element names (the `anyChildren` child set)
    pub fn element_names(&self) -> impl Iterator<Item = &QName> {
        self.elements.keys()
    }

    pub fn attribute(&self, name: &QName) -> Option<&AttrSpec> {
        self.attributes.get(name)
    }

    pub(crate) fn insert_type(&mut self, name: QName, entry: TypeEntry) -> Result<()> {
        match self.types.get(&name) {
            Some(existing) if *existing == entry => Ok(()),
            Some(_) => Err(SchemaError::DuplicateDefinition {
                name: name.to_string(),
            }),
            None => {
                self.types.insert(name, entry);
                Ok(())
            }
        }
    }

    pub(crate) fn insert_element(&mut self, name: QName, spec: ChildSpec) -> Result<()> {
        match self.elements.get(&name) {
            Some(existing) if *existing == spec => Ok(()),
            Some(_) => Err(SchemaError::DuplicateDefinition {
                name: name.to_string(),
            }),
            None => {
                self.elements.insert(name, spec);
                Ok(())
            }
        }
    }

    pub(crate) fn insert_attribute(&mut self, name: QName, spec: AttrSpec) -> Result<()> {
        match self.attributes.get(&name) {
            Some(existing) if *existing == spec => Ok(()),
            Some(_) => Err(SchemaError::DuplicateDefinition {
                name: name.to_string(),
            }),
            None => {
                self.attributes.insert(name, spec);
                Ok(())
            }
        }
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        SchemaRegistry::new()
    }
}
