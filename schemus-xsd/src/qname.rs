//! Qualified names and per-schema name resolution

use std::collections::HashMap;
use std::fmt;

use crate::error::{Result, SchemaError};
use crate::registry::XSD_NAMESPACE;

/// A qualified name: namespace URI plus local name
///
/// Built-in XSD types carry no namespace; everything else is keyed by the
/// full pair. The canonical string form is `uri|local` (bare local name when
/// there is no namespace).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    pub namespace: Option<String>,
    pub local: String,
}

impl QName {
    pub fn new(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        QName {
            namespace: Some(namespace.into()),
            local: local.into(),
        }
    }

    /// A name without a namespace (built-ins, no-namespace documents)
    pub fn local(local: impl Into<String>) -> Self {
        QName {
            namespace: None,
            local: local.into(),
        }
    }

    /// Whether this name refers into the built-in type table
    pub fn is_builtin(&self) -> bool {
        self.namespace.is_none()
    }

    /// Parse the canonical `uri|local` form
    pub fn from_canonical(key: &str) -> Self {
        match key.split_once('|') {
            Some((uri, local)) => QName::new(uri, local),
            None => QName::local(key),
        }
    }

    /// The canonical `uri|local` form
    pub fn canonical(&self) -> String {
        match &self.namespace {
            Some(uri) => format!("{}|{}", uri, self.local),
            None => self.local.clone(),
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(uri) => write!(f, "{}|{}", uri, self.local),
            None => write!(f, "{}", self.local),
        }
    }
}

/// Resolves schema-local names against one schema's prefix bindings
///
/// The XML Schema namespace prefix is stripped during resolution so that
/// built-in type names come out without a namespace.
#[derive(Debug)]
pub struct NameResolver {
    /// prefix -> namespace URI, as declared on the schema root
    bindings: HashMap<String, String>,
    /// The prefix bound to the XSD namespace in this schema ("" for default)
    xs_prefix: Option<String>,
    /// Default namespace, when it is not the XSD namespace
    default_namespace: Option<String>,
    target_namespace: Option<String>,
}

impl NameResolver {
    pub fn new(
        bindings: HashMap<String, String>,
        target_namespace: Option<String>,
    ) -> NameResolver {
        let xs_prefix = bindings
            .iter()
            .find(|(_, uri)| uri.as_str() == XSD_NAMESPACE)
            .map(|(prefix, _)| prefix.clone());
        let default_namespace = bindings
            .get("")
            .filter(|uri| uri.as_str() != XSD_NAMESPACE && !uri.is_empty())
            .cloned();
        NameResolver {
            bindings,
            xs_prefix,
            default_namespace,
            target_namespace,
        }
    }

    pub fn target_namespace(&self) -> Option<&str> {
        self.target_namespace.as_deref()
    }

    /// Iterate the declared prefix bindings
    pub fn bindings(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bindings
            .iter()
            .map(|(p, u)| (p.as_str(), u.as_str()))
    }

    /// Resolve a possibly-prefixed schema name to a qualified name
    ///
    /// # Errors
    ///
    /// Fails with [`SchemaError::InvalidSchema`] on an undeclared prefix.
    pub fn resolve(&self, raw: &str) -> Result<QName> {
        if let Some((prefix, local)) = raw.split_once(':') {
            if self.xs_prefix.as_deref() == Some(prefix) {
                return Ok(QName::local(local));
            }
            let uri = self.bindings.get(prefix).ok_or_else(|| {
                SchemaError::InvalidSchema(format!("undeclared namespace prefix '{prefix}'"))
            })?;
            Ok(QName::new(uri.clone(), local))
        } else {
            if self.xs_prefix.as_deref() == Some("") {
                return Ok(QName::local(raw));
            }
            if let Some(default) = &self.default_namespace {
                return Ok(QName::new(default.clone(), raw));
            }
            Ok(self.qualify(raw))
        }
    }

    /// Qualify a declared name (an element/attribute/type `name` attribute)
    /// with this schema's target namespace
    pub fn qualify(&self, local: &str) -> QName {
        match &self.target_namespace {
            Some(uri) => QName::new(uri.clone(), local),
            None => QName::local(local),
        }
    }
}
