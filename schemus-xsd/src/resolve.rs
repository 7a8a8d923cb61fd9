//! Resolution helpers
//!
//! Registry lookups chase `ref` chains and base-type chains lazily, at
//! validation time. Terminal lookups always come back as lists so that
//! single types and unions share one code path.

use indexmap::IndexMap;

use crate::builtins::ValueParser;
use crate::error::{Result, SchemaError};
use crate::model::{AttrSpec, ChildSpec, ComplexType, ResolvedElement, TypeEntry};
use crate::qname::QName;
use crate::registry::SchemaRegistry;

impl SchemaRegistry {
    /// Resolve a type name to the list of entries along its base chain
    ///
    /// Unions are flattened into one entry per member; a complex type is
    /// followed by its base-chain entries so inherited children are
    /// reachable.
    ///
    /// # Errors
    ///
    /// Fails with [`SchemaError::UnknownType`] on a dangling reference.
    pub fn resolve_type(&self, name: &QName) -> Result<Vec<&TypeEntry>> {
        let mut out = Vec::new();
        let mut seen = Vec::new();
        self.resolve_type_into(name, &mut out, &mut seen)?;
        Ok(out)
    }

    fn resolve_type_into<'a>(
        &'a self,
        name: &QName,
        out: &mut Vec<&'a TypeEntry>,
        seen: &mut Vec<QName>,
    ) -> Result<()> {
        if seen.contains(name) {
            return Ok(());
        }
        seen.push(name.clone());
        let entry = self.type_entry(name).ok_or_else(|| SchemaError::UnknownType {
            name: name.to_string(),
        })?;
        out.push(entry);
        match entry {
            TypeEntry::Simple(st) => {
                for base in &st.bases {
                    self.resolve_type_into(base, out, seen)?;
                }
            }
            TypeEntry::Complex(ct) => {
                if let Some(base) = &ct.base {
                    self.resolve_type_into(base, out, seen)?;
                }
            }
        }
        Ok(())
    }

    /// Chase an element's `ref` chain to its terminal type
    ///
    /// The most recent `is_array_default` along the chain fills in a
    /// missing cardinality; the registry entries themselves are never
    /// mutated.
    pub fn resolve_element(&self, spec: &ChildSpec) -> Result<ResolvedElement> {
        let mut default = None;
        let mut current = spec;
        let mut seen: Vec<&QName> = Vec::new();
        loop {
            match current {
                ChildSpec::Ref {
                    name,
                    is_array_default,
                } => {
                    if is_array_default.is_some() {
                        default = *is_array_default;
                    }
                    if seen.contains(&name) {
                        return Err(SchemaError::InvalidSchema(format!(
                            "element reference cycle through '{name}'"
                        )));
                    }
                    seen.push(name);
                    current = self.element(name).ok_or_else(|| SchemaError::UnknownType {
                        name: name.to_string(),
                    })?;
                }
                ChildSpec::Inline {
                    type_name,
                    is_array,
                } => {
                    return Ok(ResolvedElement {
                        type_name: type_name.clone(),
                        is_array: is_array.or(default).unwrap_or(false),
                    });
                }
            }
        }
    }

    /// Chase an attribute's `ref` chain to its terminal type name
    pub fn resolve_attribute(&self, spec: &AttrSpec) -> Result<QName> {
        let mut current = spec;
        let mut seen: Vec<&QName> = Vec::new();
        loop {
            match current {
                AttrSpec::Type(name) => return Ok(name.clone()),
                AttrSpec::Ref(name) => {
                    if seen.contains(&name) {
                        return Err(SchemaError::InvalidSchema(format!(
                            "attribute reference cycle through '{name}'"
                        )));
                    }
                    seen.push(name);
                    current = self.attribute(name).ok_or_else(|| SchemaError::UnknownType {
                        name: name.to_string(),
                    })?;
                }
            }
        }
    }

    /// Collect the value parsers along a type's base chain
    ///
    /// Empty for purely complex types; one entry per member for unions, in
    /// declaration order (trial parsing relies on that order).
    pub fn resolve_to_parse(&self, name: &QName) -> Result<Vec<ValueParser>> {
        let mut out = Vec::new();
        for entry in self.resolve_type(name)? {
            if let TypeEntry::Simple(st) = entry {
                if let Some(parser) = st.parse {
                    out.push(parser);
                }
            }
        }
        Ok(out)
    }

    /// The first non-empty attribute map down the base chain, or empty
    pub fn resolve_to_attributes(&self, name: &QName) -> Result<IndexMap<QName, AttrSpec>> {
        for entry in self.resolve_type(name)? {
            if let TypeEntry::Complex(ct) = entry {
                if !ct.attributes.is_empty() {
                    return Ok(ct.attributes.clone());
                }
            }
        }
        Ok(IndexMap::new())
    }

    /// Pick the child set of the first resolved entry that has one
    ///
    /// `None` means the type accepts any global element; an error means
    /// the element should have been a leaf.
    pub fn try_children<'a>(
        &'a self,
        entries: &[&'a TypeEntry],
    ) -> Option<ChildSet<'a>> {
        for entry in entries {
            if let TypeEntry::Complex(ct) = entry {
                if ct.any_children {
                    return Some(ChildSet::Any);
                }
                if !ct.children.is_empty() {
                    return Some(ChildSet::Children(&ct.children));
                }
            }
        }
        None
    }
}

/// The allowed-children view of a resolved type
#[derive(Debug, Clone, Copy)]
pub enum ChildSet<'a> {
    /// Any global element is allowed (XSD `<any>`)
    Any,
    /// Exactly these declared children
    Children(&'a IndexMap<QName, ChildSpec>),
}

impl<'a> ChildSet<'a> {
    /// Look up a child in this set against the registry's global elements
    pub fn get(&self, registry: &'a SchemaRegistry, name: &QName) -> Option<&'a ChildSpec> {
        match self {
            ChildSet::Any => registry.element(name),
            ChildSet::Children(children) => children.get(name),
        }
    }

    /// Enumerate the allowed child names for error messages
    pub fn allowed(&self, registry: &'a SchemaRegistry) -> Vec<String> {
        match self {
            ChildSet::Any => registry.element_names().map(|q| q.to_string()).collect(),
            ChildSet::Children(children) => children.keys().map(|q| q.to_string()).collect(),
        }
    }
}

/// Complex-type candidates for cardinality collapsing, in resolution order
pub fn complex_candidates<'a>(entries: &[&'a TypeEntry]) -> Vec<&'a ComplexType> {
    entries
        .iter()
        .filter_map(|entry| match entry {
            TypeEntry::Complex(ct) => Some(ct),
            TypeEntry::Simple(_) => None,
        })
        .collect()
}
