//! XSD compiler
//!
//! Walks a parsed schema tree and populates the registry with named types,
//! global elements, and global attributes. Compilation is destructive:
//! every recognized construct is removed from the tree, and anything left
//! over at the end is an unsupported XSD construct, reported rather than
//! silently ignored.

use std::collections::HashMap;

use rand::distributions::Alphanumeric;
use rand::Rng;
use xmltree::{Element, XMLNode};

#[cfg(feature = "tracing")]
use tracing::debug;

use crate::error::{Result, SchemaError};
use crate::model::{AttrSpec, ChildSpec, ComplexType, SimpleType, TypeEntry};
use crate::qname::{NameResolver, QName};
use crate::registry::{PendingImports, SchemaRegistry, XSD_NAMESPACE};

/// Facet names recognized (and discarded) inside simple-type restrictions
const FACETS: &[&str] = &[
    "enumeration",
    "pattern",
    "minInclusive",
    "maxInclusive",
    "minExclusive",
    "maxExclusive",
    "length",
    "minLength",
    "maxLength",
    "totalDigits",
    "fractionDigits",
    "whiteSpace",
];

/// Compile one schema body into the registry
///
/// `namespace` is the namespace the caller expects the schema to declare;
/// it must agree with the body's `targetNamespace` when both are present.
///
/// # Returns
///
/// The schema's `<import>`/`<include>` locations keyed by namespace.
pub(crate) fn compile(
    registry: &mut SchemaRegistry,
    namespace: &str,
    body: &[u8],
) -> Result<PendingImports> {
    #[cfg(feature = "tracing")]
    debug!(namespace = %namespace, size = body.len(), "Compiling schema");

    let root = Element::parse(body)?;
    if root.name != "schema" || root.namespace.as_deref() != Some(XSD_NAMESPACE) {
        return Err(SchemaError::InvalidSchema(format!(
            "root element <{}> is not an XSD schema",
            root.name
        )));
    }

    let target = root.attributes.get("targetNamespace").cloned();
    if let Some(declared) = &target {
        if declared != namespace {
            return Err(SchemaError::InvalidSchema(format!(
                "schema declares targetNamespace '{declared}' but was added as '{namespace}'"
            )));
        }
    }

    let mut bindings: HashMap<String, String> = HashMap::new();
    if let Some(namespaces) = &root.namespaces {
        for (prefix, uri) in namespaces.0.iter() {
            if uri.is_empty() || prefix.as_str() == "xmlns" {
                continue;
            }
            bindings.insert(prefix.clone(), uri.clone());
        }
    }
    for (prefix, uri) in &bindings {
        if uri.as_str() == XSD_NAMESPACE || prefix.as_str() == "xml" {
            continue;
        }
        registry.bind_prefix(uri, prefix)?;
    }

    let names = NameResolver::new(bindings, Some(namespace.to_string()));
    let compiler = Compiler {
        registry,
        names,
        pending: PendingImports::new(),
    };
    compiler.run(root)
}

struct Compiler<'a> {
    registry: &'a mut SchemaRegistry,
    names: NameResolver,
    pending: PendingImports,
}

impl Compiler<'_> {
    fn run(mut self, mut root: Element) -> Result<PendingImports> {
        self.collect_imports(&mut root)?;
        for el in take_children(&mut root, "element") {
            self.global_element(el)?;
        }
        for el in take_children(&mut root, "attribute") {
            self.global_attribute(el)?;
        }
        for el in take_children(&mut root, "complexType") {
            let name = required_attr(&el, "name")?;
            let qname = self.names.qualify(&name);
            self.complex_type(qname, el)?;
        }
        for el in take_children(&mut root, "simpleType") {
            let name = required_attr(&el, "name")?;
            let qname = self.names.qualify(&name);
            self.simple_type(qname, el)?;
        }
        take_children(&mut root, "annotation");
        expect_consumed(&root)?;

        #[cfg(feature = "tracing")]
        debug!(pending = self.pending.len(), "Schema compiled");

        Ok(self.pending)
    }

    /// Consume `<import>` and `<include>` into the pending-import map
    fn collect_imports(&mut self, root: &mut Element) -> Result<()> {
        for import in take_children(root, "import") {
            let namespace = required_attr(&import, "namespace")?;
            // An import without a location hint cannot be acquired here;
            // the caller must add that schema directly.
            if let Some(location) = import.attributes.get("schemaLocation") {
                self.pending.insert(namespace, location.clone());
            }
        }
        for include in take_children(root, "include") {
            let location = required_attr(&include, "schemaLocation")?;
            let target = self
                .names
                .target_namespace()
                .ok_or_else(|| {
                    SchemaError::InvalidSchema("<include> in a schema without a namespace".into())
                })?
                .to_string();
            self.pending.insert(target, location);
        }
        Ok(())
    }

    fn global_element(&mut self, mut el: Element) -> Result<()> {
        take_children(&mut el, "annotation");
        if let Some(reference) = el.attributes.get("ref").cloned() {
            let name = self.names.resolve(&reference)?;
            expect_consumed(&el)?;
            return self.registry.insert_element(
                name.clone(),
                ChildSpec::Ref {
                    name,
                    is_array_default: None,
                },
            );
        }

        let name = required_attr(&el, "name")?;
        let qname = self.names.qualify(&name);
        let is_array = is_array_attr(&el);
        let type_name = self.element_type(&qname, &mut el)?;
        expect_consumed(&el)?;
        self.registry.insert_element(
            qname,
            ChildSpec::Inline {
                type_name,
                is_array,
            },
        )
    }

    /// Resolve an element's `type` attribute, or promote an inline
    /// anonymous type under a synthesized name
    fn element_type(&mut self, qname: &QName, el: &mut Element) -> Result<QName> {
        if let Some(type_ref) = el.attributes.get("type").cloned() {
            return self.names.resolve(&type_ref);
        }
        if let Some(nested) = take_first_child(el, "complexType") {
            let synthesized = self.synthesize_type_name(qname);
            self.complex_type(synthesized.clone(), nested)?;
            return Ok(synthesized);
        }
        if let Some(nested) = take_first_child(el, "simpleType") {
            let synthesized = self.synthesize_type_name(qname);
            self.simple_type(synthesized.clone(), nested)?;
            return Ok(synthesized);
        }
        Err(SchemaError::InvalidSchema(format!(
            "element '{qname}' has neither a type nor an inline type definition"
        )))
    }

    fn global_attribute(&mut self, mut el: Element) -> Result<()> {
        take_children(&mut el, "annotation");
        if let Some(reference) = el.attributes.get("ref").cloned() {
            let name = self.names.resolve(&reference)?;
            expect_consumed(&el)?;
            return self.registry.insert_attribute(name.clone(), AttrSpec::Ref(name));
        }

        let name = required_attr(&el, "name")?;
        let qname = self.names.qualify(&name);
        let spec = if let Some(type_ref) = el.attributes.get("type").cloned() {
            AttrSpec::Type(self.names.resolve(&type_ref)?)
        } else if let Some(nested) = take_first_child(&mut el, "simpleType") {
            let synthesized = self.synthesize_type_name(&qname);
            self.simple_type(synthesized.clone(), nested)?;
            AttrSpec::Type(synthesized)
        } else {
            AttrSpec::Type(QName::local("anySimpleType"))
        };
        expect_consumed(&el)?;
        self.registry.insert_attribute(qname, spec)
    }

    fn complex_type(&mut self, qname: QName, mut el: Element) -> Result<()> {
        let mut ct = ComplexType::default();
        take_children(&mut el, "annotation");

        let simple_content = take_first_child(&mut el, "simpleContent");
        let complex_content = take_first_child(&mut el, "complexContent");
        if simple_content.is_some() && complex_content.is_some() {
            return Err(SchemaError::InvalidSchema(format!(
                "type '{qname}' mixes simpleContent and complexContent"
            )));
        }
        if let Some(mut content) = simple_content.or(complex_content) {
            self.content_body(&qname, &mut content, &mut ct)?;
            take_children(&mut content, "annotation");
            expect_consumed(&content)?;
        }

        if let Some(sequence) = take_first_child(&mut el, "sequence") {
            self.sequence(&qname, sequence, &mut ct)?;
        }
        if let Some(choice) = take_first_child(&mut el, "choice") {
            self.choice(&qname, choice, &mut ct, None)?;
        }
        self.collect_attributes(&qname, &mut el, &mut ct)?;
        take_children(&mut el, "attributeGroup");
        take_children(&mut el, "group");
        expect_consumed(&el)?;

        if ct.any_children && !ct.children.is_empty() {
            return Err(SchemaError::InvalidSchema(format!(
                "type '{qname}' declares both <any> and named children"
            )));
        }
        self.registry.insert_type(qname, TypeEntry::Complex(ct))
    }

    /// Process the `<restriction>`/`<extension>` body of a content element
    fn content_body(
        &mut self,
        qname: &QName,
        content: &mut Element,
        ct: &mut ComplexType,
    ) -> Result<()> {
        let (mut body, restriction) = match take_first_child(content, "restriction") {
            Some(body) => (body, true),
            None => {
                let body = take_first_child(content, "extension").ok_or_else(|| {
                    SchemaError::InvalidSchema(format!(
                        "content of type '{qname}' has neither restriction nor extension"
                    ))
                })?;
                (body, false)
            }
        };
        ct.restriction = restriction;
        if let Some(base_ref) = body.attributes.get("base").cloned() {
            let base = self.names.resolve(&base_ref)?;
            if !(base.is_builtin() && base.local == "anyType") {
                ct.base = Some(base);
            }
        }
        take_children(&mut body, "annotation");
        if let Some(sequence) = take_first_child(&mut body, "sequence") {
            self.sequence(qname, sequence, ct)?;
        }
        self.collect_attributes(qname, &mut body, ct)?;
        take_children(&mut body, "attributeGroup");
        expect_consumed(&body)?;
        Ok(())
    }

    fn sequence(&mut self, qname: &QName, mut seq: Element, ct: &mut ComplexType) -> Result<()> {
        // A repeated container makes its unadorned children arrays
        let default = is_array_attr(&seq).filter(|a| *a);
        take_children(&mut seq, "annotation");
        for child in take_children(&mut seq, "element") {
            self.child_element(child, ct, default)?;
        }
        if let Some(choice) = take_first_child(&mut seq, "choice") {
            self.choice(qname, choice, ct, default)?;
        }
        if let Some(mut any) = take_first_child(&mut seq, "any") {
            ct.any_children = true;
            // The <any>'s own maxOccurs wins; absence inherits the default
            ct.is_array = is_array_attr(&any).or(default);
            take_children(&mut any, "annotation");
            expect_consumed(&any)?;
        }
        expect_consumed(&seq)?;
        Ok(())
    }

    fn choice(
        &mut self,
        _qname: &QName,
        mut choice: Element,
        ct: &mut ComplexType,
        outer_default: Option<bool>,
    ) -> Result<()> {
        let default = is_array_attr(&choice).filter(|a| *a).or(outer_default);
        take_children(&mut choice, "annotation");
        for child in take_children(&mut choice, "element") {
            self.child_element(child, ct, default)?;
        }
        expect_consumed(&choice)?;
        Ok(())
    }

    fn child_element(
        &mut self,
        mut el: Element,
        ct: &mut ComplexType,
        default: Option<bool>,
    ) -> Result<()> {
        take_children(&mut el, "annotation");
        let own = is_array_attr(&el);
        if let Some(reference) = el.attributes.get("ref").cloned() {
            let name = self.names.resolve(&reference)?;
            expect_consumed(&el)?;
            ct.children.insert(
                name.clone(),
                ChildSpec::Ref {
                    name,
                    is_array_default: own.or(default),
                },
            );
            return Ok(());
        }

        let name = required_attr(&el, "name")?;
        let qname = self.names.qualify(&name);
        let type_name = self.element_type(&qname, &mut el)?;
        expect_consumed(&el)?;
        ct.children.insert(
            qname,
            ChildSpec::Inline {
                type_name,
                is_array: own.or(default),
            },
        );
        Ok(())
    }

    fn collect_attributes(
        &mut self,
        _qname: &QName,
        parent: &mut Element,
        ct: &mut ComplexType,
    ) -> Result<()> {
        for mut attr in take_children(parent, "attribute") {
            take_children(&mut attr, "annotation");
            if let Some(reference) = attr.attributes.get("ref").cloned() {
                let name = self.names.resolve(&reference)?;
                expect_consumed(&attr)?;
                ct.attributes.insert(name.clone(), AttrSpec::Ref(name));
                continue;
            }
            let name = required_attr(&attr, "name")?;
            let attr_qname = self.names.qualify(&name);
            let spec = if let Some(type_ref) = attr.attributes.get("type").cloned() {
                AttrSpec::Type(self.names.resolve(&type_ref)?)
            } else if let Some(nested) = take_first_child(&mut attr, "simpleType") {
                let synthesized = self.synthesize_type_name(&attr_qname);
                self.simple_type(synthesized.clone(), nested)?;
                AttrSpec::Type(synthesized)
            } else {
                AttrSpec::Type(QName::local("anySimpleType"))
            };
            expect_consumed(&attr)?;
            ct.attributes.insert(attr_qname, spec);
        }
        Ok(())
    }

    fn simple_type(&mut self, qname: QName, mut el: Element) -> Result<()> {
        let mut st = SimpleType::default();
        take_children(&mut el, "annotation");

        if let Some(mut restriction) = take_first_child(&mut el, "restriction") {
            st.restriction = true;
            if let Some(base_ref) = restriction.attributes.get("base").cloned() {
                let base = self.names.resolve(&base_ref)?;
                if !(base.is_builtin() && base.local == "anySimpleType") {
                    st.bases.push(base);
                }
            }
            // Facet predicates are recorded nowhere; only the base chain
            // survives compilation
            for facet in FACETS {
                take_children(&mut restriction, facet);
            }
            take_children(&mut restriction, "annotation");
            expect_consumed(&restriction)?;
        } else if let Some(union) = take_first_child(&mut el, "union") {
            let members = required_attr(&union, "memberTypes")?;
            for member in members.split_whitespace() {
                st.bases.push(self.names.resolve(member)?);
            }
            expect_consumed(&union)?;
        } else {
            expect_consumed(&el)?;
            return Err(SchemaError::InvalidSchema(format!(
                "simple type '{qname}' has neither restriction nor union"
            )));
        }

        expect_consumed(&el)?;
        self.registry.insert_type(qname, TypeEntry::Simple(st))
    }

    /// Promote an anonymous inline type under `<elem-qname>-type-<suffix>`
    fn synthesize_type_name(&self, owner: &QName) -> QName {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(8)
            .map(char::from)
            .collect();
        let local = format!("{}-type-{}", owner.local, suffix);
        match &owner.namespace {
            Some(uri) => QName::new(uri.clone(), local),
            None => QName::local(local),
        }
    }
}

/// Remove and return all direct children with the given XSD local name
fn take_children(parent: &mut Element, name: &str) -> Vec<Element> {
    let mut taken = Vec::new();
    let mut rest = Vec::new();
    for node in std::mem::take(&mut parent.children) {
        match node {
            XMLNode::Element(el)
                if el.name == name && el.namespace.as_deref() == Some(XSD_NAMESPACE) =>
            {
                taken.push(el)
            }
            other => rest.push(other),
        }
    }
    parent.children = rest;
    taken
}

/// Remove and return the first direct child with the given XSD local name
fn take_first_child(parent: &mut Element, name: &str) -> Option<Element> {
    let index = parent.children.iter().position(|node| {
        matches!(node.as_element(),
            Some(el) if el.name == name && el.namespace.as_deref() == Some(XSD_NAMESPACE))
    })?;
    match parent.children.remove(index) {
        XMLNode::Element(el) => Some(el),
        _ => None,
    }
}

/// Assert that compilation consumed every element child
fn expect_consumed(el: &Element) -> Result<()> {
    for node in &el.children {
        if let Some(residual) = node.as_element() {
            return Err(SchemaError::UnsupportedSchema {
                residual: residual.name.clone(),
            });
        }
    }
    Ok(())
}

fn required_attr(el: &Element, name: &str) -> Result<String> {
    el.attributes.get(name).cloned().ok_or_else(|| {
        SchemaError::InvalidSchema(format!(
            "<{}> is missing required attribute '{}'",
            el.name, name
        ))
    })
}

/// Collapse `maxOccurs` into the binary sequence-vs-singleton decision
///
/// Only `"unbounded"` makes a sequence; a bounded count keeps the
/// singleton shape, so a lone occurrence collapses in the output.
fn is_array_attr(el: &Element) -> Option<bool> {
    el.attributes
        .get("maxOccurs")
        .map(|value| value == "unbounded")
}
