//! Registry entry types for compiled schemas

use indexmap::IndexMap;

use crate::builtins::ValueParser;
use crate::qname::QName;

/// A compiled type definition
#[derive(Debug, Clone, PartialEq)]
pub enum TypeEntry {
    Simple(SimpleType),
    Complex(ComplexType),
}

/// A simple type: a base chain ending in a built-in, or a union
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimpleType {
    /// Base types; more than one means a union over member types, empty
    /// means the chain ends here (anySimpleType)
    pub bases: Vec<QName>,
    /// Only built-ins carry a parser; user types inherit through `bases`
    pub parse: Option<ValueParser>,
    pub restriction: bool,
}

/// A complex type: allowed children and attributes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComplexType {
    pub children: IndexMap<QName, ChildSpec>,
    /// Accepts any global element as a child (XSD `<any>`); mutually
    /// exclusive with `children`
    pub any_children: bool,
    /// Cardinality of `<any>` child groups; only meaningful with
    /// `any_children`
    pub is_array: Option<bool>,
    pub attributes: IndexMap<QName, AttrSpec>,
    pub base: Option<QName>,
    pub restriction: bool,
}

/// A child element position inside a complex type, or a global element
#[derive(Debug, Clone, PartialEq)]
pub enum ChildSpec {
    /// By-reference to a global element
    Ref {
        name: QName,
        /// Cardinality inherited from a repeated enclosing compositor,
        /// applied at resolution time when the target has none of its own
        is_array_default: Option<bool>,
    },
    /// Inline declaration with an explicit (or synthesized) type
    Inline {
        type_name: QName,
        is_array: Option<bool>,
    },
}

/// An attribute declaration: a direct type or a reference to a global
/// attribute
#[derive(Debug, Clone, PartialEq)]
pub enum AttrSpec {
    Type(QName),
    Ref(QName),
}

/// The outcome of chasing an element's reference chain
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedElement {
    pub type_name: QName,
    pub is_array: bool,
}
