//! Streaming document walker
//!
//! Reads the document with a namespace-aware event reader, builds the
//! generic node for each element (attributes, character content, namespace
//! info, child groups as ordered lists), and hands every node bottom-up to
//! the validator as its end tag arrives.

use indexmap::IndexMap;
use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;

use schemus_xsd::{QName, SchemaRegistry, Value};

use crate::error::{ParseError, ParseResult};
use crate::validate;
use crate::ParserOptions;

/// One open element on the parse stack
struct Frame {
    local: String,
    uri: Option<String>,
    attrs: IndexMap<String, Value>,
    text: String,
    /// Child groups keyed by the canonical `uri|local` name
    groups: IndexMap<String, Vec<Value>>,
    has_element_children: bool,
}

/// Parse and validate a document against the registry
///
/// # Returns
///
/// The normalized tree, rooted under the document element's output name.
pub(crate) fn parse_document(
    registry: &SchemaRegistry,
    options: &ParserOptions,
    xml: &str,
) -> ParseResult<Value> {
    let mut reader = NsReader::from_str(xml);
    reader.config_mut().expand_empty_elements = true;

    let mut frames: Vec<Frame> = Vec::new();
    let mut root: Option<(String, Option<String>, Value)> = None;

    loop {
        let (resolution, event) = reader.read_resolved_event()?;
        let element_uri = match resolution {
            ResolveResult::Bound(Namespace(uri)) => {
                Some(String::from_utf8_lossy(uri).into_owned())
            }
            ResolveResult::Unbound => None,
            ResolveResult::Unknown(prefix) => {
                return Err(ParseError::InvalidDocument(format!(
                    "undeclared namespace prefix '{}'",
                    String::from_utf8_lossy(&prefix)
                )))
            }
        };

        match event {
            Event::Start(start) => {
                let local = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
                let mut attrs = IndexMap::new();
                for attr in start.attributes() {
                    let attr = attr?;
                    let raw_name = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                    let (attr_resolution, attr_local) = reader.resolve_attribute(attr.key);
                    let attr_uri = match attr_resolution {
                        ResolveResult::Bound(Namespace(uri)) => {
                            Some(String::from_utf8_lossy(uri).into_owned())
                        }
                        _ => None,
                    };
                    let value = attr.unescape_value()?.into_owned();
                    let mut entry = IndexMap::new();
                    entry.insert("value".to_string(), Value::String(value));
                    entry.insert(
                        "local".to_string(),
                        Value::String(
                            String::from_utf8_lossy(attr_local.as_ref()).into_owned(),
                        ),
                    );
                    if let Some(uri) = attr_uri {
                        entry.insert("uri".to_string(), Value::String(uri));
                    }
                    attrs.insert(raw_name, Value::Map(entry));
                }
                frames.push(Frame {
                    local,
                    uri: element_uri,
                    attrs,
                    text: String::new(),
                    groups: IndexMap::new(),
                    has_element_children: false,
                });
            }
            Event::Text(text) => {
                if let Some(frame) = frames.last_mut() {
                    frame.text.push_str(&text.unescape()?);
                }
            }
            Event::CData(cdata) => {
                if let Some(frame) = frames.last_mut() {
                    frame
                        .text
                        .push_str(&String::from_utf8_lossy(&cdata.into_inner()));
                }
            }
            Event::End(_) => {
                let frame = frames.pop().ok_or_else(|| {
                    ParseError::InvalidDocument("unbalanced end tag".to_string())
                })?;
                let local = frame.local.clone();
                let uri = frame.uri.clone();
                let node = build_node(options, frame);
                let ancestors: Vec<(String, Option<String>)> = frames
                    .iter()
                    .map(|f| (f.local.clone(), f.uri.clone()))
                    .collect();
                let validated = validate::validate_element(registry, options, &ancestors, node)?;
                if let Some(parent) = frames.last_mut() {
                    parent.has_element_children = true;
                    let key = canonical_key(uri.as_deref(), &local);
                    parent.groups.entry(key).or_default().push(validated);
                } else {
                    root = Some((local, uri, validated));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let (local, uri, value) = root.ok_or_else(|| {
        ParseError::InvalidDocument("document has no root element".to_string())
    })?;
    let key = validate::output_name(registry, options, uri.as_deref(), &local);
    let mut out = IndexMap::new();
    out.insert(key, value);
    Ok(Value::Map(out))
}

/// Assemble the generic node handed to the validator
fn build_node(options: &ParserOptions, frame: Frame) -> Value {
    let Frame {
        local,
        uri,
        attrs,
        text,
        groups,
        has_element_children,
    } = frame;

    let mut map = IndexMap::new();
    let mut ns = IndexMap::new();
    ns.insert("local".to_string(), Value::String(local));
    if let Some(uri) = uri {
        ns.insert("uri".to_string(), Value::String(uri));
    }
    map.insert(options.xmlnskey.clone(), Value::Map(ns));

    if !attrs.is_empty() {
        map.insert(options.attrkey.clone(), Value::Map(attrs));
    }
    if has_element_children {
        // Mixed content only; whitespace between children is dropped later
        if !text.trim().is_empty() {
            map.insert(options.charkey.clone(), Value::String(text));
        }
    } else {
        map.insert(options.charkey.clone(), Value::String(text));
    }
    for (key, group) in groups {
        map.insert(key, Value::Seq(group));
    }
    Value::Map(map)
}

fn canonical_key(uri: Option<&str>, local: &str) -> String {
    match uri {
        Some(uri) => QName::new(uri, local).canonical(),
        None => local.to_string(),
    }
}
