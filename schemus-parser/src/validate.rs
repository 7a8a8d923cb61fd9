//! Validator and normalizer
//!
//! Invoked once per element, bottom-up, from the document walker. Each
//! invocation resolves the namespaced path against the registry, checks
//! allowed children and attributes, coerces simple values through the
//! built-in parsers, and collapses child groups that the schema declares
//! as single-valued.

use indexmap::IndexMap;

use schemus_xsd::{
    complex_candidates, ChildSet, ComplexType, QName, SchemaError, SchemaRegistry, Value,
    ValueParser, XSI_NAMESPACE,
};

use crate::error::{ParseError, ParseResult};
use crate::ParserOptions;

/// Validate and normalize one element's value
///
/// `ancestors` is the stack of enclosing elements as `(local, uri)` pairs,
/// outermost first; the element's own name and namespace travel inside the
/// node under the reserved namespace key, which is stripped from the
/// returned value.
pub(crate) fn validate_element(
    registry: &SchemaRegistry,
    options: &ParserOptions,
    ancestors: &[(String, Option<String>)],
    node: Value,
) -> ParseResult<Value> {
    let Value::Map(mut map) = node else {
        return Err(ParseError::SchemaMismatch {
            path: generic_path(ancestors, "?"),
            reason: "element node is not an object".to_string(),
        });
    };

    // The walker records the element's own name under the namespace key
    let ns_info = map.shift_remove(&options.xmlnskey);
    let (local, uri) = match &ns_info {
        Some(info) => (
            info.get("local")
                .and_then(Value::as_str)
                .unwrap_or("?")
                .to_string(),
            info.get("uri").and_then(Value::as_str).map(str::to_string),
        ),
        None => ("?".to_string(), None),
    };

    // 1. Namespaced path reconstruction
    let mut segments: Vec<(String, Option<String>)> = ancestors.to_vec();
    segments.push((local.clone(), uri.clone()));
    let qpath = qualified_path(registry, &segments)?;

    // 2. Descent from the global-elements map
    let mut scope = ChildSet::Any;
    for (index, (seg_local, seg_uri)) in segments[..segments.len() - 1].iter().enumerate() {
        let qname = to_qname(seg_local, seg_uri.as_deref());
        let partial = qualified_path(registry, &segments[..=index])?;
        let spec = scope.get(registry, &qname).ok_or_else(|| {
            ParseError::UnknownElement {
                path: partial.clone(),
                allowed: scope.allowed(registry).join(", "),
            }
        })?;
        let resolved = registry.resolve_element(spec)?;
        let entries = registry.resolve_type(&resolved.type_name)?;
        scope = registry
            .try_children(&entries)
            .ok_or(ParseError::UnexpectedChildren { path: partial })?;
    }

    // 3. Leaf lookup
    let qname = to_qname(&local, uri.as_deref());
    let spec = scope
        .get(registry, &qname)
        .ok_or_else(|| ParseError::UnknownElement {
            path: qpath.clone(),
            allowed: scope.allowed(registry).join(", "),
        })?;
    let resolved = registry.resolve_element(spec)?;
    let entries = registry.resolve_type(&resolved.type_name)?;

    // 4. Attribute handling
    let attrs = match map.shift_remove(&options.attrkey) {
        Some(Value::Map(attrs)) => {
            coerce_attributes(registry, options, &resolved.type_name, &qname, attrs, &qpath)?
        }
        _ => IndexMap::new(),
    };

    // 5. Character/child coercion
    let mut parsers = registry.resolve_to_parse(&resolved.type_name)?;
    let candidates = complex_candidates(&entries);
    if parsers.is_empty() && candidates.is_empty() {
        // Simple chain ending in anySimpleType: keep the string
        parsers.push(ValueParser::Identity);
    }

    if !parsers.is_empty() {
        let has_groups = map.keys().any(|key| key != &options.charkey);
        if has_groups {
            return Err(ParseError::SchemaMismatch {
                path: qpath,
                reason: "element children under a simple-typed element".to_string(),
            });
        }
        let raw = map
            .get(&options.charkey)
            .and_then(Value::as_str)
            .unwrap_or("");
        let parsed = try_parse(&parsers, raw, &qpath)?;
        if attrs.is_empty() {
            return Ok(parsed);
        }
        let mut out = IndexMap::new();
        out.insert(options.attrkey.clone(), Value::Map(attrs));
        out.insert(options.charkey.clone(), parsed);
        return Ok(Value::Map(out));
    }

    let collapsed = try_remove_arrays(registry, options, &candidates, &map, &qpath)?;
    let mut out = IndexMap::new();
    if !attrs.is_empty() {
        out.insert(options.attrkey.clone(), Value::Map(attrs));
    }
    out.extend(collapsed);
    Ok(Value::Map(out))
}

/// Filter, qualify, and coerce an element's attributes
fn coerce_attributes(
    registry: &SchemaRegistry,
    options: &ParserOptions,
    type_name: &QName,
    element: &QName,
    attrs: IndexMap<String, Value>,
    qpath: &str,
) -> ParseResult<IndexMap<String, Value>> {
    let allowed = registry.resolve_to_attributes(type_name)?;
    let mut out = IndexMap::new();
    for (raw_name, raw_value) in attrs {
        // Namespace declarations and xsi wiring are not content
        if raw_name.starts_with("xmlns") || raw_name.starts_with("xsi:") {
            continue;
        }
        let (attr_local, attr_uri, raw) = attribute_parts(&raw_name, &raw_value, qpath)?;
        if attr_uri.as_deref() == Some(XSI_NAMESPACE) {
            continue;
        }

        let mut chosen = to_qname(&attr_local, attr_uri.as_deref());
        let mut spec = allowed.get(&chosen);
        if spec.is_none() && attr_uri.is_none() {
            // Unqualified attributes fall back to the element's namespace
            if let Some(element_uri) = &element.namespace {
                let fallback = QName::new(element_uri.clone(), attr_local.clone());
                if let Some(found) = allowed.get(&fallback) {
                    spec = Some(found);
                    chosen = fallback;
                }
            }
        }
        let spec = spec.ok_or_else(|| ParseError::UnexpectedAttribute {
            name: attr_local.clone(),
            path: qpath.to_string(),
            allowed: allowed
                .keys()
                .map(|q| q.to_string())
                .collect::<Vec<_>>()
                .join(", "),
        })?;

        let attr_type = registry.resolve_attribute(spec)?;
        let mut parsers = registry.resolve_to_parse(&attr_type)?;
        if parsers.is_empty() {
            parsers.push(ValueParser::Identity);
        }
        let parsed = try_parse(&parsers, &raw, qpath)?;
        let out_name = output_name(registry, options, chosen.namespace.as_deref(), &chosen.local);
        out.insert(out_name, parsed);
    }
    Ok(out)
}

/// Split an attribute into its local name, namespace, and raw value
///
/// The walker hands attributes over as `{value, local, uri}` objects; a
/// bare string is accepted for callers that skip namespace tracking.
fn attribute_parts(
    raw_name: &str,
    raw_value: &Value,
    qpath: &str,
) -> ParseResult<(String, Option<String>, String)> {
    match raw_value {
        Value::String(s) => {
            let local = raw_name
                .split_once(':')
                .map(|(_, local)| local)
                .unwrap_or(raw_name);
            Ok((local.to_string(), None, s.clone()))
        }
        Value::Map(m) => {
            let local = m
                .get("local")
                .and_then(Value::as_str)
                .unwrap_or(raw_name)
                .to_string();
            let uri = m.get("uri").and_then(Value::as_str).map(str::to_string);
            let value = m
                .get("value")
                .and_then(Value::as_str)
                .ok_or_else(|| ParseError::SchemaMismatch {
                    path: qpath.to_string(),
                    reason: format!("attribute '{raw_name}' has no value"),
                })?
                .to_string();
            Ok((local, uri, value))
        }
        _ => Err(ParseError::SchemaMismatch {
            path: qpath.to_string(),
            reason: format!("attribute '{raw_name}' has an unexpected shape"),
        }),
    }
}

/// Try each parser in order on its own copy of the input
///
/// Returns the first success; when every branch fails, the last captured
/// error is surfaced with the element's path attached.
fn try_parse(parsers: &[ValueParser], raw: &str, qpath: &str) -> ParseResult<Value> {
    let mut last_err: Option<SchemaError> = None;
    for parser in parsers {
        match parser.parse(raw) {
            Ok(value) => return Ok(value),
            Err(err) => last_err = Some(err),
        }
    }
    match last_err {
        Some(source) => Err(ParseError::Coercion {
            path: qpath.to_string(),
            source,
        }),
        None => Err(ParseError::SchemaMismatch {
            path: qpath.to_string(),
            reason: "no parser available for simple value".to_string(),
        }),
    }
}

/// Collapse child groups to singletons where the schema says not-array
///
/// Candidate types are tried in resolution order on a fresh copy each, so
/// a failed trial cannot corrupt the next one.
fn try_remove_arrays(
    registry: &SchemaRegistry,
    options: &ParserOptions,
    candidates: &[&ComplexType],
    map: &IndexMap<String, Value>,
    qpath: &str,
) -> ParseResult<IndexMap<String, Value>> {
    let has_groups = map.keys().any(|key| key != &options.charkey);
    if candidates.is_empty() {
        if has_groups {
            return Err(ParseError::SchemaMismatch {
                path: qpath.to_string(),
                reason: "element children under a type without children".to_string(),
            });
        }
        return Ok(map.clone());
    }

    let mut last_err = None;
    for candidate in candidates.iter().copied() {
        match remove_arrays_once(registry, options, candidate, map.clone(), qpath) {
            Ok(collapsed) => return Ok(collapsed),
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| ParseError::SchemaMismatch {
        path: qpath.to_string(),
        reason: "no candidate type matched".to_string(),
    }))
}

fn remove_arrays_once(
    registry: &SchemaRegistry,
    options: &ParserOptions,
    candidate: &ComplexType,
    map: IndexMap<String, Value>,
    qpath: &str,
) -> ParseResult<IndexMap<String, Value>> {
    let mut out = IndexMap::new();
    for (key, value) in map {
        if key == options.charkey {
            // Whitespace-only mixed content is noise between child elements
            let keep = value
                .as_str()
                .map(|s| !s.trim().is_empty())
                .unwrap_or(true);
            if keep {
                out.insert(key, value);
            }
            continue;
        }

        let qname = QName::from_canonical(&key);
        let child_path = format!("{}/{}", qpath, path_segment(registry, &qname));
        let is_array = if candidate.any_children {
            if registry.element(&qname).is_none() {
                return Err(ParseError::UnknownElement {
                    path: child_path,
                    allowed: registry
                        .element_names()
                        .map(|q| q.to_string())
                        .collect::<Vec<_>>()
                        .join(", "),
                });
            }
            candidate.is_array.unwrap_or(false)
        } else {
            let spec = candidate.children.get(&qname).ok_or_else(|| {
                ParseError::UnknownElement {
                    path: child_path.clone(),
                    allowed: candidate
                        .children
                        .keys()
                        .map(|q| q.to_string())
                        .collect::<Vec<_>>()
                        .join(", "),
                }
            })?;
            registry.resolve_element(spec)?.is_array
        };

        let Value::Seq(items) = value else {
            return Err(ParseError::SchemaMismatch {
                path: child_path,
                reason: "child group is not a sequence".to_string(),
            });
        };
        let collapsed = if is_array {
            Value::Seq(items)
        } else {
            let mut iter = items.into_iter();
            match (iter.next(), iter.next()) {
                (Some(single), None) => single,
                (first, _) => {
                    let count = 1 + iter.count() + usize::from(first.is_some());
                    return Err(ParseError::SchemaMismatch {
                        path: child_path,
                        reason: format!(
                            "element occurs {count} times but the schema allows one"
                        ),
                    });
                }
            }
        };
        let out_key = output_name(registry, options, qname.namespace.as_deref(), &qname.local);
        out.insert(out_key, collapsed);
    }
    Ok(out)
}

/// The key an element or attribute gets in the normalized output
pub(crate) fn output_name(
    registry: &SchemaRegistry,
    options: &ParserOptions,
    namespace: Option<&str>,
    local: &str,
) -> String {
    if options.output_with_namespace {
        if let Some(uri) = namespace {
            if let Some(prefix) = registry.prefix_for(uri) {
                if !prefix.is_empty() {
                    return format!("{prefix}:{local}");
                }
            }
        }
    }
    local.to_string()
}

fn to_qname(local: &str, uri: Option<&str>) -> QName {
    match uri {
        Some(uri) => QName::new(uri, local),
        None => QName::local(local),
    }
}

/// Rebuild the slash-separated path with registry prefixes
fn qualified_path(
    registry: &SchemaRegistry,
    segments: &[(String, Option<String>)],
) -> ParseResult<String> {
    let mut parts = Vec::with_capacity(segments.len());
    for (local, uri) in segments {
        match uri {
            Some(uri) => {
                let prefix = registry.prefix_for(uri).ok_or_else(|| {
                    ParseError::UnknownNamespace {
                        uri: uri.clone(),
                        path: generic_path(&segments[..segments.len() - 1], local),
                    }
                })?;
                if prefix.is_empty() {
                    parts.push(local.clone());
                } else {
                    parts.push(format!("{prefix}:{local}"));
                }
            }
            None => parts.push(local.clone()),
        }
    }
    Ok(parts.join("/"))
}

fn path_segment(registry: &SchemaRegistry, qname: &QName) -> String {
    match &qname.namespace {
        Some(uri) => match registry.prefix_for(uri) {
            Some(prefix) if !prefix.is_empty() => format!("{}:{}", prefix, qname.local),
            _ => qname.local.clone(),
        },
        None => qname.local.clone(),
    }
}

fn generic_path(ancestors: &[(String, Option<String>)], local: &str) -> String {
    let mut parts: Vec<&str> = ancestors.iter().map(|(l, _)| l.as_str()).collect();
    parts.push(local);
    parts.join("/")
}
