//! Schema acquisition driver
//!
//! Finds `xsi:schemaLocation` hints in a document, fetches the referenced
//! schemas, and keeps satisfying their imports breadth-first until the
//! closure is complete. Cycles are broken by the registry's parsed and
//! downloaded markers, so overlapping imports converge regardless of
//! arrival order.

use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;

use schemus_xsd::{PendingImports, SchemaRegistry, XSI_NAMESPACE};

use crate::error::{ParseError, ParseResult};
use crate::fetch::SchemaFetcher;

#[cfg(feature = "tracing")]
use tracing::{debug, info};

/// Collect `xsi:schemaLocation` hints from a document
///
/// Each attribute must hold exactly one `namespace location` pair.
pub(crate) fn collect_schema_locations(xml: &str) -> ParseResult<PendingImports> {
    let mut reader = NsReader::from_str(xml);
    reader.config_mut().expand_empty_elements = true;

    let mut hints = PendingImports::new();
    loop {
        let (_, event) = reader.read_resolved_event()?;
        match event {
            Event::Start(start) => {
                for attr in start.attributes() {
                    let attr = attr?;
                    let (resolution, local) = reader.resolve_attribute(attr.key);
                    let is_xsi = matches!(
                        resolution,
                        ResolveResult::Bound(Namespace(uri)) if uri == XSI_NAMESPACE.as_bytes()
                    );
                    if !is_xsi || local.as_ref() != b"schemaLocation" {
                        continue;
                    }
                    let value = attr.unescape_value()?;
                    let tokens: Vec<&str> = value.split_whitespace().collect();
                    if tokens.len() != 2 {
                        return Err(ParseError::InvalidDocument(format!(
                            "xsi:schemaLocation must hold one namespace/location pair, \
                             found {} tokens",
                            tokens.len()
                        )));
                    }
                    hints.insert(tokens[0].to_string(), tokens[1].to_string());
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(hints)
}

/// Satisfy every schema hint in the document, transitively
///
/// With downloading disabled this only checks that each hinted namespace is
/// already in the registry. With downloading enabled it iterates
/// breadth-first over the pending set, committing each fetched schema and
/// merging its imports back into the work set until it drains.
pub(crate) async fn populate_schemas(
    registry: &mut SchemaRegistry,
    fetcher: Option<&dyn SchemaFetcher>,
    download: bool,
    xml: &str,
) -> ParseResult<()> {
    let mut pending = collect_schema_locations(xml)?;
    if pending.is_empty() {
        return Ok(());
    }

    if !download {
        for (uri, _) in pending.iter() {
            if !registry.has_namespace(uri) {
                return Err(ParseError::MissingSchema { uri: uri.clone() });
            }
        }
        return Ok(());
    }

    let fetcher = fetcher.ok_or_else(|| {
        ParseError::InvalidConfig(
            "schema downloading is enabled but no fetcher is configured".to_string(),
        )
    })?;

    while let Some((uri, urls)) = pending.pop() {
        if urls.len() > 1 {
            return Err(ParseError::MismatchedSchemaLocation { uri, urls });
        }
        let Some(url) = urls.into_iter().next() else {
            continue;
        };
        if registry.is_downloaded(&uri, &url) {
            continue;
        }
        if registry.has_namespace(&uri) {
            continue;
        }
        let imports = download_and_add(registry, fetcher, &uri, &url).await?;
        pending.merge(imports);
    }

    #[cfg(feature = "tracing")]
    debug!("Schema closure complete");

    Ok(())
}

/// Fetch one schema and commit it under its namespace
pub(crate) async fn download_and_add(
    registry: &mut SchemaRegistry,
    fetcher: &dyn SchemaFetcher,
    uri: &str,
    url: &str,
) -> ParseResult<PendingImports> {
    #[cfg(feature = "tracing")]
    info!(namespace = %uri, url = %url, "Downloading schema");

    let body = fetcher
        .fetch(url)
        .await
        .map_err(|source| ParseError::Fetch {
            uri: uri.to_string(),
            url: url.to_string(),
            source: Box::new(source),
        })?;
    let imports = registry.add_schema(uri, &body)?;
    registry.mark_downloaded(uri, url);
    Ok(imports)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_hint_pairs() {
        let hints = collect_schema_locations(
            r#"<doc xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
                    xsi:schemaLocation="http://example.com/a http://example.com/a.xsd"/>"#,
        )
        .unwrap();
        assert_eq!(
            hints.get(&"http://example.com/a".to_string()),
            Some(&["http://example.com/a.xsd".to_string()][..])
        );
    }

    #[test]
    fn rejects_odd_token_counts() {
        let err = collect_schema_locations(
            r#"<doc xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
                    xsi:schemaLocation="http://example.com/a http://example.com/a.xsd extra"/>"#,
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::InvalidDocument(_)));
    }

    #[test]
    fn hints_on_nested_elements_are_found() {
        let hints = collect_schema_locations(
            r#"<doc>
                 <inner xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
                        xsi:schemaLocation="http://example.com/b http://example.com/b.xsd"/>
               </doc>"#,
        )
        .unwrap();
        assert!(hints.contains_key(&"http://example.com/b".to_string()));
    }
}
