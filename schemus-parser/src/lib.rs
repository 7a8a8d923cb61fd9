//! # Schema-validating XML parser
//!
//! Parses XML documents against compiled XML Schemas and produces typed,
//! structurally-normalized value trees: textual leaves are coerced to
//! native values (numbers, booleans, UTC instants, byte arrays) and child
//! groups are collapsed to singletons or kept as sequences according to the
//! schema's declared cardinalities.
//!
//! ## Features
//!
//! - **Schema-driven validation** - Every element and attribute must be
//!   declared; violations carry the namespaced path and the allowed set
//! - **Typed output** - Built-in XSD types decode to native scalars; unions
//!   are trial-parsed in member order
//! - **Schema acquisition** - `xsi:schemaLocation` hints are resolved
//!   transitively over a pluggable fetcher, with cycle suppression
//!
//! ## Usage
//!
//! ```no_run
//! use schemus_parser::XmlParser;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut parser = XmlParser::new();
//! parser.add_schema(
//!     "http://example.com/orders",
//!     br#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
//!                    xmlns:tns="http://example.com/orders"
//!                    targetNamespace="http://example.com/orders">
//!           <xs:element name="amount" type="xs:decimal"/>
//!         </xs:schema>"#,
//! )?;
//! let tree = parser
//!     .parse_str(r#"<n:amount xmlns:n="http://example.com/orders">3.14</n:amount>"#)
//!     .await?;
//! assert_eq!(tree.get("amount").and_then(|v| v.as_f64()), Some(3.14));
//! # Ok(())
//! # }
//! ```
//!
//! ## Downloading schemas
//!
//! Schema downloading is off by default; enabling it makes the parser issue
//! HTTP requests for every unresolved schema location, which leaks
//! identifying network traffic to the schema hosts.
//!
//! ```no_run
//! use schemus_parser::XmlParser;
//!
//! let mut parser = XmlParser::builder()
//!     .download_schemas(true)
//!     .build();
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::broken_intra_doc_links)]

mod acquire;
mod document;
pub mod error;
pub mod fetch;
mod validate;

pub use error::{ParseError, ParseResult};
pub use fetch::{HttpFetcher, HttpFetcherBuilder, SchemaFetcher};
pub use schemus_xsd::{KnownSchemas, MultiMap, PendingImports, QName, SchemaRegistry, Value};

#[cfg(feature = "tracing")]
use tracing::info;

/// Options controlling document parsing and output shape
#[derive(Debug, Clone)]
pub struct ParserOptions {
    /// Fetch schemas referenced by `xsi:schemaLocation` hints
    pub download_schemas: bool,
    /// Key output objects by `prefix:local` instead of bare local names
    pub output_with_namespace: bool,
    /// Reserved key for attribute sub-objects
    pub attrkey: String,
    /// Reserved key for character content
    pub charkey: String,
    /// Reserved key for namespace info on generic nodes
    pub xmlnskey: String,
}

impl Default for ParserOptions {
    fn default() -> Self {
        ParserOptions {
            download_schemas: false,
            output_with_namespace: false,
            attrkey: "$".to_string(),
            charkey: "_".to_string(),
            xmlnskey: "$ns".to_string(),
        }
    }
}

/// Schema-validating XML parser
///
/// Owns a [`SchemaRegistry`] that grows monotonically as schemas are added
/// or downloaded; the registry lives for the life of the parser instance
/// and is shared by every document it parses.
pub struct XmlParser {
    registry: SchemaRegistry,
    options: ParserOptions,
    fetcher: Option<Box<dyn SchemaFetcher>>,
}

impl XmlParser {
    /// Create a parser with default options and no fetcher
    pub fn new() -> Self {
        XmlParser::builder().build()
    }

    /// Create a builder for advanced configuration
    pub fn builder() -> XmlParserBuilder {
        XmlParserBuilder::new()
    }

    /// The parser's options
    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// The schema registry backing this parser
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Compile and commit a schema body under a namespace
    ///
    /// Re-adding the same body is a no-op. The commit is all-or-nothing:
    /// a failed compilation leaves the registry untouched.
    ///
    /// # Returns
    ///
    /// The schema's pending imports (`namespace -> locations`), which the
    /// caller must satisfy before parsing documents that use them.
    pub fn add_schema(&mut self, namespace: &str, body: &[u8]) -> ParseResult<PendingImports> {
        Ok(self.registry.add_schema(namespace, body)?)
    }

    /// Fetch a schema from a URL and commit it under a namespace
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    pub async fn download_and_add_schema(
        &mut self,
        namespace: &str,
        url: &str,
    ) -> ParseResult<PendingImports> {
        let fetcher = self.fetcher.as_deref().ok_or_else(|| {
            ParseError::InvalidConfig("no schema fetcher is configured".to_string())
        })?;
        acquire::download_and_add(&mut self.registry, fetcher, namespace, url).await
    }

    /// Collect the `xsi:schemaLocation` hints from a document
    pub fn find_schemas(&self, xml: &str) -> ParseResult<PendingImports> {
        acquire::collect_schema_locations(xml)
    }

    /// Snapshot of all committed schema bodies, keyed by namespace
    pub fn known_schemas(&self) -> KnownSchemas {
        self.registry.known_schemas()
    }

    /// Validate a document and return its normalized tree
    ///
    /// Satisfies the document's schema hints first (fetching them when
    /// downloading is enabled), then walks the document and validates every
    /// element bottom-up.
    ///
    /// # Errors
    ///
    /// Validation is all-or-nothing per document; the first violation is
    /// returned with the namespaced path of the offending node.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, xml), fields(document_size = xml.len())))]
    pub async fn parse_str(&mut self, xml: &str) -> ParseResult<Value> {
        #[cfg(feature = "tracing")]
        info!("Parsing document");

        acquire::populate_schemas(
            &mut self.registry,
            self.fetcher.as_deref(),
            self.options.download_schemas,
            xml,
        )
        .await?;
        document::parse_document(&self.registry, &self.options, xml)
    }
}

impl Default for XmlParser {
    fn default() -> Self {
        XmlParser::new()
    }
}

/// Builder for configuring an [`XmlParser`]
///
/// # Example
///
/// ```no_run
/// use schemus_parser::{HttpFetcher, XmlParser};
///
/// let parser = XmlParser::builder()
///     .download_schemas(true)
///     .output_with_namespace(true)
///     .fetcher(HttpFetcher::new())
///     .build();
/// ```
pub struct XmlParserBuilder {
    options: ParserOptions,
    fetcher: Option<Box<dyn SchemaFetcher>>,
}

impl XmlParserBuilder {
    pub fn new() -> Self {
        XmlParserBuilder {
            options: ParserOptions::default(),
            fetcher: None,
        }
    }

    /// Allow fetching schemas referenced by `xsi:schemaLocation`
    ///
    /// Off by default. Enabling this makes the parser issue network
    /// requests for unresolved schema locations, which exposes identifying
    /// traffic to the schema hosts.
    pub fn download_schemas(mut self, download: bool) -> Self {
        self.options.download_schemas = download;
        self
    }

    /// Key output objects by `prefix:local` instead of bare local names
    pub fn output_with_namespace(mut self, with_namespace: bool) -> Self {
        self.options.output_with_namespace = with_namespace;
        self
    }

    /// Reserved key for attribute sub-objects (default `$`)
    pub fn attrkey(mut self, key: impl Into<String>) -> Self {
        self.options.attrkey = key.into();
        self
    }

    /// Reserved key for character content (default `_`)
    pub fn charkey(mut self, key: impl Into<String>) -> Self {
        self.options.charkey = key.into();
        self
    }

    /// Reserved key for namespace info (default `$ns`)
    pub fn xmlnskey(mut self, key: impl Into<String>) -> Self {
        self.options.xmlnskey = key.into();
        self
    }

    /// Set the schema fetcher used when downloading is enabled
    pub fn fetcher(mut self, fetcher: impl SchemaFetcher + 'static) -> Self {
        self.fetcher = Some(Box::new(fetcher));
        self
    }

    pub fn build(self) -> XmlParser {
        let XmlParserBuilder {
            options,
            mut fetcher,
        } = self;
        if options.download_schemas && fetcher.is_none() {
            fetcher = Some(Box::new(HttpFetcher::new()));
        }
        XmlParser {
            registry: SchemaRegistry::new(),
            options,
            fetcher,
        }
    }
}

impl Default for XmlParserBuilder {
    fn default() -> Self {
        XmlParserBuilder::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let parser = XmlParser::new();
        assert!(!parser.options().download_schemas);
        assert!(!parser.options().output_with_namespace);
        assert_eq!(parser.options().attrkey, "$");
        assert_eq!(parser.options().charkey, "_");
        assert_eq!(parser.options().xmlnskey, "$ns");
        assert!(parser.fetcher.is_none());
    }

    #[test]
    fn enabling_downloads_installs_a_default_fetcher() {
        let parser = XmlParser::builder().download_schemas(true).build();
        assert!(parser.fetcher.is_some());
    }
}
