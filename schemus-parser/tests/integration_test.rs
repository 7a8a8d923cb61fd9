use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::json;

use schemus_parser::{ParseError, ParseResult, SchemaFetcher, Value, XmlParser};

const ORDERS_NS: &str = "http://example.com/orders";
const OPEN_NS: &str = "http://example.com/open";

const ORDERS_SCHEMA: &str = r#"
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           xmlns:tns="http://example.com/orders"
           targetNamespace="http://example.com/orders">
    <xs:element name="amount" type="xs:decimal"/>
    <xs:element name="flag" type="xs:boolean"/>
    <xs:element name="code" type="tns:Code"/>
    <xs:element name="when" type="xs:dateTime"/>
    <xs:element name="blob" type="xs:hexBinary"/>
    <xs:element name="tags" type="xs:NMTOKENS"/>
    <xs:element name="item" type="xs:int"/>
    <xs:element name="order" type="tns:OrderType"/>
    <xs:element name="batch" type="tns:BatchType"/>
    <xs:element name="price" type="tns:Price"/>
    <xs:simpleType name="Code">
        <xs:union memberTypes="xs:int xs:string"/>
    </xs:simpleType>
    <xs:complexType name="OrderType">
        <xs:sequence>
            <xs:element name="item" type="xs:int" maxOccurs="3"/>
            <xs:element name="note" type="xs:string" minOccurs="0"/>
        </xs:sequence>
        <xs:attribute name="kind" type="xs:string"/>
        <xs:attribute name="priority" type="xs:int"/>
    </xs:complexType>
    <xs:complexType name="BatchType">
        <xs:sequence>
            <xs:element ref="tns:item" maxOccurs="unbounded"/>
        </xs:sequence>
    </xs:complexType>
    <xs:complexType name="Price">
        <xs:simpleContent>
            <xs:extension base="xs:decimal">
                <xs:attribute name="currency" type="xs:string"/>
            </xs:extension>
        </xs:simpleContent>
    </xs:complexType>
</xs:schema>
"#;

const OPEN_SCHEMA: &str = r#"
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           xmlns:tns="http://example.com/open"
           targetNamespace="http://example.com/open">
    <xs:element name="openseq" type="tns:OpenSeq"/>
    <xs:element name="openone" type="tns:OpenOne"/>
    <xs:complexType name="OpenSeq">
        <xs:sequence maxOccurs="unbounded">
            <xs:any/>
        </xs:sequence>
    </xs:complexType>
    <xs:complexType name="OpenOne">
        <xs:sequence>
            <xs:any/>
        </xs:sequence>
    </xs:complexType>
</xs:schema>
"#;

fn orders_parser() -> XmlParser {
    let mut parser = XmlParser::new();
    parser
        .add_schema(ORDERS_NS, ORDERS_SCHEMA.as_bytes())
        .unwrap();
    parser
}

fn to_json(value: &Value) -> serde_json::Value {
    serde_json::to_value(value).unwrap()
}

/// In-memory fetcher keyed by URL, with a request log
#[derive(Clone, Default)]
struct MapFetcher {
    bodies: HashMap<String, Vec<u8>>,
    log: Arc<Mutex<Vec<String>>>,
}

impl MapFetcher {
    fn with(mut self, url: &str, body: &str) -> Self {
        self.bodies.insert(url.to_string(), body.as_bytes().to_vec());
        self
    }

    fn requests(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl SchemaFetcher for MapFetcher {
    async fn fetch(&self, url: &str) -> ParseResult<Vec<u8>> {
        self.log.lock().unwrap().push(url.to_string());
        self.bodies
            .get(url)
            .cloned()
            .ok_or_else(|| ParseError::InvalidConfig(format!("no body for '{url}'")))
    }
}

#[tokio::test]
async fn simple_typed_leaf_decodes_to_a_number() {
    let mut parser = orders_parser();
    let tree = parser
        .parse_str(r#"<n:amount xmlns:n="http://example.com/orders">3.14</n:amount>"#)
        .await
        .unwrap();
    assert_eq!(to_json(&tree), json!({ "amount": 3.14 }));
}

#[tokio::test]
async fn bounded_max_occurs_collapses_a_single_occurrence() {
    let mut parser = orders_parser();
    let tree = parser
        .parse_str(
            r#"<n:order xmlns:n="http://example.com/orders"><n:item>1</n:item></n:order>"#,
        )
        .await
        .unwrap();
    // One <item> under maxOccurs="3" is the integer 1, not [1]
    assert_eq!(to_json(&tree), json!({ "order": { "item": 1 } }));
}

#[tokio::test]
async fn unbounded_max_occurs_always_yields_a_sequence() {
    let mut parser = orders_parser();
    let tree = parser
        .parse_str(
            r#"<n:batch xmlns:n="http://example.com/orders"><n:item>1</n:item></n:batch>"#,
        )
        .await
        .unwrap();
    assert_eq!(to_json(&tree), json!({ "batch": { "item": [1] } }));

    let tree = parser
        .parse_str(
            r#"<n:batch xmlns:n="http://example.com/orders">
                 <n:item>1</n:item><n:item>2</n:item>
               </n:batch>"#,
        )
        .await
        .unwrap();
    assert_eq!(to_json(&tree), json!({ "batch": { "item": [1, 2] } }));
}

#[tokio::test]
async fn second_occurrence_of_a_singleton_is_rejected() {
    let mut parser = orders_parser();
    let err = parser
        .parse_str(
            r#"<n:order xmlns:n="http://example.com/orders">
                 <n:item>1</n:item>
                 <n:note>a</n:note>
                 <n:note>b</n:note>
               </n:order>"#,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ParseError::SchemaMismatch { .. }), "{err}");
}

#[tokio::test]
async fn union_types_trial_parse_in_member_order() {
    let mut parser = orders_parser();
    let tree = parser
        .parse_str(r#"<n:code xmlns:n="http://example.com/orders">42</n:code>"#)
        .await
        .unwrap();
    assert_eq!(tree.get("code"), Some(&Value::Int(42)));

    let tree = parser
        .parse_str(r#"<n:code xmlns:n="http://example.com/orders">forty-two</n:code>"#)
        .await
        .unwrap();
    assert_eq!(tree.get("code"), Some(&Value::String("forty-two".into())));
}

#[tokio::test]
async fn boolean_decodes_values_and_rejects_garbage() {
    let mut parser = orders_parser();
    let tree = parser
        .parse_str(r#"<n:flag xmlns:n="http://example.com/orders">1</n:flag>"#)
        .await
        .unwrap();
    assert_eq!(tree.get("flag"), Some(&Value::Bool(true)));

    let tree = parser
        .parse_str(r#"<n:flag xmlns:n="http://example.com/orders">false</n:flag>"#)
        .await
        .unwrap();
    assert_eq!(tree.get("flag"), Some(&Value::Bool(false)));

    let err = parser
        .parse_str(r#"<n:flag xmlns:n="http://example.com/orders">maybe</n:flag>"#)
        .await
        .unwrap_err();
    assert!(matches!(err, ParseError::Coercion { .. }), "{err}");
}

#[tokio::test]
async fn calendar_binary_and_list_leaves_decode() {
    let mut parser = orders_parser();
    let tree = parser
        .parse_str(
            r#"<n:when xmlns:n="http://example.com/orders">2012-09-24T08:00:00+02:00</n:when>"#,
        )
        .await
        .unwrap();
    assert_eq!(to_json(&tree), json!({ "when": "2012-09-24T06:00:00Z" }));

    let tree = parser
        .parse_str(r#"<n:blob xmlns:n="http://example.com/orders">deadbeef</n:blob>"#)
        .await
        .unwrap();
    assert_eq!(
        tree.get("blob").and_then(|v| v.as_bytes()),
        Some(&[0xde, 0xad, 0xbe, 0xef][..])
    );

    let tree = parser
        .parse_str(r#"<n:tags xmlns:n="http://example.com/orders">red green</n:tags>"#)
        .await
        .unwrap();
    assert_eq!(to_json(&tree), json!({ "tags": ["red", "green"] }));
}

#[tokio::test]
async fn attributes_are_filtered_coerced_and_renamed() {
    let mut parser = orders_parser();
    let tree = parser
        .parse_str(
            r#"<n:order xmlns:n="http://example.com/orders"
                        xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
                        xsi:type="n:OrderType"
                        n:kind="digital" priority="2">
                 <n:item>7</n:item>
               </n:order>"#,
        )
        .await
        .unwrap();
    // xmlns and xsi wiring are dropped; the rest is coerced
    assert_eq!(
        to_json(&tree),
        json!({ "order": { "$": { "kind": "digital", "priority": 2 }, "item": 7 } })
    );
}

#[tokio::test]
async fn output_with_namespace_keeps_registry_prefixes() {
    let mut parser = XmlParser::builder().output_with_namespace(true).build();
    parser
        .add_schema(ORDERS_NS, ORDERS_SCHEMA.as_bytes())
        .unwrap();
    let tree = parser
        .parse_str(
            r#"<n:order xmlns:n="http://example.com/orders" n:kind="digital">
                 <n:item>7</n:item>
               </n:order>"#,
        )
        .await
        .unwrap();
    assert_eq!(
        to_json(&tree),
        json!({ "tns:order": { "$": { "tns:kind": "digital" }, "tns:item": 7 } })
    );
}

#[tokio::test]
async fn simple_content_keeps_attributes_beside_the_decoded_value() {
    let mut parser = orders_parser();
    let tree = parser
        .parse_str(
            r#"<n:price xmlns:n="http://example.com/orders" currency="EUR">9.99</n:price>"#,
        )
        .await
        .unwrap();
    assert_eq!(
        to_json(&tree),
        json!({ "price": { "$": { "currency": "EUR" }, "_": 9.99 } })
    );
}

#[tokio::test]
async fn unexpected_attribute_is_rejected_with_the_allowed_set() {
    let mut parser = orders_parser();
    let err = parser
        .parse_str(r#"<n:amount xmlns:n="http://example.com/orders" bad="1">3.14</n:amount>"#)
        .await
        .unwrap_err();
    assert!(matches!(err, ParseError::UnexpectedAttribute { .. }), "{err}");
}

#[tokio::test]
async fn unknown_element_enumerates_the_allowed_children() {
    let mut parser = orders_parser();
    let err = parser
        .parse_str(
            r#"<n:order xmlns:n="http://example.com/orders"><n:bogus>1</n:bogus></n:order>"#,
        )
        .await
        .unwrap_err();
    let ParseError::UnknownElement { allowed, .. } = err else {
        panic!("expected UnknownElement, got {err}");
    };
    assert!(allowed.contains("item"), "allowed was: {allowed}");
    assert!(allowed.contains("note"), "allowed was: {allowed}");
}

#[tokio::test]
async fn children_under_a_simple_typed_leaf_are_a_mismatch() {
    let mut parser = orders_parser();
    let err = parser
        .parse_str(
            r#"<n:amount xmlns:n="http://example.com/orders"><n:item>1</n:item></n:amount>"#,
        )
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            ParseError::SchemaMismatch { .. } | ParseError::UnexpectedChildren { .. }
        ),
        "{err}"
    );
}

#[tokio::test]
async fn any_children_inherit_the_container_cardinality() {
    let mut parser = orders_parser();
    parser.add_schema(OPEN_NS, OPEN_SCHEMA.as_bytes()).unwrap();

    // <any> inside a repeated sequence: child groups stay sequences
    let tree = parser
        .parse_str(
            r#"<o:openseq xmlns:o="http://example.com/open">
                 <n:amount xmlns:n="http://example.com/orders">1.5</n:amount>
               </o:openseq>"#,
        )
        .await
        .unwrap();
    assert_eq!(to_json(&tree), json!({ "openseq": { "amount": [1.5] } }));

    // <any> inside a plain sequence: singletons
    let tree = parser
        .parse_str(
            r#"<o:openone xmlns:o="http://example.com/open">
                 <n:amount xmlns:n="http://example.com/orders">1.5</n:amount>
               </o:openone>"#,
        )
        .await
        .unwrap();
    assert_eq!(to_json(&tree), json!({ "openone": { "amount": 1.5 } }));
}

#[tokio::test]
async fn reparsing_the_same_document_is_structurally_equal() {
    let mut parser = orders_parser();
    let doc = r#"<n:order xmlns:n="http://example.com/orders"><n:item>1</n:item></n:order>"#;
    let first = parser.parse_str(doc).await.unwrap();
    let second = parser.parse_str(doc).await.unwrap();
    assert_eq!(first, second);
}

#[test]
fn readding_a_schema_body_changes_nothing() {
    let mut parser = orders_parser();
    let before = parser.known_schemas();
    let pending = parser
        .add_schema(ORDERS_NS, ORDERS_SCHEMA.as_bytes())
        .unwrap();
    assert!(pending.is_empty());
    assert_eq!(parser.known_schemas(), before);
}

#[test]
fn find_schemas_collects_location_hints() {
    let parser = XmlParser::new();
    let hints = parser
        .find_schemas(
            r#"<doc xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
                    xsi:schemaLocation="http://example.com/a http://example.com/a.xsd"/>"#,
        )
        .unwrap();
    assert_eq!(
        hints.get(&"http://example.com/a".to_string()),
        Some(&["http://example.com/a.xsd".to_string()][..])
    );
}

#[tokio::test]
async fn missing_schema_fails_fast_when_downloads_are_off() {
    let mut parser = orders_parser();
    let err = parser
        .parse_str(
            r#"<x:thing xmlns:x="http://example.com/elsewhere"
                        xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
                        xsi:schemaLocation="http://example.com/elsewhere http://example.com/elsewhere.xsd"/>"#,
        )
        .await
        .unwrap_err();
    let ParseError::MissingSchema { uri } = err else {
        panic!("expected MissingSchema, got {err}");
    };
    assert_eq!(uri, "http://example.com/elsewhere");
}

const CYCLE_A_NS: &str = "http://example.com/cycle-a";
const CYCLE_B_NS: &str = "http://example.com/cycle-b";

const CYCLE_A_SCHEMA: &str = r#"
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           xmlns:a="http://example.com/cycle-a"
           targetNamespace="http://example.com/cycle-a">
    <xs:import namespace="http://example.com/cycle-b"
               schemaLocation="http://test.invalid/b.xsd"/>
    <xs:element name="root" type="xs:string"/>
</xs:schema>
"#;

const CYCLE_B_SCHEMA: &str = r#"
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           xmlns:b="http://example.com/cycle-b"
           targetNamespace="http://example.com/cycle-b">
    <xs:import namespace="http://example.com/cycle-a"
               schemaLocation="http://test.invalid/a.xsd"/>
    <xs:element name="other" type="xs:string"/>
</xs:schema>
"#;

#[tokio::test]
async fn import_cycles_converge_and_stay_idempotent() {
    let fetcher = MapFetcher::default()
        .with("http://test.invalid/a.xsd", CYCLE_A_SCHEMA)
        .with("http://test.invalid/b.xsd", CYCLE_B_SCHEMA);
    let requests = fetcher.clone();
    let mut parser = XmlParser::builder()
        .download_schemas(true)
        .fetcher(fetcher)
        .build();

    let doc = r#"<a:root xmlns:a="http://example.com/cycle-a"
                         xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
                         xsi:schemaLocation="http://example.com/cycle-a http://test.invalid/a.xsd">hi</a:root>"#;
    let tree = parser.parse_str(doc).await.unwrap();
    assert_eq!(to_json(&tree), json!({ "root": "hi" }));

    // Both namespaces committed exactly once despite the A -> B -> A cycle
    let known = parser.known_schemas();
    assert_eq!(known.get(&CYCLE_A_NS.to_string()).map(|b| b.len()), Some(1));
    assert_eq!(known.get(&CYCLE_B_NS.to_string()).map(|b| b.len()), Some(1));
    assert_eq!(
        requests.requests(),
        vec!["http://test.invalid/a.xsd", "http://test.invalid/b.xsd"]
    );

    // A later parse of the same document downloads nothing new
    let again = parser.parse_str(doc).await.unwrap();
    assert_eq!(tree, again);
    assert_eq!(requests.requests().len(), 2);
}

#[tokio::test]
async fn conflicting_locations_for_one_namespace_are_rejected() {
    let fetcher = MapFetcher::default();
    let mut parser = XmlParser::builder()
        .download_schemas(true)
        .fetcher(fetcher)
        .build();
    let err = parser
        .parse_str(
            r#"<doc xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
                    xsi:schemaLocation="http://example.com/a http://test.invalid/one.xsd">
                 <inner xsi:schemaLocation="http://example.com/a http://test.invalid/two.xsd"/>
               </doc>"#,
        )
        .await
        .unwrap_err();
    assert!(
        matches!(err, ParseError::MismatchedSchemaLocation { .. }),
        "{err}"
    );
}

#[tokio::test]
async fn download_and_add_schema_reports_pending_imports() {
    let fetcher = MapFetcher::default()
        .with("http://test.invalid/a.xsd", CYCLE_A_SCHEMA)
        .with("http://test.invalid/b.xsd", CYCLE_B_SCHEMA);
    let mut parser = XmlParser::builder().fetcher(fetcher).build();

    let pending = parser
        .download_and_add_schema(CYCLE_A_NS, "http://test.invalid/a.xsd")
        .await
        .unwrap();
    assert_eq!(
        pending.get(&CYCLE_B_NS.to_string()),
        Some(&["http://test.invalid/b.xsd".to_string()][..])
    );

    let pending = parser
        .download_and_add_schema(CYCLE_B_NS, "http://test.invalid/b.xsd")
        .await
        .unwrap();
    // A's body is already committed; its location is still reported
    assert!(pending.contains_key(&CYCLE_A_NS.to_string()));

    let tree = parser
        .parse_str(r#"<a:root xmlns:a="http://example.com/cycle-a">hi</a:root>"#)
        .await
        .unwrap();
    assert_eq!(to_json(&tree), json!({ "root": "hi" }));
}

#[tokio::test]
async fn unknown_document_namespace_is_reported() {
    let mut parser = orders_parser();
    let err = parser
        .parse_str(r#"<x:amount xmlns:x="http://example.com/never-declared">3</x:amount>"#)
        .await
        .unwrap_err();
    assert!(matches!(err, ParseError::UnknownNamespace { .. }), "{err}");
}
