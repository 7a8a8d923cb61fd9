//! Built-in XML Schema type table
//!
//! Maps the XSD primitive type names to value parsers. This is a closed
//! enumeration: user-defined simple types never get a parser of their own,
//! they inherit one through their base-type chain.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use crate::error::{Result, SchemaError};
use crate::value::Value;

/// Names of all built-in types pre-seeded into a fresh registry
pub(crate) const BUILTIN_TYPES: &[&str] = &[
    "string",
    "normalizedString",
    "token",
    "language",
    "NMTOKEN",
    "NMTOKENS",
    "Name",
    "NCName",
    "ID",
    "IDREF",
    "IDREFS",
    "ENTITY",
    "ENTITIES",
    "anyURI",
    "boolean",
    "integer",
    "nonPositiveInteger",
    "negativeInteger",
    "long",
    "int",
    "short",
    "byte",
    "nonNegativeInteger",
    "unsignedLong",
    "unsignedInt",
    "unsignedShort",
    "unsignedByte",
    "positiveInteger",
    "decimal",
    "double",
    "float",
    "dateTime",
    "date",
    "hexBinary",
    "base64Binary",
    "duration",
    "time",
    "gYear",
    "gYearMonth",
    "gMonth",
    "gMonthDay",
    "gDay",
    "QName",
    "NOTATION",
];

/// A value parser for one class of built-in XSD types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueParser {
    /// Keep the string as-is (string types plus the passthrough calendar types)
    Identity,
    /// Whitespace-separated list of strings (NMTOKENS, IDREFS, ENTITIES)
    StringList,
    /// XSD boolean: true/1 and false/0
    Boolean,
    /// Signed integer decode for integer and all sub-range integers
    Integer,
    /// Decimal decoded to a double
    Decimal,
    /// Double/float with INF handling
    Double,
    /// ISO-8601 dateTime to a UTC instant
    DateTime,
    /// ISO-8601 date to a UTC instant at midnight
    Date,
    /// Hex decode to a byte array
    HexBinary,
    /// Base64 decode to a byte array
    Base64Binary,
}

impl ValueParser {
    /// Look up the parser for a built-in type's local name
    ///
    /// Returns `None` for names outside the closed built-in table.
    pub fn for_builtin(local: &str) -> Option<ValueParser> {
        let parser = match local {
            "string" | "normalizedString" | "token" | "language" | "NMTOKEN" | "Name"
            | "NCName" | "ID" | "IDREF" | "ENTITY" | "anyURI" => ValueParser::Identity,
            "NMTOKENS" | "IDREFS" | "ENTITIES" => ValueParser::StringList,
            "boolean" => ValueParser::Boolean,
            "integer" | "nonPositiveInteger" | "negativeInteger" | "long" | "int" | "short"
            | "byte" | "nonNegativeInteger" | "unsignedLong" | "unsignedInt" | "unsignedShort"
            | "unsignedByte" | "positiveInteger" => ValueParser::Integer,
            "decimal" => ValueParser::Decimal,
            "double" | "float" => ValueParser::Double,
            "dateTime" => ValueParser::DateTime,
            "date" => ValueParser::Date,
            "hexBinary" => ValueParser::HexBinary,
            "base64Binary" => ValueParser::Base64Binary,
            // Calendar fragments and QName-ish types pass through as strings
            "duration" | "time" | "gYear" | "gYearMonth" | "gMonth" | "gMonthDay" | "gDay"
            | "QName" | "NOTATION" => ValueParser::Identity,
            _ => return None,
        };
        Some(parser)
    }

    /// Parse a raw character value to its native form
    ///
    /// # Errors
    ///
    /// Fails with [`SchemaError::Coercion`] on malformed input.
    pub fn parse(&self, raw: &str) -> Result<Value> {
        match self {
            ValueParser::Identity => Ok(Value::String(raw.to_string())),
            ValueParser::StringList => Ok(Value::Seq(
                raw.split_whitespace()
                    .map(|s| Value::String(s.to_string()))
                    .collect(),
            )),
            ValueParser::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(Value::Bool(true)),
                "false" | "0" => Ok(Value::Bool(false)),
                _ => Err(SchemaError::coercion(raw, "boolean")),
            },
            ValueParser::Integer => raw
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| SchemaError::coercion(raw, "integer")),
            ValueParser::Decimal => raw
                .trim()
                .parse::<f64>()
                .map(Value::Double)
                .map_err(|_| SchemaError::coercion(raw, "decimal")),
            ValueParser::Double => parse_double(raw),
            ValueParser::DateTime => parse_datetime(raw).map(Value::DateTime),
            ValueParser::Date => parse_date(raw).map(Value::DateTime),
            ValueParser::HexBinary => hex::decode(raw.trim())
                .map(Value::Bytes)
                .map_err(|_| SchemaError::coercion(raw, "hexBinary")),
            ValueParser::Base64Binary => {
                let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
                BASE64
                    .decode(compact.as_bytes())
                    .map(Value::Bytes)
                    .map_err(|_| SchemaError::coercion(raw, "base64Binary"))
            }
        }
    }
}

fn parse_double(raw: &str) -> Result<Value> {
    let trimmed = raw.trim();
    match trimmed.to_ascii_lowercase().as_str() {
        "inf" | "+inf" => return Ok(Value::Double(f64::INFINITY)),
        "-inf" => return Ok(Value::Double(f64::NEG_INFINITY)),
        _ => {}
    }
    trimmed
        .parse::<f64>()
        .map(Value::Double)
        .map_err(|_| SchemaError::coercion(raw, "double"))
}

fn parse_datetime(raw: &str) -> Result<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    // No timezone designator: interpret as UTC
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
        .map_err(|_| SchemaError::coercion(raw, "dateTime"))
}

fn parse_date(raw: &str) -> Result<DateTime<Utc>> {
    let trimmed = raw.trim();
    let (date_part, zone_part) = if trimmed.len() > 10 {
        trimmed.split_at(10)
    } else {
        (trimmed, "")
    };
    let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|_| SchemaError::coercion(raw, "date"))?;
    let naive = date.and_time(NaiveTime::MIN);
    match zone_part {
        "" | "Z" | "z" => Ok(DateTime::from_naive_utc_and_offset(naive, Utc)),
        zone => {
            let offset = parse_offset(zone).ok_or_else(|| SchemaError::coercion(raw, "date"))?;
            offset
                .from_local_datetime(&naive)
                .single()
                .map(|dt| dt.with_timezone(&Utc))
                .ok_or_else(|| SchemaError::coercion(raw, "date"))
        }
    }
}

/// Parse a `+hh:mm` / `-hh:mm` timezone suffix
fn parse_offset(zone: &str) -> Option<FixedOffset> {
    let (sign, rest) = match zone.as_bytes().first()? {
        b'+' => (1, &zone[1..]),
        b'-' => (-1, &zone[1..]),
        _ => return None,
    };
    let (hours, minutes) = rest.split_once(':')?;
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn boolean_decodes_values_not_membership() {
        // "1" must come out as true and "0" as false, not merely "is valid"
        assert_eq!(
            ValueParser::Boolean.parse("true").unwrap(),
            Value::Bool(true)
        );
        assert_eq!(ValueParser::Boolean.parse("1").unwrap(), Value::Bool(true));
        assert_eq!(
            ValueParser::Boolean.parse("false").unwrap(),
            Value::Bool(false)
        );
        assert_eq!(ValueParser::Boolean.parse("0").unwrap(), Value::Bool(false));
        assert!(ValueParser::Boolean.parse("maybe").is_err());
    }

    #[test]
    fn integer_decodes_signed() {
        assert_eq!(ValueParser::Integer.parse("-42").unwrap(), Value::Int(-42));
        assert!(ValueParser::Integer.parse("3.14").is_err());
        assert!(ValueParser::Integer.parse("forty-two").is_err());
    }

    #[test]
    fn double_handles_infinities() {
        assert_eq!(
            ValueParser::Double.parse("INF").unwrap(),
            Value::Double(f64::INFINITY)
        );
        assert_eq!(
            ValueParser::Double.parse("-INF").unwrap(),
            Value::Double(f64::NEG_INFINITY)
        );
        assert_eq!(
            ValueParser::Double.parse("2.5").unwrap(),
            Value::Double(2.5)
        );
    }

    #[test]
    fn datetime_parses_offsets_and_bare() {
        let expected = Utc.with_ymd_and_hms(2012, 9, 24, 6, 0, 0).unwrap();
        assert_eq!(
            ValueParser::DateTime.parse("2012-09-24T06:00:00Z").unwrap(),
            Value::DateTime(expected)
        );
        assert_eq!(
            ValueParser::DateTime
                .parse("2012-09-24T08:00:00+02:00")
                .unwrap(),
            Value::DateTime(expected)
        );
        assert_eq!(
            ValueParser::DateTime.parse("2012-09-24T06:00:00").unwrap(),
            Value::DateTime(expected)
        );
        assert!(ValueParser::DateTime.parse("not-a-date").is_err());
    }

    #[test]
    fn date_parses_to_midnight_utc() {
        let expected = Utc.with_ymd_and_hms(2012, 9, 24, 0, 0, 0).unwrap();
        assert_eq!(
            ValueParser::Date.parse("2012-09-24").unwrap(),
            Value::DateTime(expected)
        );
        assert_eq!(
            ValueParser::Date.parse("2012-09-24Z").unwrap(),
            Value::DateTime(expected)
        );
    }

    #[test]
    fn binary_types_decode_to_bytes() {
        assert_eq!(
            ValueParser::HexBinary.parse("deadbeef").unwrap(),
            Value::Bytes(vec![0xde, 0xad, 0xbe, 0xef])
        );
        assert_eq!(
            ValueParser::Base64Binary.parse("aGVsbG8=").unwrap(),
            Value::Bytes(b"hello".to_vec())
        );
        assert!(ValueParser::HexBinary.parse("xyz").is_err());
        assert!(ValueParser::Base64Binary.parse("!!!").is_err());
    }

    #[test]
    fn string_list_splits_on_whitespace() {
        assert_eq!(
            ValueParser::StringList.parse("a  b\tc").unwrap(),
            Value::Seq(vec![
                Value::String("a".into()),
                Value::String("b".into()),
                Value::String("c".into())
            ])
        );
    }

    #[test]
    fn builtin_table_is_closed() {
        assert_eq!(ValueParser::for_builtin("int"), Some(ValueParser::Integer));
        assert_eq!(
            ValueParser::for_builtin("gYear"),
            Some(ValueParser::Identity)
        );
        assert_eq!(ValueParser::for_builtin("noSuchType"), None);
    }
}
