// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Flat encoding: a string-keyed, string-valued map for hash storage.
//!
//! Nesting cannot be represented: objects, tuples and arrays of objects are
//! rejected. `null` values are omitted entirely; an all-null document encodes
//! to an empty map and the caller decides what that means.
//!
//! Arrays join their elements with the field separator. The empty string is
//! the empty array, so empty elements are rejected on encode.
//!
//! Vectors are written as comma-joined decimal text, which round-trips through
//! the hash but is not the binary blob a hash `VECTOR` index reads. Use JSON
//! storage for fields that are searched by similarity.

use chrono::{TimeZone, Utc};

use super::{
    big_integer, effective, epoch_millis, finite_number, mismatch, unknown_keys, valid_point,
    vector_components, FlatMap,
};
use crate::error::{DecodeError, EncodeError};
use crate::schema::{CanonicalSchema, ElementType, FieldKind};
use crate::value::{format_number, Document, Point, Value};

/// Encode a document for hash storage.
pub fn encode_flat(schema: &CanonicalSchema, doc: &Document) -> Result<FlatMap, EncodeError> {
    let mut out = FlatMap::new();

    for (name, field) in schema.data() {
        let Some(value) = effective(doc, name, field) else {
            continue;
        };
        if let Some(encoded) = encode_kind(name, &field.kind, value)? {
            out.insert(name.clone(), encoded);
        }
    }

    for (name, value) in unknown_keys(doc, schema.data(), |name: &str| schema.is_link(name)) {
        match value {
            Value::Null => {}
            Value::Array(_) | Value::Object(_) => {
                return Err(EncodeError::NestingUnsupported { field: name.clone() })
            }
            Value::Bool(b) => {
                out.insert(name.clone(), bool_token(*b).to_string());
            }
            scalar => {
                if let Some(s) = scalar.to_plain_string() {
                    out.insert(name.clone(), s);
                }
            }
        }
    }

    Ok(out)
}

/// Decode a hash reply. Keys the schema does not know pass through as strings.
pub fn decode_flat(schema: &CanonicalSchema, map: &FlatMap) -> Result<Document, DecodeError> {
    let mut doc = Document::new();

    for (name, field) in schema.data() {
        let value = match map.get(name) {
            Some(raw) => decode_kind(name, &field.kind, raw)?,
            None => Value::Null,
        };
        doc.insert(name.clone(), value);
    }

    for (name, raw) in map {
        if !schema.data().contains_key(name) {
            doc.insert(name.clone(), Value::String(raw.clone()));
        }
    }

    Ok(doc)
}

fn bool_token(b: bool) -> &'static str {
    if b {
        "1"
    } else {
        "0"
    }
}

/// Epoch seconds, fractional when the date carries milliseconds.
pub(crate) fn seconds_token(millis: i64) -> String {
    format_number(millis as f64 / 1000.0)
}

fn encode_kind(path: &str, kind: &FieldKind, value: &Value) -> Result<Option<String>, EncodeError> {
    if value.is_null() {
        return Ok(None);
    }

    let encoded = match kind {
        FieldKind::String(_) | FieldKind::Text(_) => match value {
            Value::String(_) | Value::Number(_) | Value::Bool(_) | Value::BigInt(_) => value
                .to_plain_string()
                .ok_or_else(|| mismatch(path, "string", value))?,
            other => return Err(mismatch(path, "string", other)),
        },
        FieldKind::Number { literal } => format_number(finite_number(path, value, literal.as_ref())?),
        FieldKind::BigInt { literal } => big_integer(path, value, literal.as_ref())?.to_string(),
        FieldKind::Boolean => match value {
            Value::Bool(b) => bool_token(*b).to_string(),
            other => return Err(mismatch(path, "boolean", other)),
        },
        FieldKind::Date => seconds_token(epoch_millis(path, value)?),
        FieldKind::Point => valid_point(path, value)?.to_string(),
        FieldKind::Vector(options) => vector_components(path, value, options.dimension)?
            .into_iter()
            .map(format_number)
            .collect::<Vec<_>>()
            .join(","),
        FieldKind::Array(options) => {
            let ElementType::Scalar(element) = &options.elements else {
                return Err(EncodeError::NestingUnsupported { field: path.to_string() });
            };
            let Value::Array(items) = value else {
                return Err(mismatch(path, "array", value));
            };
            let element_kind = element.to_kind();
            let mut parts = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                let part = encode_kind(path, &element_kind, item)?
                    .ok_or_else(|| EncodeError::NullElement {
                        field: path.to_string(),
                        index,
                    })?;
                if part.is_empty() {
                    return Err(EncodeError::EmptyElement {
                        field: path.to_string(),
                        index,
                    });
                }
                if part.contains(options.separator.as_str()) {
                    return Err(EncodeError::SeparatorInValue {
                        field: path.to_string(),
                        value: part,
                        separator: options.separator.clone(),
                    });
                }
                parts.push(part);
            }
            parts.join(&options.separator)
        }
        FieldKind::Tuple(_) | FieldKind::Object(_) => {
            return Err(EncodeError::NestingUnsupported { field: path.to_string() })
        }
    };

    Ok(Some(encoded))
}

fn decode_kind(path: &str, kind: &FieldKind, raw: &str) -> Result<Value, DecodeError> {
    match kind {
        FieldKind::String(_) | FieldKind::Text(_) => Ok(Value::String(raw.to_string())),
        FieldKind::Number { .. } => parse_number(path, raw).map(Value::Number),
        FieldKind::BigInt { .. } => raw
            .trim()
            .parse::<i128>()
            .map(Value::BigInt)
            .map_err(|_| DecodeError::InvalidBigInt {
                field: path.to_string(),
                raw: raw.to_string(),
            }),
        FieldKind::Boolean => match raw {
            "1" => Ok(Value::Bool(true)),
            "0" => Ok(Value::Bool(false)),
            _ => Err(DecodeError::InvalidBoolean {
                field: path.to_string(),
                raw: raw.to_string(),
            }),
        },
        FieldKind::Date => {
            let invalid = || DecodeError::InvalidDate {
                field: path.to_string(),
                raw: raw.to_string(),
            };
            let seconds = raw.trim().parse::<f64>().map_err(|_| invalid())?;
            if !seconds.is_finite() {
                return Err(invalid());
            }
            Utc.timestamp_millis_opt((seconds * 1000.0).round() as i64)
                .single()
                .map(Value::Date)
                .ok_or_else(invalid)
        }
        FieldKind::Point => Point::parse(raw)
            .map(Value::Point)
            .ok_or_else(|| DecodeError::InvalidPoint {
                field: path.to_string(),
                raw: raw.to_string(),
            }),
        FieldKind::Vector(_) => split(raw, ",")
            .map(|part| parse_number(path, part).map(Value::Number))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        FieldKind::Array(options) => {
            let ElementType::Scalar(element) = &options.elements else {
                return Err(DecodeError::NestingUnsupported { field: path.to_string() });
            };
            let element_kind = element.to_kind();
            split(raw, &options.separator)
                .map(|part| decode_kind(path, &element_kind, part))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        FieldKind::Tuple(_) | FieldKind::Object(_) => {
            Err(DecodeError::NestingUnsupported { field: path.to_string() })
        }
    }
}

/// Split a joined list; the empty string is the empty list.
fn split<'a>(raw: &'a str, separator: &'a str) -> Box<dyn Iterator<Item = &'a str> + 'a> {
    if raw.is_empty() {
        Box::new(std::iter::empty())
    } else {
        Box::new(raw.split(separator))
    }
}

fn parse_number(path: &str, raw: &str) -> Result<f64, DecodeError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| DecodeError::InvalidNumber {
            field: path.to_string(),
            raw: raw.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> CanonicalSchema {
        CanonicalSchema::from_json(json!({
            "name": "string",
            "age": "number",
            "active": "boolean",
            "big": "bigint",
            "bio": "text",
            "born": "date",
            "home": "point",
            "tags": { "type": "array" },
            "scores": { "type": "array", "elements": "number", "separator": "|" },
            "friends": { "type": "reference", "schema": "self" },
        }))
        .unwrap()
    }

    fn doc(pairs: Vec<(&str, Value)>) -> Document {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn test_end_to_end_example() {
        let schema = CanonicalSchema::from_json(json!({
            "name": "string", "age": "number", "tags": { "type": "array" }
        }))
        .unwrap();
        let encoded = encode_flat(
            &schema,
            &doc(vec![
                ("name", "Ada".into()),
                ("age", 33.into()),
                ("tags", vec!["x", "y"].into()),
            ]),
        )
        .unwrap();

        let expected: FlatMap = [("name", "Ada"), ("age", "33"), ("tags", "x,y")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(encoded, expected);
    }

    #[test]
    fn test_scalar_encodings() {
        let born = Utc.timestamp_millis_opt(1_700_000_000_500).unwrap();
        let encoded = encode_flat(
            &schema(),
            &doc(vec![
                ("active", true.into()),
                ("big", Value::BigInt(170_141_183_460_469_231_731_687_303_715_884_105_727)),
                ("born", born.into()),
                ("home", Point::new(-0.12, 51.5).into()),
                ("scores", vec![1.5, 2.0].into()),
            ]),
        )
        .unwrap();

        assert_eq!(encoded["active"], "1");
        assert_eq!(encoded["big"], "170141183460469231731687303715884105727");
        assert_eq!(encoded["born"], "1700000000.5");
        assert_eq!(encoded["home"], "-0.12,51.5");
        assert_eq!(encoded["scores"], "1.5|2");
    }

    #[test]
    fn test_string_field_coerces_scalars() {
        let encoded = encode_flat(&schema(), &doc(vec![("name", 42.into()), ("bio", false.into())])).unwrap();
        assert_eq!(encoded["name"], "42");
        assert_eq!(encoded["bio"], "false");
    }

    #[test]
    fn test_nulls_are_omitted() {
        let encoded = encode_flat(&schema(), &doc(vec![("name", Value::Null), ("age", Value::Null)])).unwrap();
        assert!(encoded.is_empty());
    }

    #[test]
    fn test_references_skipped() {
        let encoded = encode_flat(&schema(), &doc(vec![("friends", vec!["u:1"].into())])).unwrap();
        assert!(encoded.is_empty());
    }

    #[test]
    fn test_nested_values_rejected() {
        let schema = CanonicalSchema::from_json(json!({
            "address": { "type": "object", "properties": { "city": "string" } },
        }))
        .unwrap();
        let mut address = Document::new();
        address.insert("city".into(), "Paris".into());
        let err = encode_flat(&schema, &doc(vec![("address", address.into())])).unwrap_err();
        assert_eq!(err, EncodeError::NestingUnsupported { field: "address".into() });

        let err = encode_flat(&schema, &doc(vec![("extra", vec![1].into())])).unwrap_err();
        assert_eq!(err, EncodeError::NestingUnsupported { field: "extra".into() });
    }

    #[test]
    fn test_separator_inside_element_rejected() {
        let err = encode_flat(&schema(), &doc(vec![("tags", vec!["a,b"].into())])).unwrap_err();
        assert!(matches!(err, EncodeError::SeparatorInValue { .. }));
    }

    #[test]
    fn test_empty_element_rejected() {
        for tags in [vec![""], vec!["a", ""]] {
            let err = encode_flat(&schema(), &doc(vec![("tags", tags.clone().into())])).unwrap_err();
            assert_eq!(
                err,
                EncodeError::EmptyElement {
                    field: "tags".into(),
                    index: tags.len() - 1
                }
            );
        }

        let schema = schema();
        let empty = encode_flat(&schema, &doc(vec![("tags", Value::Array(vec![]))])).unwrap();
        assert_eq!(empty["tags"], "");
        assert_eq!(decode_flat(&schema, &empty).unwrap()["tags"], Value::Array(vec![]));
    }

    #[test]
    fn test_null_element_rejected() {
        let err = encode_flat(
            &schema(),
            &doc(vec![("tags", Value::Array(vec!["a".into(), Value::Null]))]),
        )
        .unwrap_err();
        assert_eq!(err, EncodeError::NullElement { field: "tags".into(), index: 1 });
    }

    #[test]
    fn test_point_out_of_range() {
        let err = encode_flat(&schema(), &doc(vec![("home", Point::new(200.0, 0.0).into())])).unwrap_err();
        assert!(matches!(err, EncodeError::PointOutOfRange { .. }));
    }

    #[test]
    fn test_type_mismatch() {
        let err = encode_flat(&schema(), &doc(vec![("age", "old".into())])).unwrap_err();
        assert_eq!(
            err,
            EncodeError::TypeMismatch { field: "age".into(), expected: "number", found: "string" }
        );
    }

    #[test]
    fn test_decode_grammar_errors() {
        let schema = schema();
        let decode = |key: &str, raw: &str| {
            let mut map = FlatMap::new();
            map.insert(key.to_string(), raw.to_string());
            decode_flat(&schema, &map)
        };

        assert!(matches!(decode("active", "true"), Err(DecodeError::InvalidBoolean { .. })));
        assert!(matches!(decode("age", "thirty"), Err(DecodeError::InvalidNumber { .. })));
        assert!(matches!(decode("age", "inf"), Err(DecodeError::InvalidNumber { .. })));
        assert!(matches!(decode("born", "soon"), Err(DecodeError::InvalidDate { .. })));
        assert!(matches!(decode("home", "51.5"), Err(DecodeError::InvalidPoint { .. })));
        assert!(matches!(decode("big", "1.5"), Err(DecodeError::InvalidBigInt { .. })));
    }

    #[test]
    fn test_decode_fills_missing_and_passes_unknown() {
        let mut map = FlatMap::new();
        map.insert("name".into(), "Ada".into());
        map.insert("$id".into(), "01HX".into());
        let decoded = decode_flat(&schema(), &map).unwrap();
        assert_eq!(decoded["name"], Value::from("Ada"));
        assert_eq!(decoded["age"], Value::Null);
        assert_eq!(decoded["$id"], Value::from("01HX"));
        assert!(!decoded.contains_key("friends"));
    }

    #[test]
    fn test_round_trip() {
        let schema = schema();
        let original = doc(vec![
            ("name", "Ada".into()),
            ("age", 33.5.into()),
            ("active", false.into()),
            ("big", Value::BigInt(-9_007_199_254_740_993)),
            ("bio", "hello world".into()),
            ("born", Utc.timestamp_millis_opt(1_700_000_000_123).unwrap().into()),
            ("home", Point::new(2.35, 48.85).into()),
            ("tags", vec!["x", "y"].into()),
            ("scores", Value::Null),
        ]);
        let decoded = decode_flat(&schema, &encode_flat(&schema, &original).unwrap()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_default_applied_when_absent() {
        let schema = CanonicalSchema::from_json(json!({
            "role": { "type": "string", "default": "guest" },
        }))
        .unwrap();
        let encoded = encode_flat(&schema, &Document::new()).unwrap();
        assert_eq!(encoded["role"], "guest");
    }
}
