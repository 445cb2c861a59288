// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Nested encoding: a native JSON tree for document storage.
//!
//! Objects, arrays and tuples keep their structure and recurse through the
//! same per-kind dispatch. Explicit `null`s are preserved; absent keys stay
//! absent. Dates are epoch milliseconds and points keep the GEO string form.

use chrono::{TimeZone, Utc};
use serde_json::{Map, Value as Json};

use super::{
    big_integer, child_path, effective, epoch_millis, finite_number, mismatch, unknown_keys,
    valid_point, vector_components,
};
use crate::error::{DecodeError, EncodeError};
use crate::schema::{CanonicalSchema, ElementType, FieldKind, FieldMap};
use crate::value::{Document, Point, Value};

/// Encode a document for JSON storage.
pub fn encode_nested(schema: &CanonicalSchema, doc: &Document) -> Result<Json, EncodeError> {
    encode_fields("", schema.data(), doc, &|name: &str| schema.is_link(name)).map(Json::Object)
}

/// Decode a JSON reply. Keys the schema does not know pass through generically.
pub fn decode_nested(schema: &CanonicalSchema, json: &Json) -> Result<Document, DecodeError> {
    let Json::Object(map) = json else {
        return Err(DecodeError::NotAnObject { raw: json.to_string() });
    };
    decode_fields("", schema.data(), map, &|name: &str| schema.is_link(name))
}

fn encode_fields(
    prefix: &str,
    fields: &FieldMap,
    doc: &Document,
    skip: &dyn Fn(&str) -> bool,
) -> Result<Map<String, Json>, EncodeError> {
    let mut out = Map::new();
    for (name, field) in fields {
        if let Some(value) = effective(doc, name, field) {
            let path = child_path(prefix, name);
            out.insert(name.clone(), encode_kind(&path, &field.kind, value)?);
        }
    }
    for (name, value) in unknown_keys(doc, fields, skip) {
        out.insert(name.clone(), value.to_json());
    }
    Ok(out)
}

fn encode_element(path: &str, element: &ElementType, value: &Value) -> Result<Json, EncodeError> {
    match element {
        ElementType::Scalar(kind) => encode_kind(path, &kind.to_kind(), value),
        ElementType::Object(properties) => match value {
            Value::Null => Ok(Json::Null),
            Value::Object(doc) => encode_fields(path, properties, doc, &|_: &str| false).map(Json::Object),
            other => Err(mismatch(path, "object", other)),
        },
    }
}

fn encode_kind(path: &str, kind: &FieldKind, value: &Value) -> Result<Json, EncodeError> {
    if value.is_null() {
        return Ok(Json::Null);
    }

    match kind {
        FieldKind::String(_) | FieldKind::Text(_) => match value {
            Value::String(s) => Ok(Json::String(s.clone())),
            Value::Number(_) | Value::Bool(_) | Value::BigInt(_) => Ok(value.to_json()),
            other => Err(mismatch(path, "string", other)),
        },
        FieldKind::Number { literal } => {
            let n = finite_number(path, value, literal.as_ref())?;
            Ok(serde_json::Number::from_f64(n).map(Json::Number).unwrap_or(Json::Null))
        }
        FieldKind::BigInt { literal } => Ok(Json::String(big_integer(path, value, literal.as_ref())?.to_string())),
        FieldKind::Boolean => match value {
            Value::Bool(b) => Ok(Json::Bool(*b)),
            other => Err(mismatch(path, "boolean", other)),
        },
        FieldKind::Date => Ok(Json::from(epoch_millis(path, value)?)),
        FieldKind::Point => Ok(Json::String(valid_point(path, value)?.to_string())),
        FieldKind::Vector(options) => Ok(Json::Array(
            vector_components(path, value, options.dimension)?
                .into_iter()
                .filter_map(|n| serde_json::Number::from_f64(n).map(Json::Number))
                .collect(),
        )),
        FieldKind::Array(options) => {
            let Value::Array(items) = value else {
                return Err(mismatch(path, "array", value));
            };
            items
                .iter()
                .enumerate()
                .map(|(i, item)| encode_element(&child_path(path, &i.to_string()), &options.elements, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Json::Array)
        }
        FieldKind::Tuple(elements) => {
            let Value::Array(items) = value else {
                return Err(mismatch(path, "tuple", value));
            };
            if items.len() != elements.len() {
                return Err(EncodeError::TupleLength {
                    field: path.to_string(),
                    expected: elements.len(),
                    found: items.len(),
                });
            }
            elements
                .iter()
                .zip(items)
                .enumerate()
                .map(|(i, (element, item))| encode_element(&child_path(path, &i.to_string()), element, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Json::Array)
        }
        FieldKind::Object(properties) => match value {
            Value::Object(doc) => encode_fields(path, properties, doc, &|_: &str| false).map(Json::Object),
            other => Err(mismatch(path, "object", other)),
        },
    }
}

fn decode_fields(
    prefix: &str,
    fields: &FieldMap,
    map: &Map<String, Json>,
    skip: &dyn Fn(&str) -> bool,
) -> Result<Document, DecodeError> {
    let mut doc = Document::new();
    for (name, field) in fields {
        let path = child_path(prefix, name);
        let value = match map.get(name) {
            Some(json) => decode_kind(&path, &field.kind, json)?,
            None => Value::Null,
        };
        doc.insert(name.clone(), value);
    }
    for (name, json) in map {
        if !fields.contains_key(name) && !skip(name) {
            doc.insert(name.clone(), Value::from_json(json));
        }
    }
    Ok(doc)
}

fn decode_element(path: &str, element: &ElementType, json: &Json) -> Result<Value, DecodeError> {
    match element {
        ElementType::Scalar(kind) => decode_kind(path, &kind.to_kind(), json),
        ElementType::Object(properties) => match json {
            Json::Object(map) => decode_fields(path, properties, map, &|_: &str| false).map(Value::Object),
            other => Err(type_mismatch(path, "object", other)),
        },
    }
}

/// Array entries, rejecting `null` anywhere inside.
fn non_null_items<'a>(path: &str, json: &'a Json, expected: &'static str) -> Result<&'a Vec<Json>, DecodeError> {
    let Json::Array(items) = json else {
        return Err(type_mismatch(path, expected, json));
    };
    if let Some(index) = items.iter().position(Json::is_null) {
        return Err(DecodeError::NullInArray {
            field: path.to_string(),
            index,
        });
    }
    Ok(items)
}

fn decode_kind(path: &str, kind: &FieldKind, json: &Json) -> Result<Value, DecodeError> {
    if json.is_null() {
        return Ok(Value::Null);
    }

    match kind {
        FieldKind::String(_) | FieldKind::Text(_) => match json {
            Json::String(s) => Ok(Value::String(s.clone())),
            Json::Number(n) => Ok(Value::String(n.to_string())),
            Json::Bool(b) => Ok(Value::String(b.to_string())),
            other => Err(type_mismatch(path, "string", other)),
        },
        FieldKind::Number { .. } => json.as_f64().map(Value::Number).ok_or_else(|| DecodeError::InvalidNumber {
            field: path.to_string(),
            raw: json.to_string(),
        }),
        FieldKind::BigInt { .. } => {
            let parsed = match json {
                Json::String(s) => s.trim().parse::<i128>().ok(),
                Json::Number(n) => n.as_i64().map(i128::from).or_else(|| n.as_u64().map(i128::from)),
                _ => None,
            };
            parsed.map(Value::BigInt).ok_or_else(|| DecodeError::InvalidBigInt {
                field: path.to_string(),
                raw: json.to_string(),
            })
        }
        FieldKind::Boolean => json.as_bool().map(Value::Bool).ok_or_else(|| DecodeError::InvalidBoolean {
            field: path.to_string(),
            raw: json.to_string(),
        }),
        FieldKind::Date => json
            .as_f64()
            .filter(|ms| ms.is_finite())
            .and_then(|ms| Utc.timestamp_millis_opt(ms.round() as i64).single())
            .map(Value::Date)
            .ok_or_else(|| DecodeError::InvalidDate {
                field: path.to_string(),
                raw: json.to_string(),
            }),
        FieldKind::Point => json
            .as_str()
            .and_then(Point::parse)
            .map(Value::Point)
            .ok_or_else(|| DecodeError::InvalidPoint {
                field: path.to_string(),
                raw: json.to_string(),
            }),
        FieldKind::Vector(_) => non_null_items(path, json, "vector")?
            .iter()
            .map(|item| {
                item.as_f64().map(Value::Number).ok_or_else(|| DecodeError::InvalidNumber {
                    field: path.to_string(),
                    raw: item.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        FieldKind::Array(options) => non_null_items(path, json, "array")?
            .iter()
            .enumerate()
            .map(|(i, item)| decode_element(&child_path(path, &i.to_string()), &options.elements, item))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        FieldKind::Tuple(elements) => {
            let Json::Array(items) = json else {
                return Err(type_mismatch(path, "tuple", json));
            };
            if items.len() != elements.len() {
                return Err(type_mismatch(path, "tuple of the declared length", json));
            }
            elements
                .iter()
                .zip(items)
                .enumerate()
                .map(|(i, (element, item))| decode_element(&child_path(path, &i.to_string()), element, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        FieldKind::Object(properties) => match json {
            Json::Object(map) => decode_fields(path, properties, map, &|_: &str| false).map(Value::Object),
            other => Err(type_mismatch(path, "object", other)),
        },
    }
}

fn type_mismatch(path: &str, expected: &'static str, json: &Json) -> DecodeError {
    DecodeError::TypeMismatch {
        field: path.to_string(),
        expected,
        raw: json.to_string(),
    }
}
