// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Document converters.
//!
//! Two symmetric encodings driven by the canonical schema:
//!
//! ```text
//!                    ┌──────────────┐
//!    Document ──────▶│  flat        │──────▶ { "age": "33", "tags": "x,y" }   (hash)
//!       ▲            └──────────────┘
//!       │            ┌──────────────┐
//!       └────────────│  nested      │◀─────▶ {"age": 33, "tags": ["x","y"]}  (JSON)
//!                    └──────────────┘
//! ```
//!
//! | kind      | flat                    | nested                  |
//! |-----------|-------------------------|-------------------------|
//! | boolean   | `"1"` / `"0"`           | `true` / `false`        |
//! | number    | decimal string          | number                  |
//! | bigint    | decimal string          | decimal string          |
//! | date      | epoch **seconds**       | epoch **milliseconds**  |
//! | point     | `"lon,lat"`             | `"lon,lat"`             |
//! | array     | separator-joined        | array                   |
//! | object    | rejected                | object                  |
//! | `null`    | omitted                 | `null`                  |
//!
//! Both decoders return every schema field; fields missing on the wire come
//! back as [`Value::Null`]. Reference and relation names are never touched.

pub mod flat;
pub mod nested;

use std::collections::BTreeMap;

use crate::error::EncodeError;
use crate::schema::{FieldDefinition, FieldMap};
use crate::value::{integral_i128, Document, Point, Value};

pub use flat::{decode_flat, encode_flat};
pub use nested::{decode_nested, encode_nested};

/// Flat (hash) wire form: string keys, string values.
pub type FlatMap = BTreeMap<String, String>;

pub(crate) fn child_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", parent, name)
    }
}

/// Value to encode for a schema field: the document's, else the field default.
pub(crate) fn effective<'a>(doc: &'a Document, name: &str, field: &'a FieldDefinition) -> Option<&'a Value> {
    doc.get(name).or(field.default.as_ref())
}

/// Document keys not described by `fields`, in order.
pub(crate) fn unknown_keys<'a>(
    doc: &'a Document,
    fields: &'a FieldMap,
    skip: impl Fn(&str) -> bool + 'a,
) -> impl Iterator<Item = (&'a String, &'a Value)> + 'a {
    doc.iter()
        .filter(move |(name, _)| !fields.contains_key(name.as_str()) && !skip(name))
}

pub(crate) fn mismatch(path: &str, expected: &'static str, found: &Value) -> EncodeError {
    EncodeError::TypeMismatch {
        field: path.to_string(),
        expected,
        found: found.type_name(),
    }
}

pub(crate) fn finite_number(path: &str, value: &Value, literal: Option<&Vec<f64>>) -> Result<f64, EncodeError> {
    let n = match value {
        Value::Number(n) => *n,
        other => return Err(mismatch(path, "number", other)),
    };
    if !n.is_finite() {
        return Err(EncodeError::NonFiniteNumber { field: path.to_string() });
    }
    if let Some(allowed) = literal {
        if !allowed.contains(&n) {
            return Err(EncodeError::LiteralViolation {
                field: path.to_string(),
                value: n.to_string(),
            });
        }
    }
    Ok(n)
}

pub(crate) fn big_integer(path: &str, value: &Value, literal: Option<&Vec<i128>>) -> Result<i128, EncodeError> {
    let n = match value {
        Value::BigInt(n) => *n,
        Value::Number(n) => integral_i128(*n).ok_or_else(|| mismatch(path, "bigint", value))?,
        other => return Err(mismatch(path, "bigint", other)),
    };
    if let Some(allowed) = literal {
        if !allowed.contains(&n) {
            return Err(EncodeError::LiteralViolation {
                field: path.to_string(),
                value: n.to_string(),
            });
        }
    }
    Ok(n)
}

pub(crate) fn epoch_millis(path: &str, value: &Value) -> Result<i64, EncodeError> {
    value.to_epoch_millis().ok_or_else(|| mismatch(path, "date", value))
}

pub(crate) fn valid_point(path: &str, value: &Value) -> Result<Point, EncodeError> {
    match value {
        Value::Point(p) if p.is_valid() => Ok(*p),
        Value::Point(p) => Err(EncodeError::PointOutOfRange {
            field: path.to_string(),
            longitude: p.longitude,
            latitude: p.latitude,
        }),
        other => Err(mismatch(path, "point", other)),
    }
}

/// Vector components, checked against the declared dimension.
pub(crate) fn vector_components(path: &str, value: &Value, dimension: u32) -> Result<Vec<f64>, EncodeError> {
    let Value::Array(items) = value else {
        return Err(mismatch(path, "vector", value));
    };
    if items.len() != dimension as usize {
        return Err(EncodeError::TupleLength {
            field: path.to_string(),
            expected: dimension as usize,
            found: items.len(),
        });
    }
    items
        .iter()
        .map(|item| finite_number(path, item, None))
        .collect()
}
