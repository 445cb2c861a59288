// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Application-level value model.
//!
//! A [`Document`] is what callers hand to the encoders and get back from the
//! decoders. It is a plain ordered map of field name to [`Value`]; the
//! canonical schema decides how each value is laid out on the wire.
//!
//! ```
//! use schema_engine::{Document, Point, Value};
//!
//! let mut doc = Document::new();
//! doc.insert("name".into(), "Ada".into());
//! doc.insert("age".into(), 33.into());
//! doc.insert("home".into(), Point::new(-0.12, 51.5).into());
//!
//! assert_eq!(doc["age"], Value::Number(33.0));
//! ```

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Field name → value map conforming to a canonical schema.
pub type Document = BTreeMap<String, Value>;

/// A single application value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    BigInt(i128),
    String(String),
    Date(DateTime<Utc>),
    Point(Point),
    Array(Vec<Value>),
    Object(Document),
}

/// Geographic coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub longitude: f64,
    pub latitude: f64,
}

/// Longitude bounds accepted by the search engine's GEO type.
pub const LONGITUDE_RANGE: (f64, f64) = (-180.0, 180.0);
/// Latitude bounds accepted by the search engine's GEO type (Web Mercator limit).
pub const LATITUDE_RANGE: (f64, f64) = (-85.051_128_78, 85.051_128_78);

impl Point {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self { longitude, latitude }
    }

    /// Whether both coordinates fall inside the indexable range.
    pub fn is_valid(&self) -> bool {
        (LONGITUDE_RANGE.0..=LONGITUDE_RANGE.1).contains(&self.longitude)
            && (LATITUDE_RANGE.0..=LATITUDE_RANGE.1).contains(&self.latitude)
    }

    /// Parse the `longitude,latitude` wire grammar.
    pub fn parse(raw: &str) -> Option<Self> {
        let (lon, lat) = raw.split_once(',')?;
        let longitude = lon.trim().parse::<f64>().ok()?;
        let latitude = lat.trim().parse::<f64>().ok()?;
        if !longitude.is_finite() || !latitude.is_finite() {
            return None;
        }
        Some(Self { longitude, latitude })
    }
}

/// `(longitude, latitude)`.
impl From<(f64, f64)> for Point {
    fn from((longitude, latitude): (f64, f64)) -> Self {
        Self { longitude, latitude }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.longitude, self.latitude)
    }
}

impl Value {
    /// Short name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::BigInt(_) => "bigint",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::Point(_) => "point",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Interpret the value as a point in time.
    ///
    /// Accepts a date, an epoch-millisecond number or an RFC 3339 string.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Date(d) => Some(*d),
            Value::Number(ms) if ms.is_finite() => Utc.timestamp_millis_opt(ms.round() as i64).single(),
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|d| d.with_timezone(&Utc)),
            _ => None,
        }
    }

    /// Epoch milliseconds for anything [`Value::to_datetime`] accepts.
    pub fn to_epoch_millis(&self) -> Option<i64> {
        self.to_datetime().map(|d| d.timestamp_millis())
    }

    /// Render a scalar in its plain string form (string-field coercion).
    ///
    /// Returns `None` for nulls, arrays and objects.
    pub fn to_plain_string(&self) -> Option<String> {
        match self {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(format_number(*n)),
            Value::BigInt(i) => Some(i.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Date(d) => Some(d.to_rfc3339()),
            Value::Point(p) => Some(p.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Generic conversion from JSON, used for values the schema does not describe.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => n.as_f64().map(Value::Number).unwrap_or(Value::Null),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => Value::Array(items.iter().map(Value::from_json).collect()),
            serde_json::Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Generic conversion to JSON. Dates become epoch milliseconds, points
    /// their `longitude,latitude` string and big integers a decimal string.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::BigInt(i) => serde_json::Value::String(i.to_string()),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Date(d) => serde_json::Value::from(d.timestamp_millis()),
            Value::Point(p) => serde_json::Value::String(p.to_string()),
            Value::Array(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Object(doc) => serde_json::Value::Object(
                doc.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

/// Decimal rendering shared by the flat encoder and the query builders.
///
/// Integral values print without a fractional part (`33`, not `33.0`).
pub(crate) fn format_number(n: f64) -> String {
    if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Exact `i128` for an integral float inside the `i128` range.
pub(crate) fn integral_i128(n: f64) -> Option<i128> {
    // i128::MAX rounds up to 2^127 as f64, so the upper bound is exclusive.
    if n.is_finite() && n.fract() == 0.0 && n >= i128::MIN as f64 && n < i128::MAX as f64 {
        Some(n as i128)
    } else {
        None
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i128> for Value {
    fn from(n: i128) -> Self {
        Value::BigInt(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Value::Date(d)
    }
}

impl From<Point> for Value {
    fn from(p: Point) -> Self {
        Value::Point(p)
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        Value::Object(doc)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}
