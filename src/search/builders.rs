// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Per-kind clause builders.
//!
//! Each builder accumulates the value side of exactly one clause and renders
//! the token that goes after `@field:`. Builders never see the field name or
//! negation; the session wraps their output.
//!
//! ```text
//! TAG      {x}  {x | y}           string, bigint, boolean, hash arrays
//! NUMERIC  [lo hi]  [(lo +inf]    number, date (epoch ms)
//! TEXT     word  "exact phrase"
//! GEO      [lon lat radius unit]
//! VECTOR   [VECTOR_RANGE r $alias_range]   (KNN renders as a query suffix)
//! ```

use super::escape::escape_tag;
use super::geo::Circle;
use crate::config::StorageKind;
use crate::document::flat::seconds_token;
use crate::schema::{ArrayOptions, ElementType, FieldKind, ScalarKind, VectorType};
use crate::value::{format_number, integral_i128, Point, Value};

/// Why a builder refused an operator; the session adds the field context.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Rejection {
    Unsupported,
    Invalid(String),
}

type Step = Result<(), Rejection>;

fn invalid(expected: &str, found: &Value) -> Rejection {
    Rejection::Invalid(format!("expected {}, got {}", expected, found.type_name()))
}

/// Which scalar a TAG clause is matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagFlavor {
    String,
    BigInt,
    /// Booleans are stored as `1`/`0` in hashes and `true`/`false` in JSON.
    Boolean(StorageKind),
    /// One element of a hash-stored scalar array, written the way the flat
    /// encoding writes it (dates in epoch seconds, booleans as `1`/`0`).
    Element(ScalarKind),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TagBuilder {
    flavor: TagFlavor,
    values: Vec<String>,
}

impl TagBuilder {
    pub fn new(flavor: TagFlavor) -> Self {
        Self {
            flavor,
            values: Vec::new(),
        }
    }

    fn token(&self, value: &Value) -> Result<String, Rejection> {
        Ok(escape_tag(&Self::raw_token(self.flavor, value)?))
    }

    fn raw_token(flavor: TagFlavor, value: &Value) -> Result<String, Rejection> {
        let raw = match (flavor, value) {
            (TagFlavor::Boolean(storage), Value::Bool(b)) => match (storage, b) {
                (StorageKind::Hash, true) => "1".to_string(),
                (StorageKind::Hash, false) => "0".to_string(),
                (StorageKind::Json, b) => b.to_string(),
            },
            (TagFlavor::Boolean(_), other) => return Err(invalid("a boolean", other)),
            (TagFlavor::BigInt, Value::BigInt(i)) => i.to_string(),
            (TagFlavor::BigInt, Value::Number(n)) => integral_i128(*n)
                .map(|i| i.to_string())
                .ok_or_else(|| invalid("an integer in the 128-bit range", value))?,
            (TagFlavor::BigInt, Value::String(s)) if s.parse::<i128>().is_ok() => s.clone(),
            (TagFlavor::BigInt, other) => return Err(invalid("an integer", other)),
            (TagFlavor::String, other) => other.to_plain_string().ok_or_else(|| invalid("a scalar", other))?,
            (TagFlavor::Element(kind), value) => match kind {
                ScalarKind::String | ScalarKind::Text => Self::raw_token(TagFlavor::String, value)?,
                ScalarKind::BigInt => Self::raw_token(TagFlavor::BigInt, value)?,
                ScalarKind::Boolean => Self::raw_token(TagFlavor::Boolean(StorageKind::Hash), value)?,
                ScalarKind::Number => match value {
                    Value::Number(n) if n.is_finite() => format_number(*n),
                    other => return Err(invalid("a finite number", other)),
                },
                ScalarKind::Date => value
                    .to_epoch_millis()
                    .map(seconds_token)
                    .ok_or_else(|| invalid("a date, epoch milliseconds or an RFC 3339 string", value))?,
                ScalarKind::Point => match value {
                    Value::Point(p) if p.is_valid() => p.to_string(),
                    Value::String(s) => Point::parse(s)
                        .filter(Point::is_valid)
                        .map(|p| p.to_string())
                        .ok_or_else(|| invalid("a point", value))?,
                    other => return Err(invalid("a point", other)),
                },
            },
        };
        Ok(raw)
    }

    fn eq(&mut self, value: &Value) -> Step {
        let token = self.token(value)?;
        self.values = vec![token];
        Ok(())
    }

    fn or(&mut self, value: &Value) -> Step {
        let token = self.token(value)?;
        self.values.push(token);
        Ok(())
    }

    pub fn render(&self) -> Option<String> {
        if self.values.is_empty() {
            return None;
        }
        Some(format!("{{{}}}", self.values.join(" | ")))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Bound {
    Inclusive(String),
    Exclusive(String),
}

/// NUMERIC range. Date ranges normalize their bounds to epoch milliseconds.
///
/// Lower and upper bounds are set independently, so `gt(1)` followed by
/// `lt(5)` renders `[(1 (5]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeBuilder {
    dates: bool,
    lower: Option<Bound>,
    upper: Option<Bound>,
}

impl RangeBuilder {
    pub fn numbers() -> Self {
        Self {
            dates: false,
            lower: None,
            upper: None,
        }
    }

    pub fn dates() -> Self {
        Self {
            dates: true,
            lower: None,
            upper: None,
        }
    }

    fn bound(&self, value: &Value) -> Result<String, Rejection> {
        if self.dates {
            return value
                .to_epoch_millis()
                .map(|ms| ms.to_string())
                .ok_or_else(|| invalid("a date, epoch milliseconds or an RFC 3339 string", value));
        }
        match value {
            Value::Number(n) if n.is_finite() => Ok(format_number(*n)),
            Value::BigInt(i) => Ok(i.to_string()),
            other => Err(invalid("a finite number", other)),
        }
    }

    fn eq(&mut self, value: &Value) -> Step {
        let v = self.bound(value)?;
        self.lower = Some(Bound::Inclusive(v.clone()));
        self.upper = Some(Bound::Inclusive(v));
        Ok(())
    }

    fn gt(&mut self, value: &Value) -> Step {
        self.lower = Some(Bound::Exclusive(self.bound(value)?));
        Ok(())
    }

    fn gte(&mut self, value: &Value) -> Step {
        self.lower = Some(Bound::Inclusive(self.bound(value)?));
        Ok(())
    }

    fn lt(&mut self, value: &Value) -> Step {
        self.upper = Some(Bound::Exclusive(self.bound(value)?));
        Ok(())
    }

    fn lte(&mut self, value: &Value) -> Step {
        self.upper = Some(Bound::Inclusive(self.bound(value)?));
        Ok(())
    }

    fn between(&mut self, low: &Value, high: &Value) -> Step {
        let (lo, hi) = (self.bound(low)?, self.bound(high)?);
        self.lower = Some(Bound::Inclusive(lo));
        self.upper = Some(Bound::Inclusive(hi));
        Ok(())
    }

    pub fn render(&self) -> Option<String> {
        if self.lower.is_none() && self.upper.is_none() {
            return None;
        }
        let side = |bound: &Option<Bound>, open: &str| match bound {
            None => open.to_string(),
            Some(Bound::Inclusive(v)) => v.clone(),
            Some(Bound::Exclusive(v)) => format!("({}", v),
        };
        Some(format!("[{} {}]", side(&self.lower, "-inf"), side(&self.upper, "+inf")))
    }
}

/// Full-text match. Terms are inserted verbatim; the text tokenizer handles
/// punctuation on its own.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextBuilder {
    terms: Vec<String>,
}

impl TextBuilder {
    fn term(value: &Value) -> Result<String, Rejection> {
        value.to_plain_string().ok_or_else(|| invalid("text", value))
    }

    fn eq(&mut self, value: &Value) -> Step {
        self.terms = vec![Self::term(value)?];
        Ok(())
    }

    fn exact(&mut self, value: &Value) -> Step {
        self.terms = vec![format!("\"{}\"", Self::term(value)?)];
        Ok(())
    }

    fn or(&mut self, value: &Value) -> Step {
        self.terms.push(Self::term(value)?);
        Ok(())
    }

    pub fn render(&self) -> Option<String> {
        match self.terms.as_slice() {
            [] => None,
            [single] => Some(single.clone()),
            many => Some(format!("({})", many.join("|"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeoBuilder {
    circle: Option<Circle>,
}

impl GeoBuilder {
    fn within(&mut self, circle: Circle) -> Step {
        if !circle.is_valid() {
            return Err(Rejection::Invalid(format!("circle '{}' is out of range", circle)));
        }
        self.circle = Some(circle);
        Ok(())
    }

    /// Match a point exactly: a default-radius circle around it.
    fn eq(&mut self, value: &Value) -> Step {
        match value {
            Value::Point(p) => self.within(Circle::new().origin(*p)),
            Value::String(s) => match Point::parse(s) {
                Some(p) => self.within(Circle::new().origin(p)),
                None => Err(invalid("a point", value)),
            },
            other => Err(invalid("a point", other)),
        }
    }

    pub fn render(&self) -> Option<String> {
        self.circle.map(|c| format!("[{}]", c))
    }
}

/// Vector similarity mode with its serialized query vector.
#[derive(Debug, Clone, PartialEq)]
pub enum VectorMode {
    /// Nearest neighbours, rendered as a suffix of the whole query.
    Knn { k: usize, blob: Vec<u8> },
    /// Everything within `radius`, rendered inline.
    Range { radius: f64, blob: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorBuilder {
    vector_type: VectorType,
    dimension: u32,
    mode: Option<VectorMode>,
}

/// Little-endian binary form of a query vector.
pub fn vector_blob(vector_type: VectorType, components: &[f64]) -> Vec<u8> {
    match vector_type {
        VectorType::Float32 => components
            .iter()
            .flat_map(|c| (*c as f32).to_le_bytes())
            .collect(),
        VectorType::Float64 => components.iter().flat_map(|c| c.to_le_bytes()).collect(),
    }
}

impl VectorBuilder {
    pub fn new(vector_type: VectorType, dimension: u32) -> Self {
        Self {
            vector_type,
            dimension,
            mode: None,
        }
    }

    fn blob(&self, vector: &[f64]) -> Result<Vec<u8>, Rejection> {
        if vector.len() != self.dimension as usize {
            return Err(Rejection::Invalid(format!(
                "vector has {} components, field expects {}",
                vector.len(),
                self.dimension
            )));
        }
        if vector.iter().any(|c| !c.is_finite()) {
            return Err(Rejection::Invalid("vector components must be finite".to_string()));
        }
        Ok(vector_blob(self.vector_type, vector))
    }

    fn knn(&mut self, k: usize, vector: &[f64]) -> Step {
        if k == 0 {
            return Err(Rejection::Invalid("k must be at least 1".to_string()));
        }
        let blob = self.blob(vector)?;
        self.mode = Some(VectorMode::Knn { k, blob });
        Ok(())
    }

    fn range(&mut self, radius: f64, vector: &[f64]) -> Step {
        if !radius.is_finite() || radius < 0.0 {
            return Err(Rejection::Invalid(format!("radius {} is not a finite distance", radius)));
        }
        let blob = self.blob(vector)?;
        self.mode = Some(VectorMode::Range { radius, blob });
        Ok(())
    }

    pub fn mode(&self) -> Option<&VectorMode> {
        self.mode.as_ref()
    }

    /// Inline token for range mode; KNN has no inline form.
    pub fn render(&self, alias: &str) -> Option<String> {
        match &self.mode {
            Some(VectorMode::Range { radius, .. }) => Some(format!(
                "[VECTOR_RANGE {} ${}]",
                format_number(*radius),
                range_param(alias)
            )),
            _ => None,
        }
    }
}

/// Parameter name bound to a vector range clause.
pub fn range_param(alias: &str) -> String {
    format!("{}_range", alias)
}

/// The builder behind one clause, chosen by the field's kind.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldBuilder {
    Tag(TagBuilder),
    Numeric(RangeBuilder),
    Date(RangeBuilder),
    Text(TextBuilder),
    Geo(GeoBuilder),
    Vector(VectorBuilder),
}

impl FieldBuilder {
    /// Builder for a leaf kind; structural kinds have none.
    ///
    /// JSON arrays of scalars use their element's builder. Hash arrays are
    /// stored as one separator-joined string and indexed as TAG, so every
    /// element kind matches through a TAG builder there.
    pub fn for_kind(kind: &FieldKind, storage: StorageKind) -> Option<Self> {
        let builder = match kind {
            FieldKind::String(_) => FieldBuilder::Tag(TagBuilder::new(TagFlavor::String)),
            FieldKind::BigInt { .. } => FieldBuilder::Tag(TagBuilder::new(TagFlavor::BigInt)),
            FieldKind::Boolean => FieldBuilder::Tag(TagBuilder::new(TagFlavor::Boolean(storage))),
            FieldKind::Number { .. } => FieldBuilder::Numeric(RangeBuilder::numbers()),
            FieldKind::Date => FieldBuilder::Date(RangeBuilder::dates()),
            FieldKind::Text(_) => FieldBuilder::Text(TextBuilder::default()),
            FieldKind::Point => FieldBuilder::Geo(GeoBuilder::default()),
            FieldKind::Vector(options) => {
                FieldBuilder::Vector(VectorBuilder::new(options.vector_type, options.dimension))
            }
            FieldKind::Array(ArrayOptions {
                elements: ElementType::Scalar(element),
                ..
            }) => match storage {
                StorageKind::Hash => FieldBuilder::Tag(TagBuilder::new(TagFlavor::Element(*element))),
                StorageKind::Json => return Self::for_kind(&element.to_kind(), storage),
            },
            FieldKind::Array(_) | FieldKind::Tuple(_) | FieldKind::Object(_) => return None,
        };
        Some(builder)
    }

    /// Query-grammar family name.
    pub fn family(&self) -> &'static str {
        match self {
            FieldBuilder::Tag(_) => "TAG",
            FieldBuilder::Numeric(_) | FieldBuilder::Date(_) => "NUMERIC",
            FieldBuilder::Text(_) => "TEXT",
            FieldBuilder::Geo(_) => "GEO",
            FieldBuilder::Vector(_) => "VECTOR",
        }
    }

    /// Rendered token, or `None` while no operator has supplied a value.
    pub fn render(&self, alias: &str) -> Option<String> {
        match self {
            FieldBuilder::Tag(b) => b.render(),
            FieldBuilder::Numeric(b) | FieldBuilder::Date(b) => b.render(),
            FieldBuilder::Text(b) => b.render(),
            FieldBuilder::Geo(b) => b.render(),
            FieldBuilder::Vector(b) => b.render(alias),
        }
    }

    /// KNN request carried by this clause, if any.
    pub fn nearest(&self) -> Option<(usize, &[u8])> {
        match self {
            FieldBuilder::Vector(VectorBuilder {
                mode: Some(VectorMode::Knn { k, blob }),
                ..
            }) => Some((*k, blob.as_slice())),
            _ => None,
        }
    }

    /// Whether an operator has supplied a value.
    pub fn is_complete(&self) -> bool {
        match self {
            FieldBuilder::Vector(b) => b.mode.is_some(),
            other => other.render("").is_some(),
        }
    }

    pub(crate) fn equals(&mut self, value: &Value) -> Step {
        match self {
            FieldBuilder::Tag(b) => b.eq(value),
            FieldBuilder::Numeric(b) | FieldBuilder::Date(b) => b.eq(value),
            FieldBuilder::Text(b) => b.eq(value),
            FieldBuilder::Geo(b) => b.eq(value),
            FieldBuilder::Vector(_) => Err(Rejection::Unsupported),
        }
    }

    pub(crate) fn or(&mut self, value: &Value) -> Step {
        match self {
            FieldBuilder::Tag(b) => b.or(value),
            FieldBuilder::Text(b) => b.or(value),
            _ => Err(Rejection::Unsupported),
        }
    }

    fn range_mut(&mut self) -> Result<&mut RangeBuilder, Rejection> {
        match self {
            FieldBuilder::Numeric(b) | FieldBuilder::Date(b) => Ok(b),
            _ => Err(Rejection::Unsupported),
        }
    }

    pub(crate) fn gt(&mut self, value: &Value) -> Step {
        self.range_mut()?.gt(value)
    }

    pub(crate) fn gte(&mut self, value: &Value) -> Step {
        self.range_mut()?.gte(value)
    }

    pub(crate) fn lt(&mut self, value: &Value) -> Step {
        self.range_mut()?.lt(value)
    }

    pub(crate) fn lte(&mut self, value: &Value) -> Step {
        self.range_mut()?.lte(value)
    }

    pub(crate) fn between(&mut self, low: &Value, high: &Value) -> Step {
        self.range_mut()?.between(low, high)
    }

    pub(crate) fn exact(&mut self, value: &Value) -> Step {
        match self {
            FieldBuilder::Text(b) => b.exact(value),
            _ => Err(Rejection::Unsupported),
        }
    }

    pub(crate) fn within(&mut self, circle: Circle) -> Step {
        match self {
            FieldBuilder::Geo(b) => b.within(circle),
            _ => Err(Rejection::Unsupported),
        }
    }

    pub(crate) fn knn(&mut self, k: usize, vector: &[f64]) -> Step {
        match self {
            FieldBuilder::Vector(b) => b.knn(k, vector),
            _ => Err(Rejection::Unsupported),
        }
    }

    pub(crate) fn range(&mut self, radius: f64, vector: &[f64]) -> Step {
        match self {
            FieldBuilder::Vector(b) => b.range(radius, vector),
            _ => Err(Rejection::Unsupported),
        }
    }
}
