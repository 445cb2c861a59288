// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Canonical field model.
//!
//! Every field carries the common flags plus a [`FieldKind`] holding the
//! kind-specific configuration. After canonicalization nothing in here is
//! left unresolved.

use std::collections::BTreeMap;
use std::fmt;

use crate::value::Value;

/// Name → resolved field map (a schema level or a nested object's properties).
pub type FieldMap = BTreeMap<String, FieldDefinition>;

/// Fully resolved field definition.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    pub kind: FieldKind,
    pub optional: bool,
    pub sortable: bool,
    /// Effective index flag (already forced off under a non-indexed object).
    pub indexed: bool,
    pub default: Option<Value>,
}

impl FieldDefinition {
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            optional: false,
            sortable: false,
            indexed: true,
            default: None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }
}

/// Kind tag plus kind-specific options.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    String(TagOptions),
    Number { literal: Option<Vec<f64>> },
    BigInt { literal: Option<Vec<i128>> },
    Boolean,
    Text(TextOptions),
    Date,
    Point,
    Vector(VectorOptions),
    Array(ArrayOptions),
    Tuple(Vec<ElementType>),
    Object(FieldMap),
}

impl FieldKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldKind::String(_) => "string",
            FieldKind::Number { .. } => "number",
            FieldKind::BigInt { .. } => "bigint",
            FieldKind::Boolean => "boolean",
            FieldKind::Text(_) => "text",
            FieldKind::Date => "date",
            FieldKind::Point => "point",
            FieldKind::Vector(_) => "vector",
            FieldKind::Array(_) => "array",
            FieldKind::Tuple(_) => "tuple",
            FieldKind::Object(_) => "object",
        }
    }
}

/// TAG options for string fields.
#[derive(Debug, Clone, PartialEq)]
pub struct TagOptions {
    pub separator: String,
    pub case_sensitive: bool,
}

impl Default for TagOptions {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR.to_string(),
            case_sensitive: false,
        }
    }
}

/// Default TAG / array separator.
pub const DEFAULT_SEPARATOR: &str = ",";

#[derive(Debug, Clone, PartialEq)]
pub struct TextOptions {
    pub weight: f64,
    pub phonetic: Option<PhoneticMatcher>,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            weight: 1.0,
            phonetic: None,
        }
    }
}

/// Phonetic matchers supported by the full-text engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhoneticMatcher {
    English,
    French,
    Portuguese,
    Spanish,
}

impl PhoneticMatcher {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "dm:en" => Some(Self::English),
            "dm:fr" => Some(Self::French),
            "dm:pt" => Some(Self::Portuguese),
            "dm:es" => Some(Self::Spanish),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::English => "dm:en",
            Self::French => "dm:fr",
            Self::Portuguese => "dm:pt",
            Self::Spanish => "dm:es",
        }
    }
}

/// Vector index configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorOptions {
    pub algorithm: VectorAlgorithm,
    pub vector_type: VectorType,
    pub dimension: u32,
    pub distance: DistanceMetric,
    pub initial_cap: Option<u32>,
}

impl VectorOptions {
    /// Options behind the bare `"vector"` shorthand.
    pub fn shorthand() -> Self {
        Self {
            algorithm: VectorAlgorithm::Flat { block_size: 1024 },
            vector_type: VectorType::Float32,
            dimension: 128,
            distance: DistanceMetric::L2,
            initial_cap: None,
        }
    }
}

/// Vector index algorithm with its tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VectorAlgorithm {
    Flat {
        block_size: u32,
    },
    Hnsw {
        m: u32,
        ef_construction: u32,
        ef_runtime: u32,
        epsilon: f64,
    },
}

impl VectorAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Flat { .. } => "FLAT",
            Self::Hnsw { .. } => "HNSW",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorType {
    Float32,
    Float64,
}

impl VectorType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_uppercase().as_str() {
            "FLOAT32" => Some(Self::Float32),
            "FLOAT64" => Some(Self::Float64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Float32 => "FLOAT32",
            Self::Float64 => "FLOAT64",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceMetric {
    L2,
    InnerProduct,
    Cosine,
}

impl DistanceMetric {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_uppercase().as_str() {
            "L2" => Some(Self::L2),
            "IP" => Some(Self::InnerProduct),
            "COSINE" => Some(Self::Cosine),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::L2 => "L2",
            Self::InnerProduct => "IP",
            Self::Cosine => "COSINE",
        }
    }
}

/// Array options.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayOptions {
    pub elements: ElementType,
    pub separator: String,
}

/// Element of an array or a tuple position.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementType {
    Scalar(ScalarKind),
    Object(FieldMap),
}

/// Kinds that may appear as bare array / tuple elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    String,
    Number,
    BigInt,
    Boolean,
    Text,
    Date,
    Point,
}

impl ScalarKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "bigint" => Some(Self::BigInt),
            "boolean" => Some(Self::Boolean),
            "text" => Some(Self::Text),
            "date" => Some(Self::Date),
            "point" => Some(Self::Point),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::BigInt => "bigint",
            Self::Boolean => "boolean",
            Self::Text => "text",
            Self::Date => "date",
            Self::Point => "point",
        }
    }

    /// Field kind with default options, as if the element were a standalone field.
    pub fn to_kind(self) -> FieldKind {
        match self {
            Self::String => FieldKind::String(TagOptions::default()),
            Self::Number => FieldKind::Number { literal: None },
            Self::BigInt => FieldKind::BigInt { literal: None },
            Self::Boolean => FieldKind::Boolean,
            Self::Text => FieldKind::Text(TextOptions::default()),
            Self::Date => FieldKind::Date,
            Self::Point => FieldKind::Point,
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target of a reference or relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaTarget {
    /// The enclosing schema.
    SelfRef,
    Named(String),
}

impl SchemaTarget {
    pub fn parse(raw: &str) -> Self {
        if raw == "self" {
            Self::SelfRef
        } else {
            Self::Named(raw.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::SelfRef => "self",
            Self::Named(name) => name,
        }
    }
}

/// Reference: an array of foreign ids, never indexed.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceDefinition {
    pub schema: SchemaTarget,
    pub optional: bool,
}

/// Relation: like a reference but indexable, with optional edge attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationDefinition {
    pub schema: SchemaTarget,
    pub optional: bool,
    pub indexed: bool,
    pub meta: Option<FieldMap>,
}
