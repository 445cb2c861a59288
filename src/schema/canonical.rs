// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Schema canonicalization.
//!
//! Turns a [`RawSchema`] into a [`CanonicalSchema`]: shorthand expanded,
//! every option defaulted, nested maps resolved recursively, references and
//! relations moved into their side maps.
//!
//! # Resolution rules
//!
//! ```text
//! "string"                        → string, separator ",", case-insensitive
//! { "type": "array" }             → array of string, separator ","
//! { "type": "array",
//!   "elements": { ... } }         → array of objects, NOT indexed (warning)
//! { "type": "object",
//!   "index": false, ... }         → every descendant forced to index: false
//! { "type": "date",
//!   "default": "2024-01-01T..." } → default stored as epoch milliseconds
//! "object" | "tuple" | "reference" | "relation"  → error, needs options
//! ```
//!
//! Canonicalization is all-or-nothing: the first violation aborts with a
//! [`SchemaDefinitionError`] naming the offending key.

use std::collections::BTreeMap;
use std::fmt;

use tracing::warn;

use super::field::{
    ArrayOptions, DistanceMetric, ElementType, FieldDefinition, FieldKind, FieldMap,
    PhoneticMatcher, ReferenceDefinition, RelationDefinition, ScalarKind, SchemaTarget,
    TagOptions, TextOptions, VectorAlgorithm, VectorOptions, VectorType, DEFAULT_SEPARATOR,
};
use super::raw::{RawElement, RawElements, RawField, RawFieldDefinition, RawSchema};
use super::CanonicalSchema;
use crate::error::SchemaDefinitionError;
use crate::value::{Point, Value};

/// Field names may not start with this character.
pub const RESERVED_PREFIX: char = '$';

/// Non-fatal condition found while canonicalizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaWarning {
    /// Arrays of objects cannot be indexed by the search engine.
    UnindexableArray { field: String },
}

impl fmt::Display for SchemaWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaWarning::UnindexableArray { field } => write!(
                f,
                "field '{}' is an array of objects; it is stored but cannot be searched",
                field
            ),
        }
    }
}

type SchemaResult<T> = Result<T, SchemaDefinitionError>;

/// Canonicalize a raw schema.
pub fn canonicalize(raw: &RawSchema) -> SchemaResult<CanonicalSchema> {
    let mut canonicalizer = Canonicalizer::default();
    let mut data = FieldMap::new();
    let mut references = BTreeMap::new();
    let mut relations = BTreeMap::new();

    for (name, field) in raw {
        check_name(name, name)?;
        let def = expand(name, field)?;
        match def.kind.as_str() {
            "reference" => {
                let schema = require_target(name, &def)?;
                references.insert(
                    name.clone(),
                    ReferenceDefinition {
                        schema,
                        optional: def.optional.unwrap_or(false),
                    },
                );
            }
            "relation" => {
                let schema = require_target(name, &def)?;
                let meta = match &def.meta {
                    Some(meta) => Some(canonicalizer.fields(meta, &format!("{}.meta", name), true)?),
                    None => None,
                };
                relations.insert(
                    name.clone(),
                    RelationDefinition {
                        schema,
                        optional: def.optional.unwrap_or(false),
                        indexed: def.indexed.unwrap_or(true),
                        meta,
                    },
                );
            }
            _ => {
                let resolved = canonicalizer.field(name, &def, matches!(field, RawField::Shorthand(_)), true)?;
                data.insert(name.clone(), resolved);
            }
        }
    }

    Ok(CanonicalSchema {
        data,
        references,
        relations,
        warnings: canonicalizer.warnings,
    })
}

#[derive(Default)]
struct Canonicalizer {
    warnings: Vec<SchemaWarning>,
}

impl Canonicalizer {
    /// Resolve a nested field map (object properties, array/tuple element maps).
    fn fields(&mut self, raw: &RawSchema, prefix: &str, inherited_index: bool) -> SchemaResult<FieldMap> {
        let mut out = FieldMap::new();
        for (name, field) in raw {
            let path = format!("{}.{}", prefix, name);
            check_name(name, &path)?;
            let def = expand(&path, field)?;
            if matches!(def.kind.as_str(), "reference" | "relation") {
                return Err(SchemaDefinitionError::InvalidOption {
                    field: path,
                    option: "type",
                    value: def.kind.clone(),
                    hint: "references and relations are only allowed at the top level of a schema",
                });
            }
            let shorthand = matches!(field, RawField::Shorthand(_));
            out.insert(name.clone(), self.field(&path, &def, shorthand, inherited_index)?);
        }
        Ok(out)
    }

    fn field(
        &mut self,
        path: &str,
        def: &RawFieldDefinition,
        shorthand: bool,
        inherited_index: bool,
    ) -> SchemaResult<FieldDefinition> {
        let mut indexed = inherited_index && def.indexed.unwrap_or(true);
        let mut sortable = def.sortable.unwrap_or(false);

        let kind = match def.kind.as_str() {
            "string" => FieldKind::String(TagOptions {
                separator: separator(path, def)?,
                case_sensitive: def.case_sensitive.unwrap_or(false),
            }),
            "number" => FieldKind::Number {
                literal: number_literals(path, def)?,
            },
            "bigint" => FieldKind::BigInt {
                literal: bigint_literals(path, def)?,
            },
            "boolean" => FieldKind::Boolean,
            "text" => FieldKind::Text(text_options(path, def)?),
            "date" => {
                sortable = false;
                FieldKind::Date
            }
            "point" => FieldKind::Point,
            "vector" => FieldKind::Vector(if shorthand {
                VectorOptions::shorthand()
            } else {
                vector_options(path, def)?
            }),
            "array" => {
                let separator = separator(path, def)?;
                let elements = match &def.elements {
                    None => ElementType::Scalar(ScalarKind::String),
                    Some(RawElements::Kind(kind)) => ElementType::Scalar(element_kind(path, kind)?),
                    Some(RawElements::Fields(map)) => {
                        let warning = SchemaWarning::UnindexableArray {
                            field: path.to_string(),
                        };
                        warn!(field = %path, "{}", warning);
                        self.warnings.push(warning);
                        indexed = false;
                        ElementType::Object(self.fields(map, path, indexed)?)
                    }
                    Some(RawElements::Positions(_)) => {
                        return Err(SchemaDefinitionError::InvalidOption {
                            field: path.to_string(),
                            option: "elements",
                            value: "[...]".into(),
                            hint: "arrays take a single element kind or field map; use \"type\": \"tuple\" for positional elements",
                        })
                    }
                };
                FieldKind::Array(ArrayOptions { elements, separator })
            }
            "tuple" => {
                let positions = match &def.elements {
                    Some(RawElements::Positions(items)) if !items.is_empty() => items,
                    Some(RawElements::Positions(_)) | None => {
                        return Err(SchemaDefinitionError::EmptyTuple {
                            field: path.to_string(),
                        })
                    }
                    Some(_) => {
                        return Err(SchemaDefinitionError::InvalidOption {
                            field: path.to_string(),
                            option: "elements",
                            value: "non-list".into(),
                            hint: "tuple elements are a list such as [\"number\", \"string\"]",
                        })
                    }
                };
                let mut elements = Vec::with_capacity(positions.len());
                for (i, element) in positions.iter().enumerate() {
                    let element_path = format!("{}.{}", path, i);
                    elements.push(match element {
                        RawElement::Kind(kind) => ElementType::Scalar(element_kind(&element_path, kind)?),
                        RawElement::Fields(map) => ElementType::Object(self.fields(map, &element_path, indexed)?),
                    });
                }
                FieldKind::Tuple(elements)
            }
            "object" => {
                let properties = def.properties.as_ref().ok_or_else(|| SchemaDefinitionError::MissingOption {
                    field: path.to_string(),
                    option: "properties",
                    hint: "describe the nested fields under \"properties\"",
                })?;
                FieldKind::Object(self.fields(properties, path, indexed)?)
            }
            other => {
                return Err(SchemaDefinitionError::UnknownKind {
                    field: path.to_string(),
                    kind: other.to_string(),
                })
            }
        };

        let default = match &def.default {
            Some(json) => Some(coerce_default(path, &kind, json)?),
            None => None,
        };

        Ok(FieldDefinition {
            kind,
            optional: def.optional.unwrap_or(false),
            sortable,
            indexed,
            default,
        })
    }
}

fn check_name(name: &str, path: &str) -> SchemaResult<()> {
    if name.starts_with(RESERVED_PREFIX) {
        return Err(SchemaDefinitionError::ReservedName {
            field: path.to_string(),
        });
    }
    Ok(())
}

/// Expand shorthand into a definition, rejecting kinds that need options.
fn expand(path: &str, field: &RawField) -> SchemaResult<RawFieldDefinition> {
    match field {
        RawField::Definition(def) => Ok((**def).clone()),
        RawField::Shorthand(kind) => {
            let hint = match kind.as_str() {
                "object" => Some("\"properties\": { ... }"),
                "tuple" => Some("\"elements\": [ ... ]"),
                "reference" | "relation" => Some("\"schema\": \"<name>\" or \"self\""),
                _ => None,
            };
            match hint {
                Some(hint) => Err(SchemaDefinitionError::ShorthandNotAllowed {
                    field: path.to_string(),
                    kind: kind.clone(),
                    hint,
                }),
                None => Ok(RawFieldDefinition::new(kind.as_str())),
            }
        }
    }
}

fn require_target(path: &str, def: &RawFieldDefinition) -> SchemaResult<SchemaTarget> {
    def.schema
        .as_deref()
        .map(SchemaTarget::parse)
        .ok_or_else(|| SchemaDefinitionError::MissingOption {
            field: path.to_string(),
            option: "schema",
            hint: "name the target schema or use \"self\"",
        })
}

fn separator(path: &str, def: &RawFieldDefinition) -> SchemaResult<String> {
    match &def.separator {
        None => Ok(DEFAULT_SEPARATOR.to_string()),
        Some(sep) if sep.chars().count() == 1 => Ok(sep.clone()),
        Some(sep) => Err(SchemaDefinitionError::InvalidOption {
            field: path.to_string(),
            option: "separator",
            value: sep.clone(),
            hint: "use a single character",
        }),
    }
}

fn element_kind(path: &str, raw: &str) -> SchemaResult<ScalarKind> {
    ScalarKind::parse(raw).ok_or_else(|| SchemaDefinitionError::InvalidOption {
        field: path.to_string(),
        option: "elements",
        value: raw.to_string(),
        hint: "elements must be string, number, bigint, boolean, text, date, point or a field map",
    })
}

fn number_literals(path: &str, def: &RawFieldDefinition) -> SchemaResult<Option<Vec<f64>>> {
    let Some(list) = &def.literal else {
        return Ok(None);
    };
    list.iter()
        .map(|v| {
            v.as_f64().ok_or_else(|| SchemaDefinitionError::InvalidOption {
                field: path.to_string(),
                option: "literal",
                value: v.to_string(),
                hint: "number literals must be numbers",
            })
        })
        .collect::<SchemaResult<Vec<_>>>()
        .map(Some)
}

fn bigint_literals(path: &str, def: &RawFieldDefinition) -> SchemaResult<Option<Vec<i128>>> {
    let Some(list) = &def.literal else {
        return Ok(None);
    };
    list.iter()
        .map(|v| {
            json_to_i128(v).ok_or_else(|| SchemaDefinitionError::InvalidOption {
                field: path.to_string(),
                option: "literal",
                value: v.to_string(),
                hint: "bigint literals must be integers or integer strings",
            })
        })
        .collect::<SchemaResult<Vec<_>>>()
        .map(Some)
}

fn text_options(path: &str, def: &RawFieldDefinition) -> SchemaResult<TextOptions> {
    let weight = def.weight.unwrap_or(1.0);
    if !(weight.is_finite() && weight > 0.0) {
        return Err(SchemaDefinitionError::InvalidOption {
            field: path.to_string(),
            option: "weight",
            value: weight.to_string(),
            hint: "weight must be a positive number",
        });
    }
    let phonetic = match &def.phonetic {
        None => None,
        Some(raw) => Some(PhoneticMatcher::parse(raw).ok_or_else(|| SchemaDefinitionError::InvalidOption {
            field: path.to_string(),
            option: "phonetic",
            value: raw.clone(),
            hint: "use dm:en, dm:fr, dm:pt or dm:es",
        })?),
    };
    Ok(TextOptions { weight, phonetic })
}

fn vector_options(path: &str, def: &RawFieldDefinition) -> SchemaResult<VectorOptions> {
    let missing = |option: &'static str, hint: &'static str| SchemaDefinitionError::MissingOption {
        field: path.to_string(),
        option,
        hint,
    };
    let invalid = |option: &'static str, value: String, hint: &'static str| SchemaDefinitionError::InvalidOption {
        field: path.to_string(),
        option,
        value,
        hint,
    };

    let algorithm_name = def
        .algorithm
        .as_deref()
        .ok_or_else(|| missing("algorithm", "set \"algorithm\" to FLAT or HNSW"))?;
    let distance_name = def
        .distance
        .as_deref()
        .ok_or_else(|| missing("distance", "set \"distance\" to L2, IP or COSINE"))?;
    let type_name = def
        .vector_type
        .as_deref()
        .ok_or_else(|| missing("vectorType", "set \"vectorType\" to FLOAT32 or FLOAT64"))?;
    let dimension = def
        .dimension
        .ok_or_else(|| missing("dimension", "set \"dimension\" to the embedding length"))?;

    if dimension == 0 {
        return Err(invalid("dimension", "0".into(), "dimension must be positive"));
    }

    let algorithm = match algorithm_name.to_ascii_uppercase().as_str() {
        "FLAT" => VectorAlgorithm::Flat {
            block_size: def.block_size.unwrap_or(1024),
        },
        "HNSW" => VectorAlgorithm::Hnsw {
            m: def.m.unwrap_or(16),
            ef_construction: def.ef_construction.unwrap_or(200),
            ef_runtime: def.ef_runtime.unwrap_or(10),
            epsilon: def.epsilon.unwrap_or(0.01),
        },
        _ => return Err(invalid("algorithm", algorithm_name.to_string(), "use FLAT or HNSW")),
    };
    let distance = DistanceMetric::parse(distance_name)
        .ok_or_else(|| invalid("distance", distance_name.to_string(), "use L2, IP or COSINE"))?;
    let vector_type = VectorType::parse(type_name)
        .ok_or_else(|| invalid("vectorType", type_name.to_string(), "use FLOAT32 or FLOAT64"))?;

    Ok(VectorOptions {
        algorithm,
        vector_type,
        dimension,
        distance,
        initial_cap: def.initial_cap,
    })
}

fn json_to_i128(v: &serde_json::Value) -> Option<i128> {
    match v {
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(i128::from)
            .or_else(|| n.as_u64().map(i128::from)),
        serde_json::Value::String(s) => s.trim().parse::<i128>().ok(),
        _ => None,
    }
}

/// Convert a raw JSON default into the value the field kind stores.
fn coerce_default(path: &str, kind: &FieldKind, json: &serde_json::Value) -> SchemaResult<Value> {
    let bad = |reason: &str| SchemaDefinitionError::InvalidDefault {
        field: path.to_string(),
        value: json.to_string(),
        reason: reason.to_string(),
    };

    if json.is_null() {
        return Ok(Value::Null);
    }

    match kind {
        FieldKind::String(_) | FieldKind::Text(_) => match json {
            serde_json::Value::String(s) => Ok(Value::String(s.clone())),
            serde_json::Value::Number(_) | serde_json::Value::Bool(_) => Ok(Value::String(json.to_string())),
            _ => Err(bad("expected a string")),
        },
        FieldKind::Number { literal } => {
            let n = json.as_f64().ok_or_else(|| bad("expected a number"))?;
            if let Some(allowed) = literal {
                if !allowed.contains(&n) {
                    return Err(bad("not one of the allowed literals"));
                }
            }
            Ok(Value::Number(n))
        }
        FieldKind::BigInt { literal } => {
            let n = json_to_i128(json).ok_or_else(|| bad("expected an integer"))?;
            if let Some(allowed) = literal {
                if !allowed.contains(&n) {
                    return Err(bad("not one of the allowed literals"));
                }
            }
            Ok(Value::BigInt(n))
        }
        FieldKind::Boolean => json.as_bool().map(Value::Bool).ok_or_else(|| bad("expected a boolean")),
        FieldKind::Date => Value::from_json(json)
            .to_epoch_millis()
            .map(|ms| Value::Number(ms as f64))
            .ok_or_else(|| bad("expected epoch milliseconds or an RFC 3339 string")),
        FieldKind::Point => {
            let point = match json {
                serde_json::Value::String(s) => Point::parse(s),
                serde_json::Value::Object(_) => serde_json::from_value::<Point>(json.clone()).ok(),
                _ => None,
            }
            .ok_or_else(|| bad("expected {\"longitude\", \"latitude\"}"))?;
            if !point.is_valid() {
                return Err(bad("coordinates out of range"));
            }
            Ok(Value::Point(point))
        }
        FieldKind::Vector(options) => {
            let items = json.as_array().ok_or_else(|| bad("expected an array of numbers"))?;
            if items.len() != options.dimension as usize {
                return Err(bad("length does not match the vector dimension"));
            }
            items
                .iter()
                .map(|v| v.as_f64().map(Value::Number).ok_or_else(|| bad("expected an array of numbers")))
                .collect::<SchemaResult<Vec<_>>>()
                .map(Value::Array)
        }
        FieldKind::Array(options) => {
            let items = json.as_array().ok_or_else(|| bad("expected an array"))?;
            items
                .iter()
                .enumerate()
                .map(|(i, item)| coerce_element(&format!("{}.{}", path, i), &options.elements, item))
                .collect::<SchemaResult<Vec<_>>>()
                .map(Value::Array)
        }
        FieldKind::Tuple(elements) => {
            let items = json.as_array().ok_or_else(|| bad("expected an array"))?;
            if items.len() != elements.len() {
                return Err(bad("length does not match the tuple"));
            }
            elements
                .iter()
                .zip(items)
                .enumerate()
                .map(|(i, (element, item))| coerce_element(&format!("{}.{}", path, i), element, item))
                .collect::<SchemaResult<Vec<_>>>()
                .map(Value::Array)
        }
        FieldKind::Object(properties) => coerce_object(path, properties, json),
    }
}

fn coerce_element(path: &str, element: &ElementType, json: &serde_json::Value) -> SchemaResult<Value> {
    match element {
        ElementType::Scalar(kind) => coerce_default(path, &kind.to_kind(), json),
        ElementType::Object(properties) => coerce_object(path, properties, json),
    }
}

fn coerce_object(path: &str, properties: &FieldMap, json: &serde_json::Value) -> SchemaResult<Value> {
    let map = json.as_object().ok_or_else(|| SchemaDefinitionError::InvalidDefault {
        field: path.to_string(),
        value: json.to_string(),
        reason: "expected an object".into(),
    })?;
    let mut doc = BTreeMap::new();
    for (key, item) in map {
        let value = match properties.get(key) {
            Some(field) => coerce_default(&format!("{}.{}", path, key), &field.kind, item)?,
            None => Value::from_json(item),
        };
        doc.insert(key.clone(), value);
    }
    Ok(Value::Object(doc))
}
