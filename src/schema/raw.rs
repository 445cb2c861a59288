// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Raw schema input.
//!
//! A raw schema is what callers write: each field is either a bare kind name
//! (`"string"`) or a partial option object (`{"type": "array"}`). Any serde
//! format works; JSON is the common case.
//!
//! ```
//! use schema_engine::schema::RawSchema;
//!
//! let raw: RawSchema = serde_json::from_value(serde_json::json!({
//!     "name": "string",
//!     "tags": { "type": "array", "separator": "|" },
//! })).unwrap();
//! assert_eq!(raw.len(), 2);
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Name → raw field map.
pub type RawSchema = BTreeMap<String, RawField>;

/// A raw field: shorthand kind name or partial definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawField {
    Shorthand(String),
    Definition(Box<RawFieldDefinition>),
}

impl From<&str> for RawField {
    fn from(kind: &str) -> Self {
        RawField::Shorthand(kind.to_string())
    }
}

impl From<RawFieldDefinition> for RawField {
    fn from(def: RawFieldDefinition) -> Self {
        RawField::Definition(Box::new(def))
    }
}

/// Partial field definition. Absent options take kind-specific defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFieldDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sortable: Option<bool>,
    #[serde(default, rename = "index", alias = "indexed", skip_serializing_if = "Option::is_none")]
    pub indexed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,

    // string / array
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_sensitive: Option<bool>,

    // text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phonetic: Option<String>,

    // number / bigint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub literal: Option<Vec<serde_json::Value>>,

    // vector
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_cap: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub m: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ef_construction: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ef_runtime: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epsilon: Option<f64>,

    // array / tuple / object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elements: Option<RawElements>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<RawSchema>,

    // reference / relation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<RawSchema>,
}

impl RawFieldDefinition {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Default::default()
        }
    }
}

/// `elements` of an array (kind or field map) or a tuple (list of positions).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawElements {
    Kind(String),
    Fields(RawSchema),
    Positions(Vec<RawElement>),
}

/// One tuple position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawElement {
    Kind(String),
    Fields(RawSchema),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_mixed_schema() {
        let raw: RawSchema = serde_json::from_value(json!({
            "name": "string",
            "address": { "type": "object", "properties": { "city": "string" } },
            "pair": { "type": "tuple", "elements": ["number", { "x": "string" }] },
            "hidden": { "type": "text", "index": false },
        }))
        .unwrap();

        assert_eq!(raw["name"], RawField::Shorthand("string".into()));
        match &raw["pair"] {
            RawField::Definition(def) => match def.elements.as_ref().unwrap() {
                RawElements::Positions(items) => assert_eq!(items.len(), 2),
                other => panic!("expected positions, got {:?}", other),
            },
            other => panic!("expected definition, got {:?}", other),
        }
        match &raw["hidden"] {
            RawField::Definition(def) => assert_eq!(def.indexed, Some(false)),
            other => panic!("expected definition, got {:?}", other),
        }
    }

    #[test]
    fn test_indexed_alias() {
        let def: RawFieldDefinition =
            serde_json::from_value(json!({ "type": "string", "indexed": false })).unwrap();
        assert_eq!(def.indexed, Some(false));
        let back = serde_json::to_value(&def).unwrap();
        assert_eq!(back, json!({ "type": "string", "index": false }));
    }
}
