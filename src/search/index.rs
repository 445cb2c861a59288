// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Index definition emitted from a canonical schema.
//!
//! # FT.CREATE layout
//!
//! ```text
//! FT.CREATE idx:users
//!   ON JSON
//!   PREFIX 1 app:users:
//!   SCHEMA
//!     $.name AS name TAG SEPARATOR ,
//!     $.age AS age NUMERIC SORTABLE
//!     $.tags[*] AS tags TAG
//!     $.address.city AS address_city TAG SEPARATOR ,
//!     $.embedding AS embedding VECTOR FLAT 8 TYPE FLOAT32 DIM 128 DISTANCE_METRIC L2 BLOCK_SIZE 1024
//! ```
//!
//! Hash storage indexes top-level fields by name; objects and tuples cannot be
//! stored flat and are left out. Arrays of objects and non-indexed fields are
//! never indexed.

use sha2::{Digest, Sha256};

use super::session::alias_for;
use crate::config::{ModelConfig, StorageKind};
use crate::schema::{
    ArrayOptions, CanonicalSchema, ElementType, FieldDefinition, FieldKind, FieldMap, ScalarKind,
    VectorAlgorithm, VectorOptions,
};
use crate::value::format_number;

/// One `SCHEMA` entry.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexField {
    /// Hash field name or JSON path
    pub path: String,
    /// Name used in queries
    pub alias: String,
    /// Type and options, e.g. `["NUMERIC", "SORTABLE"]`
    pub attributes: Vec<String>,
}

impl IndexField {
    fn to_schema_args(&self) -> Vec<String> {
        let mut args = vec![self.path.clone()];
        if self.path != self.alias {
            args.push("AS".to_string());
            args.push(self.alias.clone());
        }
        args.extend(self.attributes.iter().cloned());
        args
    }
}

/// Search index over one model's keys.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDefinition {
    pub name: String,
    pub storage: StorageKind,
    /// Key prefix the index covers; empty covers every key.
    pub prefix: String,
    pub fields: Vec<IndexField>,
}

impl IndexDefinition {
    pub fn from_schema(name: &str, schema: &CanonicalSchema, config: &ModelConfig) -> Self {
        let mut fields = Vec::new();
        match config.storage {
            StorageKind::Hash => hash_fields(schema.data(), &mut fields),
            StorageKind::Json => json_fields(schema.data(), "$", "", &mut fields),
        }
        Self {
            name: config.index_name(name),
            storage: config.storage,
            prefix: config.key_prefix.clone(),
            fields,
        }
    }

    /// Arguments for `FT.CREATE`, index name first.
    pub fn to_ft_create_args(&self) -> Vec<String> {
        let mut args = vec![
            self.name.clone(),
            "ON".to_string(),
            self.storage.as_str().to_string(),
        ];
        if !self.prefix.is_empty() {
            args.push("PREFIX".to_string());
            args.push("1".to_string());
            args.push(self.prefix.clone());
        }
        args.push("SCHEMA".to_string());
        for field in &self.fields {
            args.extend(field.to_schema_args());
        }
        args
    }

    /// Hex SHA-256 of the `FT.CREATE` arguments.
    ///
    /// Stored next to the index so an unchanged schema skips re-creation.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for arg in self.to_ft_create_args() {
            hasher.update((arg.len() as u64).to_le_bytes());
            hasher.update(arg.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

fn sortable(field: &FieldDefinition, mut attributes: Vec<String>) -> Vec<String> {
    if field.sortable {
        attributes.push("SORTABLE".to_string());
    }
    attributes
}

fn tag(separator: Option<&str>, case_sensitive: bool) -> Vec<String> {
    let mut attributes = vec!["TAG".to_string()];
    if let Some(separator) = separator {
        attributes.push("SEPARATOR".to_string());
        attributes.push(separator.to_string());
    }
    if case_sensitive {
        attributes.push("CASESENSITIVE".to_string());
    }
    attributes
}

fn vector(options: &VectorOptions) -> Vec<String> {
    let mut params = vec![
        ("TYPE", options.vector_type.as_str().to_string()),
        ("DIM", options.dimension.to_string()),
        ("DISTANCE_METRIC", options.distance.as_str().to_string()),
    ];
    if let Some(cap) = options.initial_cap {
        params.push(("INITIAL_CAP", cap.to_string()));
    }
    match options.algorithm {
        VectorAlgorithm::Flat { block_size } => params.push(("BLOCK_SIZE", block_size.to_string())),
        VectorAlgorithm::Hnsw {
            m,
            ef_construction,
            ef_runtime,
            epsilon,
        } => {
            params.push(("M", m.to_string()));
            params.push(("EF_CONSTRUCTION", ef_construction.to_string()));
            params.push(("EF_RUNTIME", ef_runtime.to_string()));
            params.push(("EPSILON", format_number(epsilon)));
        }
    }

    let mut attributes = vec![
        "VECTOR".to_string(),
        options.algorithm.name().to_string(),
        (params.len() * 2).to_string(),
    ];
    for (name, value) in params {
        attributes.push(name.to_string());
        attributes.push(value);
    }
    attributes
}

/// Attributes for a scalar kind. `None` for structural kinds.
fn leaf(field: &FieldDefinition, kind: &FieldKind) -> Option<Vec<String>> {
    let attributes = match kind {
        FieldKind::String(options) => sortable(field, tag(Some(options.separator.as_str()), options.case_sensitive)),
        FieldKind::BigInt { .. } | FieldKind::Boolean => sortable(field, tag(None, false)),
        FieldKind::Number { .. } | FieldKind::Date => sortable(field, vec!["NUMERIC".to_string()]),
        FieldKind::Text(options) => {
            let mut attributes = vec!["TEXT".to_string()];
            if options.weight != 1.0 {
                attributes.push("WEIGHT".to_string());
                attributes.push(format_number(options.weight));
            }
            if let Some(matcher) = options.phonetic {
                attributes.push("PHONETIC".to_string());
                attributes.push(matcher.as_str().to_string());
            }
            sortable(field, attributes)
        }
        FieldKind::Point => vec!["GEO".to_string()],
        FieldKind::Vector(options) => vector(options),
        FieldKind::Array(_) | FieldKind::Tuple(_) | FieldKind::Object(_) => return None,
    };
    Some(attributes)
}

fn scalar_element(kind: ScalarKind) -> Vec<String> {
    match kind {
        ScalarKind::String | ScalarKind::BigInt | ScalarKind::Boolean => tag(None, false),
        ScalarKind::Number | ScalarKind::Date => vec!["NUMERIC".to_string()],
        ScalarKind::Text => vec!["TEXT".to_string()],
        ScalarKind::Point => vec!["GEO".to_string()],
    }
}

fn hash_fields(fields: &FieldMap, out: &mut Vec<IndexField>) {
    for (name, field) in fields {
        if !field.indexed {
            continue;
        }
        let attributes = match &field.kind {
            // Flat arrays are separator-joined strings, so any element kind is a TAG.
            FieldKind::Array(ArrayOptions {
                elements: ElementType::Scalar(_),
                separator,
            }) => tag(Some(separator.as_str()), false),
            kind => match leaf(field, kind) {
                Some(attributes) => attributes,
                None => continue,
            },
        };
        out.push(IndexField {
            path: name.clone(),
            alias: name.clone(),
            attributes,
        });
    }
}

fn json_fields(fields: &FieldMap, json_prefix: &str, name_prefix: &str, out: &mut Vec<IndexField>) {
    for (name, field) in fields {
        if !field.indexed {
            continue;
        }
        let json_path = format!("{}.{}", json_prefix, name);
        let name_path = if name_prefix.is_empty() {
            name.clone()
        } else {
            format!("{}.{}", name_prefix, name)
        };
        json_kind(field, &field.kind, &json_path, &name_path, out);
    }
}

fn json_kind(field: &FieldDefinition, kind: &FieldKind, json_path: &str, name_path: &str, out: &mut Vec<IndexField>) {
    let attributes = match kind {
        FieldKind::Object(properties) => return json_fields(properties, json_path, name_path, out),
        FieldKind::Array(ArrayOptions {
            elements: ElementType::Scalar(element),
            ..
        }) => {
            out.push(IndexField {
                path: format!("{}[*]", json_path),
                alias: alias_for(name_path),
                attributes: scalar_element(*element),
            });
            return;
        }
        FieldKind::Array(_) => return,
        FieldKind::Tuple(elements) => {
            for (position, element) in elements.iter().enumerate() {
                let json_path = format!("{}[{}]", json_path, position);
                let name_path = format!("{}.{}", name_path, position);
                match element {
                    ElementType::Scalar(kind) => out.push(IndexField {
                        path: json_path,
                        alias: alias_for(&name_path),
                        attributes: scalar_element(*kind),
                    }),
                    ElementType::Object(properties) => json_fields(properties, &json_path, &name_path, out),
                }
            }
            return;
        }
        kind => match leaf(field, kind) {
            Some(attributes) => attributes,
            None => return,
        },
    };
    out.push(IndexField {
        path: json_path.to_string(),
        alias: alias_for(name_path),
        attributes,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> CanonicalSchema {
        CanonicalSchema::from_json(json!({
            "name": { "type": "string", "sortable": true },
            "age": { "type": "number", "sortable": true },
            "code": { "type": "string", "caseSensitive": true },
            "active": "boolean",
            "bio": { "type": "text", "weight": 2, "phonetic": "dm:en" },
            "born": "date",
            "home": "point",
            "tags": { "type": "array", "separator": "|" },
            "scores": { "type": "array", "elements": "number" },
            "hidden": { "type": "string", "index": false },
            "address": { "type": "object", "properties": { "city": "string" } },
            "comments": { "type": "array", "elements": { "author": "string" } },
            "pair": { "type": "tuple", "elements": ["number", { "label": "text" }] },
            "embedding": "vector",
            "friends": { "type": "reference", "schema": "self" },
        }))
        .unwrap()
    }

    fn command(def: &IndexDefinition) -> String {
        format!("FT.CREATE {}", def.to_ft_create_args().join(" "))
    }

    #[test]
    fn test_json_index() {
        let config = ModelConfig {
            key_prefix: "app:users:".into(),
            ..Default::default()
        };
        let def = IndexDefinition::from_schema("users", &schema(), &config);
        let cmd = command(&def);

        assert!(cmd.starts_with("FT.CREATE idx:users ON JSON PREFIX 1 app:users: SCHEMA "));
        assert!(cmd.contains("$.name AS name TAG SEPARATOR , SORTABLE"));
        assert!(cmd.contains("$.age AS age NUMERIC SORTABLE"));
        assert!(cmd.contains("$.code AS code TAG SEPARATOR , CASESENSITIVE"));
        assert!(cmd.contains("$.active AS active TAG"));
        assert!(cmd.contains("$.bio AS bio TEXT WEIGHT 2 PHONETIC dm:en"));
        assert!(cmd.contains("$.born AS born NUMERIC"));
        assert!(cmd.contains("$.home AS home GEO"));
        assert!(cmd.contains("$.tags[*] AS tags TAG"));
        assert!(cmd.contains("$.scores[*] AS scores NUMERIC"));
        assert!(cmd.contains("$.address.city AS address_city TAG SEPARATOR ,"));
        assert!(cmd.contains("$.pair[0] AS pair_0 NUMERIC"));
        assert!(cmd.contains("$.pair[1].label AS pair_1_label TEXT"));
        assert!(cmd.contains(
            "$.embedding AS embedding VECTOR FLAT 8 TYPE FLOAT32 DIM 128 DISTANCE_METRIC L2 BLOCK_SIZE 1024"
        ));

        assert!(!cmd.contains("hidden"));
        assert!(!cmd.contains("comments"));
        assert!(!cmd.contains("friends"));
    }

    #[test]
    fn test_hash_index() {
        let config = ModelConfig {
            storage: StorageKind::Hash,
            ..Default::default()
        };
        let def = IndexDefinition::from_schema("users", &schema(), &config);
        let cmd = command(&def);

        assert!(cmd.starts_with("FT.CREATE idx:users ON HASH SCHEMA "));
        assert!(cmd.contains(" name TAG SEPARATOR , SORTABLE"));
        assert!(cmd.contains(" tags TAG SEPARATOR |"));
        assert!(cmd.contains(" scores TAG SEPARATOR ,"));
        assert!(!cmd.contains("address"));
        assert!(!cmd.contains("pair"));
        assert!(!cmd.contains(" AS "));
    }

    #[test]
    fn test_hnsw_attribute_count() {
        let schema = CanonicalSchema::from_json(json!({
            "v": {
                "type": "vector", "algorithm": "HNSW", "vectorType": "FLOAT64",
                "dimension": 4, "distance": "COSINE", "initialCap": 100
            }
        }))
        .unwrap();
        let def = IndexDefinition::from_schema("v", &schema, &ModelConfig::default());
        let attributes = &def.fields[0].attributes;
        assert_eq!(&attributes[..3], ["VECTOR", "HNSW", "16"]);
        assert_eq!(attributes.len(), 3 + 16);
        assert!(attributes.contains(&"EPSILON".to_string()));
        assert!(attributes.contains(&"0.01".to_string()));
    }

    #[test]
    fn test_fingerprint_tracks_schema() {
        let config = ModelConfig::default();
        let a = IndexDefinition::from_schema("users", &schema(), &config);
        let b = IndexDefinition::from_schema("users", &schema(), &config);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);

        let other = CanonicalSchema::from_json(json!({ "name": "text" })).unwrap();
        let c = IndexDefinition::from_schema("users", &other, &config);
        assert_ne!(a.fingerprint(), c.fingerprint());
    }
}
