// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Schemas: raw input, canonical form and a registry of named schemas.
//!
//! # Example
//!
//! ```rust
//! use schema_engine::schema::{CanonicalSchema, SchemaRegistry};
//! use serde_json::json;
//!
//! let user = CanonicalSchema::from_json(json!({
//!     "name": "string",
//!     "age": "number",
//!     "tags": { "type": "array" },
//!     "friends": { "type": "reference", "schema": "self" },
//! })).unwrap();
//!
//! assert_eq!(user.data().len(), 3);
//! assert_eq!(user.references().len(), 1);
//!
//! let registry = SchemaRegistry::new();
//! registry.register("User", user);
//! registry.validate_references().unwrap();
//! ```
//!
//! # Design
//!
//! - **Immutable after canonicalization**: share a schema freely via `Arc`
//! - **Registry**: `parking_lot::RwLock` guarded, read-mostly

pub mod canonical;
pub mod field;
pub mod raw;

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::SchemaDefinitionError;
pub use canonical::{canonicalize, SchemaWarning, RESERVED_PREFIX};
pub use field::{
    ArrayOptions, DistanceMetric, ElementType, FieldDefinition, FieldKind, FieldMap,
    PhoneticMatcher, ReferenceDefinition, RelationDefinition, ScalarKind, SchemaTarget,
    TagOptions, TextOptions, VectorAlgorithm, VectorOptions, VectorType,
};
pub use raw::{RawElement, RawElements, RawField, RawFieldDefinition, RawSchema};

/// Fully resolved schema.
///
/// `data` drives the converters and the search compiler; `references` and
/// `relations` are only consulted by reference-resolution paths.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalSchema {
    pub(crate) data: FieldMap,
    pub(crate) references: BTreeMap<String, ReferenceDefinition>,
    pub(crate) relations: BTreeMap<String, RelationDefinition>,
    pub(crate) warnings: Vec<SchemaWarning>,
}

impl CanonicalSchema {
    /// Canonicalize a raw schema.
    pub fn parse(raw: &RawSchema) -> Result<Self, SchemaDefinitionError> {
        canonicalize(raw)
    }

    /// Read a raw schema from JSON and canonicalize it.
    pub fn from_json(json: serde_json::Value) -> Result<Self, SchemaDefinitionError> {
        let raw: RawSchema =
            serde_json::from_value(json).map_err(|e| SchemaDefinitionError::Malformed(e.to_string()))?;
        canonicalize(&raw)
    }

    pub fn data(&self) -> &FieldMap {
        &self.data
    }

    pub fn references(&self) -> &BTreeMap<String, ReferenceDefinition> {
        &self.references
    }

    pub fn relations(&self) -> &BTreeMap<String, RelationDefinition> {
        &self.relations
    }

    /// Non-fatal findings (e.g. unindexable arrays of objects).
    pub fn warnings(&self) -> &[SchemaWarning] {
        &self.warnings
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.data.get(name)
    }

    /// Whether `name` is a reference or relation (skipped by the converters).
    pub fn is_link(&self, name: &str) -> bool {
        self.references.contains_key(name) || self.relations.contains_key(name)
    }

    /// Fully explicit raw equivalent. Canonicalizing it yields `self` again.
    pub fn to_raw(&self) -> RawSchema {
        let mut raw = fields_to_raw(&self.data);
        for (name, reference) in &self.references {
            let mut def = RawFieldDefinition::new("reference");
            def.schema = Some(reference.schema.as_str().to_string());
            def.optional = Some(reference.optional);
            raw.insert(name.clone(), def.into());
        }
        for (name, relation) in &self.relations {
            let mut def = RawFieldDefinition::new("relation");
            def.schema = Some(relation.schema.as_str().to_string());
            def.optional = Some(relation.optional);
            def.indexed = Some(relation.indexed);
            def.meta = relation.meta.as_ref().map(fields_to_raw);
            raw.insert(name.clone(), def.into());
        }
        raw
    }
}

fn fields_to_raw(fields: &FieldMap) -> RawSchema {
    fields
        .iter()
        .map(|(name, field)| (name.clone(), RawField::from(field_to_raw(field))))
        .collect()
}

fn element_to_raw(element: &ElementType) -> RawElement {
    match element {
        ElementType::Scalar(kind) => RawElement::Kind(kind.as_str().to_string()),
        ElementType::Object(fields) => RawElement::Fields(fields_to_raw(fields)),
    }
}

fn field_to_raw(field: &FieldDefinition) -> RawFieldDefinition {
    let mut def = RawFieldDefinition::new(field.type_name());
    def.optional = Some(field.optional);
    def.sortable = Some(field.sortable);
    def.indexed = Some(field.indexed);
    def.default = field.default.as_ref().map(|v| v.to_json());

    match &field.kind {
        FieldKind::String(tag) => {
            def.separator = Some(tag.separator.clone());
            def.case_sensitive = Some(tag.case_sensitive);
        }
        FieldKind::Number { literal } => {
            def.literal = literal.as_ref().map(|list| list.iter().map(|n| serde_json::json!(n)).collect());
        }
        FieldKind::BigInt { literal } => {
            def.literal = literal
                .as_ref()
                .map(|list| list.iter().map(|n| serde_json::Value::String(n.to_string())).collect());
        }
        FieldKind::Text(text) => {
            def.weight = Some(text.weight);
            def.phonetic = text.phonetic.map(|p| p.as_str().to_string());
        }
        FieldKind::Vector(vector) => {
            def.algorithm = Some(vector.algorithm.name().to_string());
            def.vector_type = Some(vector.vector_type.as_str().to_string());
            def.dimension = Some(vector.dimension);
            def.distance = Some(vector.distance.as_str().to_string());
            def.initial_cap = vector.initial_cap;
            match vector.algorithm {
                VectorAlgorithm::Flat { block_size } => def.block_size = Some(block_size),
                VectorAlgorithm::Hnsw {
                    m,
                    ef_construction,
                    ef_runtime,
                    epsilon,
                } => {
                    def.m = Some(m);
                    def.ef_construction = Some(ef_construction);
                    def.ef_runtime = Some(ef_runtime);
                    def.epsilon = Some(epsilon);
                }
            }
        }
        FieldKind::Array(array) => {
            def.separator = Some(array.separator.clone());
            def.elements = Some(match element_to_raw(&array.elements) {
                RawElement::Kind(kind) => RawElements::Kind(kind),
                RawElement::Fields(fields) => RawElements::Fields(fields),
            });
        }
        FieldKind::Tuple(elements) => {
            def.elements = Some(RawElements::Positions(elements.iter().map(element_to_raw).collect()));
        }
        FieldKind::Object(properties) => {
            def.properties = Some(fields_to_raw(properties));
        }
        FieldKind::Boolean | FieldKind::Date | FieldKind::Point => {}
    }
    def
}

/// Registry of named canonical schemas.
///
/// Thread-safe for concurrent reads with occasional writes. Resolves
/// reference and relation targets, including `"self"`.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: RwLock<BTreeMap<String, Arc<CanonicalSchema>>>,
}

impl SchemaRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a schema under `name`.
    pub fn register(&self, name: &str, schema: CanonicalSchema) -> Arc<CanonicalSchema> {
        let schema = Arc::new(schema);
        self.schemas.write().insert(name.to_string(), Arc::clone(&schema));
        schema
    }

    /// Returns `true` if the name was registered.
    pub fn unregister(&self, name: &str) -> bool {
        self.schemas.write().remove(name).is_some()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<CanonicalSchema>> {
        self.schemas.read().get(name).cloned()
    }

    /// Resolve a reference/relation target as seen from schema `owner`.
    #[must_use]
    pub fn resolve_target(&self, owner: &str, target: &SchemaTarget) -> Option<Arc<CanonicalSchema>> {
        match target {
            SchemaTarget::SelfRef => self.get(owner),
            SchemaTarget::Named(name) => self.get(name),
        }
    }

    /// Check that every reference and relation points at a registered schema.
    pub fn validate_references(&self) -> Result<(), SchemaDefinitionError> {
        let schemas = self.schemas.read();
        for schema in schemas.values() {
            let targets = schema
                .references
                .iter()
                .map(|(field, r)| (field, &r.schema))
                .chain(schema.relations.iter().map(|(field, r)| (field, &r.schema)));
            for (field, target) in targets {
                if let SchemaTarget::Named(name) = target {
                    if !schemas.contains_key(name) {
                        return Err(SchemaDefinitionError::UnknownReference {
                            field: field.clone(),
                            target: name.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.schemas.read().keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.schemas.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.read().is_empty()
    }

    pub fn clear(&self) {
        self.schemas.write().clear();
    }
}
