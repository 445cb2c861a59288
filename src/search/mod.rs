// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Search Infrastructure
//!
//! Compiles fluent clause chains into RediSearch `FT.SEARCH` query strings and
//! emits `FT.CREATE` index definitions from the same canonical schema.
//!
//! # Architecture
//!
//! ```text
//! Search::where(path)
//!     ↓ resolve path against CanonicalSchema
//! FieldBuilder (TAG | NUMERIC | TEXT | GEO | VECTOR)
//!     ↓ operators fill the builder
//! Search::compile() → CompiledQuery { query, dialect, params, ... }
//! ```
//!
//! # Example
//!
//! ```rust
//! use schema_engine::schema::CanonicalSchema;
//! use schema_engine::search::Search;
//! use schema_engine::StorageKind;
//! use serde_json::json;
//!
//! let schema = CanonicalSchema::from_json(json!({
//!     "name": "string",
//!     "age": "number",
//!     "tags": { "type": "array" },
//! })).unwrap();
//!
//! let mut search = Search::new(&schema, StorageKind::Json);
//! search.r#where("age").unwrap().gte(30).unwrap()
//!     .and("tags").unwrap().eq("x").unwrap();
//!
//! assert_eq!(search.render().unwrap(), "(@age:[30 +inf]) (@tags:{x})");
//! ```
//!
//! # Query Language (RediSearch syntax)
//!
//! ```text
//! (@tags:{rust | db})           - Tag membership (OR)
//! (@age:[25 40])                - Numeric range, `(` marks an exclusive bound
//! (@bio:"exact phrase")         - Full-text phrase
//! (@home:[2.35 48.85 5 km])     - Geo radius
//! (-(@deleted:{true}))          - NOT
//! (@a:{x}) (@b:[1 2])           - AND (implicit)
//! *=>[KNN 10 @embedding $BLOB]  - Vector nearest neighbours (dialect 2)
//! ```

mod builders;
mod escape;
mod geo;
mod index;
mod session;

pub use builders::{
    vector_blob, FieldBuilder, GeoBuilder, RangeBuilder, TagBuilder, TagFlavor, TextBuilder,
    VectorBuilder, VectorMode,
};
pub use escape::{escape_tag, unescape_tag, TAG_SPECIAL_CHARS};
pub use geo::{Circle, DistanceUnit};
pub use index::{IndexDefinition, IndexField};
pub use session::{alias_for, Clause, CompiledQuery, Search, SortOrder, KNN_PARAM, VECTOR_DIALECT};
