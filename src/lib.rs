// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # Schema Engine
//!
//! Schema-driven document mapping for RediSearch-capable stores.
//!
//! ## Architecture
//!
//! A raw schema is canonicalized once; everything else is a pure function of
//! the canonical schema and caller-supplied values:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Raw schema (serde)                      │
//! │  • Shorthand kinds ("string") or full definitions          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │  canonicalize()
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      CanonicalSchema                        │
//! │  • Every option defaulted, immutable, shareable via Arc    │
//! └─────────────────────────────────────────────────────────────┘
//!          │                   │                    │
//!          ▼                   ▼                    ▼
//! ┌────────────────┐  ┌─────────────────┐  ┌──────────────────┐
//! │ document::flat │  │ document::nested│  │ search::Search   │
//! │ hash codec     │  │ JSON codec      │  │ FT.SEARCH query  │
//! └────────────────┘  └─────────────────┘  └──────────────────┘
//!          │                   │                    │
//!          └───────────────────┼────────────────────┘
//!                              ▼
//!                   Model  ──▶  StoreClient
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use schema_engine::document::encode_flat;
//! use schema_engine::schema::CanonicalSchema;
//! use schema_engine::search::Search;
//! use schema_engine::{Document, StorageKind, Value};
//! use serde_json::json;
//!
//! let schema = CanonicalSchema::from_json(json!({
//!     "name": "string",
//!     "age": "number",
//!     "tags": { "type": "array" },
//! })).unwrap();
//!
//! let mut doc = Document::new();
//! doc.insert("name".into(), Value::from("Ada"));
//! doc.insert("age".into(), Value::from(33));
//! doc.insert("tags".into(), Value::from(vec!["x", "y"]));
//!
//! let flat = encode_flat(&schema, &doc).unwrap();
//! assert_eq!(flat["age"], "33");
//! assert_eq!(flat["tags"], "x,y");
//!
//! let mut search = Search::new(&schema, StorageKind::Hash);
//! search.r#where("age").unwrap().gte(30).unwrap()
//!     .and("tags").unwrap().eq("x").unwrap();
//! assert_eq!(search.render().unwrap(), "(@age:[30 +inf]) (@tags:{x})");
//! ```
//!
//! ## Modules
//!
//! - [`schema`]: raw input, canonicalization and the schema registry
//! - [`document`]: flat (hash) and nested (JSON) converters
//! - [`search`]: query builders, the search session and index definitions
//! - [`storage`]: store client contract and an in-memory store
//! - [`model`]: a schema bound to a store client

#![deny(rustdoc::broken_intra_doc_links)]

pub mod config;
pub mod document;
pub mod error;
pub mod model;
pub mod schema;
pub mod search;
pub mod storage;
pub mod value;

pub use config::{ModelConfig, StorageKind};
pub use error::{DecodeError, EncodeError, Error, QueryResolutionError, Result, SchemaDefinitionError, StoreError};
pub use model::{Model, SearchResults};
pub use schema::{canonicalize, CanonicalSchema, SchemaRegistry, SchemaWarning};
pub use search::{Circle, CompiledQuery, IndexDefinition, Search, SortOrder};
pub use storage::{MemoryStore, StoreClient};
pub use value::{Document, Point, Value};
