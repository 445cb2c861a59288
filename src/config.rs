// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for a schema-backed model.
//!
//! # Example
//!
//! ```
//! use schema_engine::{ModelConfig, StorageKind};
//!
//! // Minimal config (uses defaults)
//! let config = ModelConfig::default();
//! assert_eq!(config.storage, StorageKind::Json);
//! assert_eq!(config.page_size, 10);
//!
//! // Hash storage under a custom prefix
//! let config = ModelConfig {
//!     storage: StorageKind::Hash,
//!     key_prefix: "app:users:".into(),
//!     ..Default::default()
//! };
//! assert_eq!(config.index_prefix, "idx:");
//! ```

use serde::Deserialize;

/// How documents are laid out in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// Flat string map, one hash per document.
    Hash,
    /// Native JSON document.
    #[default]
    Json,
}

impl StorageKind {
    /// Keyword used by `FT.CREATE ... ON <kind>`.
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::Hash => "HASH",
            StorageKind::Json => "JSON",
        }
    }
}

/// Configuration for a [`crate::model::Model`].
///
/// Every field has a default, so an empty config object deserializes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelConfig {
    /// Document layout (default: JSON)
    #[serde(default)]
    pub storage: StorageKind,

    /// Prepended to every document key (e.g. "app:users:")
    #[serde(default)]
    pub key_prefix: String,

    /// Prepended to the index name
    #[serde(default = "default_index_prefix")]
    pub index_prefix: String,

    /// Query dialect sent with every search; vector queries force at least 2
    #[serde(default)]
    pub dialect: Option<u32>,

    /// Default `LIMIT` count for searches
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_index_prefix() -> String { "idx:".to_string() }
fn default_page_size() -> usize { 10 }

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            storage: StorageKind::default(),
            key_prefix: String::new(),
            index_prefix: default_index_prefix(),
            dialect: None,
            page_size: default_page_size(),
        }
    }
}

impl ModelConfig {
    /// Full store key for a document id.
    pub fn key_for(&self, id: &str) -> String {
        format!("{}{}", self.key_prefix, id)
    }

    /// Full index name for a model name.
    pub fn index_name(&self, name: &str) -> String {
        format!("{}{}", self.index_prefix, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config: ModelConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ModelConfig::default());
    }

    #[test]
    fn test_deserialize_overrides() {
        let config: ModelConfig = serde_json::from_str(
            r#"{"storage": "hash", "key_prefix": "u:", "dialect": 3, "page_size": 50}"#,
        )
        .unwrap();
        assert_eq!(config.storage, StorageKind::Hash);
        assert_eq!(config.key_for("42"), "u:42");
        assert_eq!(config.dialect, Some(3));
        assert_eq!(config.page_size, 50);
        assert_eq!(config.index_name("users"), "idx:users");
    }

    #[test]
    fn test_unknown_storage_rejected() {
        assert!(serde_json::from_str::<ModelConfig>(r#"{"storage": "xml"}"#).is_err());
    }
}
