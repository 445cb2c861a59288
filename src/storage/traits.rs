// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use async_trait::async_trait;

use crate::document::FlatMap;
use crate::error::StoreError;

/// A document as the store holds it.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredDocument {
    Hash(FlatMap),
    Json(serde_json::Value),
}

/// Raw `FT.SEARCH` reply: total hits plus the returned page.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchReply {
    pub total: usize,
    /// `(key, document)` in reply order
    pub documents: Vec<(String, StoredDocument)>,
}

/// Network client for a RediSearch-capable store.
///
/// Implementations transmit commands and return raw replies; encoding and
/// decoding happen on the caller's side.
#[async_trait]
pub trait StoreClient: Send + Sync {
    async fn write_hash(&self, key: &str, fields: &FlatMap) -> Result<(), StoreError>;
    async fn read_hash(&self, key: &str) -> Result<Option<FlatMap>, StoreError>;
    async fn write_json(&self, key: &str, value: &serde_json::Value) -> Result<(), StoreError>;
    async fn read_json(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError>;

    /// Returns whether the key existed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// `FT.CREATE` with the given arguments (index name first).
    async fn create_index(&self, args: &[String]) -> Result<(), StoreError>;
    async fn drop_index(&self, name: &str) -> Result<(), StoreError>;

    async fn get_meta(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set_meta(&self, key: &str, value: &str) -> Result<(), StoreError>;
    async fn delete_meta(&self, key: &str) -> Result<(), StoreError>;

    /// `FT.SEARCH` with the given arguments (index name first).
    async fn search(&self, args: &[Vec<u8>]) -> Result<SearchReply, StoreError>;
}
