// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;

use super::traits::{SearchReply, StoreClient, StoredDocument};
use crate::document::FlatMap;
use crate::error::StoreError;

/// In-process store for tests and local runs.
///
/// Search does not evaluate the query: it returns every document of the
/// index's storage kind under the index prefix, honouring `LIMIT`. Issued
/// commands are recorded so callers can assert on them.
pub struct MemoryStore {
    data: DashMap<String, StoredDocument>,
    indexes: DashMap<String, Vec<String>>,
    meta: DashMap<String, String>,
    searches: Mutex<Vec<Vec<Vec<u8>>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
            indexes: DashMap::new(),
            meta: DashMap::new(),
            searches: Mutex::new(Vec::new()),
        }
    }

    /// Get current document count
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw stored form of a key.
    pub fn get_raw(&self, key: &str) -> Option<StoredDocument> {
        self.data.get(key).map(|r| r.value().clone())
    }

    /// `FT.CREATE` arguments an index was created with.
    pub fn index_args(&self, name: &str) -> Option<Vec<String>> {
        self.indexes.get(name).map(|r| r.value().clone())
    }

    /// Every `FT.SEARCH` issued so far, oldest first.
    pub fn searches(&self) -> Vec<Vec<Vec<u8>>> {
        self.searches.lock().clone()
    }

    /// Clear documents, indexes, metadata and the search log.
    pub fn clear(&self) {
        self.data.clear();
        self.indexes.clear();
        self.meta.clear();
        self.searches.lock().clear();
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Value following `keyword` in an argument list.
fn option_after<'a>(args: &'a [String], keyword: &str, skip: usize) -> Option<&'a str> {
    let at = args.iter().position(|a| a.eq_ignore_ascii_case(keyword))?;
    args.get(at + 1 + skip).map(String::as_str)
}

fn limit_of(args: &[Vec<u8>]) -> Result<Option<(usize, usize)>, StoreError> {
    let Some(at) = args.iter().position(|a| a.as_slice() == b"LIMIT") else {
        return Ok(None);
    };
    let number = |i: usize| -> Result<usize, StoreError> {
        args.get(i)
            .and_then(|a| std::str::from_utf8(a).ok())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| StoreError::Protocol("LIMIT expects offset and count".to_string()))
    };
    Ok(Some((number(at + 1)?, number(at + 2)?)))
}

#[async_trait]
impl StoreClient for MemoryStore {
    async fn write_hash(&self, key: &str, fields: &FlatMap) -> Result<(), StoreError> {
        self.data.insert(key.to_string(), StoredDocument::Hash(fields.clone()));
        Ok(())
    }

    async fn read_hash(&self, key: &str) -> Result<Option<FlatMap>, StoreError> {
        match self.data.get(key).map(|r| r.value().clone()) {
            None => Ok(None),
            Some(StoredDocument::Hash(fields)) => Ok(Some(fields)),
            Some(StoredDocument::Json(_)) => Err(StoreError::Protocol(format!("'{}' holds a JSON document", key))),
        }
    }

    async fn write_json(&self, key: &str, value: &serde_json::Value) -> Result<(), StoreError> {
        self.data.insert(key.to_string(), StoredDocument::Json(value.clone()));
        Ok(())
    }

    async fn read_json(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        match self.data.get(key).map(|r| r.value().clone()) {
            None => Ok(None),
            Some(StoredDocument::Json(value)) => Ok(Some(value)),
            Some(StoredDocument::Hash(_)) => Err(StoreError::Protocol(format!("'{}' holds a hash", key))),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.data.remove(key).is_some())
    }

    async fn create_index(&self, args: &[String]) -> Result<(), StoreError> {
        let name = args
            .first()
            .ok_or_else(|| StoreError::Protocol("FT.CREATE without an index name".to_string()))?;
        if self.indexes.contains_key(name) {
            return Err(StoreError::Backend("Index already exists".to_string()));
        }
        self.indexes.insert(name.clone(), args.to_vec());
        Ok(())
    }

    async fn drop_index(&self, name: &str) -> Result<(), StoreError> {
        self.indexes
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::Backend("Unknown index name".to_string()))
    }

    async fn get_meta(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.meta.get(key).map(|r| r.value().clone()))
    }

    async fn set_meta(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.meta.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete_meta(&self, key: &str) -> Result<(), StoreError> {
        self.meta.remove(key);
        Ok(())
    }

    async fn search(&self, args: &[Vec<u8>]) -> Result<SearchReply, StoreError> {
        self.searches.lock().push(args.to_vec());

        let name = args
            .first()
            .and_then(|a| std::str::from_utf8(a).ok())
            .ok_or_else(|| StoreError::Protocol("FT.SEARCH without an index name".to_string()))?;
        let index = self
            .index_args(name)
            .ok_or_else(|| StoreError::Backend("Unknown index name".to_string()))?;
        let prefix = option_after(&index, "PREFIX", 1).unwrap_or("");
        let json = option_after(&index, "ON", 0).is_some_and(|on| on.eq_ignore_ascii_case("JSON"));

        let mut matches: Vec<(String, StoredDocument)> = self
            .data
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .filter(|entry| matches!(entry.value(), StoredDocument::Json(_)) == json)
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        matches.sort_by(|a, b| a.0.cmp(&b.0));

        let total = matches.len();
        let documents = match limit_of(args)? {
            Some((offset, count)) => matches.into_iter().skip(offset).take(count).collect(),
            None => matches,
        };
        Ok(SearchReply { total, documents })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn flat(pairs: &[(&str, &str)]) -> FlatMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn args(parts: &[&str]) -> Vec<Vec<u8>> {
        parts.iter().map(|p| p.as_bytes().to_vec()).collect()
    }

    fn strings(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| p.to_string()).collect()
    }

    #[tokio::test]
    async fn test_new_store_is_empty() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_hash_round_trip() {
        let store = MemoryStore::new();
        store.write_hash("u:1", &flat(&[("name", "Ada")])).await.unwrap();

        let fields = store.read_hash("u:1").await.unwrap().unwrap();
        assert_eq!(fields["name"], "Ada");
        assert!(store.read_hash("u:2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_wrong_type_is_protocol_error() {
        let store = MemoryStore::new();
        store.write_json("u:1", &json!({"a": 1})).await.unwrap();
        assert!(matches!(store.read_hash("u:1").await, Err(StoreError::Protocol(_))));
        assert_eq!(store.read_json("u:1").await.unwrap(), Some(json!({"a": 1})));
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryStore::new();
        store.write_json("k", &json!({})).await.unwrap();
        assert!(store.delete("k").await.unwrap());
        assert!(!store.delete("k").await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_index_lifecycle() {
        let store = MemoryStore::new();
        let create = strings(&["idx:u", "ON", "JSON", "PREFIX", "1", "u:", "SCHEMA"]);
        store.create_index(&create).await.unwrap();
        assert!(matches!(store.create_index(&create).await, Err(StoreError::Backend(_))));
        assert_eq!(store.index_args("idx:u"), Some(create));

        store.drop_index("idx:u").await.unwrap();
        assert!(store.drop_index("idx:u").await.is_err());
    }

    #[tokio::test]
    async fn test_search_filters_prefix_kind_and_limit() {
        let store = MemoryStore::new();
        store
            .create_index(&strings(&["idx:u", "ON", "JSON", "PREFIX", "1", "u:", "SCHEMA"]))
            .await
            .unwrap();
        for i in 0..5 {
            store.write_json(&format!("u:{}", i), &json!({"i": i})).await.unwrap();
        }
        store.write_json("other:1", &json!({})).await.unwrap();
        store.write_hash("u:hash", &flat(&[("a", "b")])).await.unwrap();

        let reply = store.search(&args(&["idx:u", "*", "LIMIT", "1", "2"])).await.unwrap();
        assert_eq!(reply.total, 5);
        let keys: Vec<&str> = reply.documents.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["u:1", "u:2"]);

        assert_eq!(store.searches().len(), 1);
        assert!(store.search(&args(&["idx:nope", "*"])).await.is_err());
    }

    #[tokio::test]
    async fn test_meta() {
        let store = MemoryStore::new();
        assert!(store.get_meta("m").await.unwrap().is_none());
        store.set_meta("m", "v").await.unwrap();
        assert_eq!(store.get_meta("m").await.unwrap().as_deref(), Some("v"));
        store.delete_meta("m").await.unwrap();
        assert!(store.get_meta("m").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_access() {
        use std::sync::Arc;

        let store = Arc::new(MemoryStore::new());
        let mut handles = vec![];

        // Spawn 10 tasks that each insert 10 documents
        for batch in 0..10 {
            let store_clone = store.clone();
            let handle = tokio::spawn(async move {
                for i in 0..10 {
                    let key = format!("batch-{}-doc-{}", batch, i);
                    store_clone.write_json(&key, &json!({ "i": i })).await.unwrap();
                }
            });
            handles.push(handle);
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.len(), 100);
    }
}
