// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! A named schema bound to a store client.
//!
//! `Model` is the glue between the pure core (canonical schema, converters,
//! search compiler) and a [`StoreClient`]: it picks the encoding from the
//! configured storage kind, derives keys and the index name, and decodes
//! replies back into documents.
//!
//! # Example
//!
//! ```rust
//! # use std::sync::Arc;
//! # use schema_engine::{Model, ModelConfig, MemoryStore, Value};
//! # use schema_engine::schema::CanonicalSchema;
//! # use serde_json::json;
//! # async fn example() -> schema_engine::Result<()> {
//! let schema = CanonicalSchema::from_json(json!({ "name": "string", "age": "number" }))?;
//! let users = Model::new("users", Arc::new(schema), ModelConfig::default(), Arc::new(MemoryStore::new()));
//!
//! users.create_index().await?;
//! users.save("1", &[("name".to_string(), Value::from("Ada"))].into()).await?;
//!
//! let mut search = users.search();
//! search.r#where("name")?.eq("Ada")?;
//! let results = users.execute(&search).await?;
//! assert_eq!(results.total, 1);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{ModelConfig, StorageKind};
use crate::document::{decode_flat, decode_nested, encode_flat, encode_nested};
use crate::error::Result;
use crate::schema::CanonicalSchema;
use crate::search::{IndexDefinition, Search};
use crate::storage::{StoreClient, StoredDocument};
use crate::value::Document;

/// Decoded search results.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchResults {
    /// Total hits, not just this page
    pub total: usize,
    /// `(id, document)` with the key prefix stripped
    pub documents: Vec<(String, Document)>,
}

pub struct Model<C: StoreClient> {
    name: String,
    schema: Arc<CanonicalSchema>,
    config: ModelConfig,
    client: Arc<C>,
}

impl<C: StoreClient> Model<C> {
    pub fn new(name: impl Into<String>, schema: Arc<CanonicalSchema>, config: ModelConfig, client: Arc<C>) -> Self {
        Self {
            name: name.into(),
            schema,
            config,
            client,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &CanonicalSchema {
        &self.schema
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn index_definition(&self) -> IndexDefinition {
        IndexDefinition::from_schema(&self.name, &self.schema, &self.config)
    }

    fn fingerprint_key(&self) -> String {
        format!("{}:hash", self.config.index_name(&self.name))
    }

    /// Create the index unless one with the same fingerprint already exists.
    ///
    /// Returns `true` when the index was (re)created.
    pub async fn create_index(&self) -> Result<bool> {
        let definition = self.index_definition();
        let fingerprint = definition.fingerprint();
        let meta_key = self.fingerprint_key();

        let current = self.client.get_meta(&meta_key).await?;
        if current.as_deref() == Some(fingerprint.as_str()) {
            debug!(index = %definition.name, "Index up to date, skipping create");
            return Ok(false);
        }

        if current.is_some() {
            self.client.drop_index(&definition.name).await?;
            debug!(index = %definition.name, "Dropped stale index");
        }

        self.client.create_index(&definition.to_ft_create_args()).await?;
        self.client.set_meta(&meta_key, &fingerprint).await?;
        info!(
            index = %definition.name,
            fields = definition.fields.len(),
            fingerprint = %fingerprint,
            "Index created"
        );
        Ok(true)
    }

    pub async fn drop_index(&self) -> Result<()> {
        let name = self.config.index_name(&self.name);
        self.client.drop_index(&name).await?;
        self.client.delete_meta(&self.fingerprint_key()).await?;
        info!(index = %name, "Index dropped");
        Ok(())
    }

    /// Encode and write a document under `id`.
    ///
    /// With hash storage an all-null document encodes to nothing, so the key
    /// is deleted instead.
    pub async fn save(&self, id: &str, doc: &Document) -> Result<()> {
        let key = self.config.key_for(id);
        match self.config.storage {
            StorageKind::Hash => {
                let fields = encode_flat(&self.schema, doc)?;
                if fields.is_empty() {
                    self.client.delete(&key).await?;
                    debug!(key = %key, "Empty document, key deleted");
                    return Ok(());
                }
                self.client.write_hash(&key, &fields).await?;
            }
            StorageKind::Json => {
                let value = encode_nested(&self.schema, doc)?;
                self.client.write_json(&key, &value).await?;
            }
        }
        debug!(key = %key, "Document saved");
        Ok(())
    }

    pub async fn fetch(&self, id: &str) -> Result<Option<Document>> {
        let key = self.config.key_for(id);
        let doc = match self.config.storage {
            StorageKind::Hash => match self.client.read_hash(&key).await? {
                Some(fields) => Some(decode_flat(&self.schema, &fields)?),
                None => None,
            },
            StorageKind::Json => match self.client.read_json(&key).await? {
                Some(value) => Some(decode_nested(&self.schema, &value)?),
                None => None,
            },
        };
        debug!(key = %key, found = doc.is_some(), "Document fetched");
        Ok(doc)
    }

    /// Delete a document. Returns whether it existed.
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let key = self.config.key_for(id);
        let existed = self.client.delete(&key).await?;
        debug!(key = %key, existed, "Document removed");
        Ok(existed)
    }

    /// New search session with the configured dialect and page size.
    pub fn search(&self) -> Search<'_> {
        let mut search = Search::new(&self.schema, self.config.storage);
        if let Some(dialect) = self.config.dialect {
            search.dialect(dialect);
        }
        search.limit(0, self.config.page_size);
        search
    }

    /// Compile, send and decode a search.
    pub async fn execute(&self, search: &Search<'_>) -> Result<SearchResults> {
        let compiled = search.compile()?;
        let index = self.config.index_name(&self.name);
        debug!(index = %index, query = %compiled.query, dialect = ?compiled.dialect, "Executing search");

        let reply = self.client.search(&compiled.to_ft_search_args(&index)).await?;

        let mut documents = Vec::with_capacity(reply.documents.len());
        for (key, stored) in reply.documents {
            let doc = match stored {
                StoredDocument::Hash(fields) => decode_flat(&self.schema, &fields)?,
                StoredDocument::Json(value) => decode_nested(&self.schema, &value)?,
            };
            let id = key
                .strip_prefix(self.config.key_prefix.as_str())
                .unwrap_or(&key)
                .to_string();
            documents.push((id, doc));
        }

        Ok(SearchResults {
            total: reply.total,
            documents,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::value::Value;
    use serde_json::json;

    fn schema() -> Arc<CanonicalSchema> {
        Arc::new(
            CanonicalSchema::from_json(json!({
                "name": "string",
                "age": "number",
                "tags": { "type": "array" },
            }))
            .unwrap(),
        )
    }

    fn model(storage: StorageKind) -> (Model<MemoryStore>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let config = ModelConfig {
            storage,
            key_prefix: "app:users:".into(),
            ..Default::default()
        };
        (Model::new("users", schema(), config, store.clone()), store)
    }

    fn doc(pairs: Vec<(&str, Value)>) -> Document {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[tokio::test]
    async fn test_create_index_skips_when_unchanged() {
        let (users, store) = model(StorageKind::Json);
        assert!(users.create_index().await.unwrap());
        assert!(!users.create_index().await.unwrap());
        assert!(store.index_args("idx:users").is_some());
    }

    #[tokio::test]
    async fn test_create_index_replaces_stale_definition() {
        let (users, store) = model(StorageKind::Json);
        users.create_index().await.unwrap();

        let changed = Model::new(
            "users",
            Arc::new(CanonicalSchema::from_json(json!({ "name": "text" })).unwrap()),
            users.config().clone(),
            store.clone(),
        );
        assert!(changed.create_index().await.unwrap());
        let args = store.index_args("idx:users").unwrap();
        assert!(args.contains(&"TEXT".to_string()));
    }

    #[tokio::test]
    async fn test_drop_index_clears_fingerprint() {
        let (users, store) = model(StorageKind::Json);
        users.create_index().await.unwrap();
        users.drop_index().await.unwrap();
        assert!(store.index_args("idx:users").is_none());

        assert!(users.create_index().await.unwrap());
        assert!(store.index_args("idx:users").is_some());
    }

    #[tokio::test]
    async fn test_save_fetch_hash() {
        let (users, store) = model(StorageKind::Hash);
        let ada = doc(vec![
            ("name", "Ada".into()),
            ("age", 33.into()),
            ("tags", vec!["x", "y"].into()),
        ]);
        users.save("1", &ada).await.unwrap();

        match store.get_raw("app:users:1").unwrap() {
            StoredDocument::Hash(fields) => assert_eq!(fields["tags"], "x,y"),
            other => panic!("Expected hash, got {:?}", other),
        }
        assert_eq!(users.fetch("1").await.unwrap(), Some(ada));
        assert_eq!(users.fetch("2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_hash_save_deletes_key() {
        let (users, store) = model(StorageKind::Hash);
        users.save("1", &doc(vec![("name", "Ada".into())])).await.unwrap();
        assert_eq!(store.len(), 1);

        users.save("1", &doc(vec![("name", Value::Null)])).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_save_fetch_json_and_remove() {
        let (users, _store) = model(StorageKind::Json);
        let ada = doc(vec![
            ("name", "Ada".into()),
            ("age", Value::Null),
            ("tags", vec!["x"].into()),
        ]);
        users.save("1", &ada).await.unwrap();
        assert_eq!(users.fetch("1").await.unwrap(), Some(ada));

        assert!(users.remove("1").await.unwrap());
        assert!(!users.remove("1").await.unwrap());
    }

    #[tokio::test]
    async fn test_execute_decodes_and_strips_prefix() {
        let (users, store) = model(StorageKind::Json);
        users.create_index().await.unwrap();
        for (id, age) in [("1", 20), ("2", 40)] {
            users.save(id, &doc(vec![("name", id.into()), ("age", age.into())])).await.unwrap();
        }

        let mut search = users.search();
        search.r#where("age").unwrap().gte(30).unwrap();
        let results = users.execute(&search).await.unwrap();

        // The in-memory store does not filter; it returns the whole prefix.
        assert_eq!(results.total, 2);
        assert_eq!(results.documents[0].0, "1");
        assert_eq!(results.documents[1].1["age"], Value::Number(40.0));

        let issued = store.searches();
        assert_eq!(issued[0][1], b"(@age:[30 +inf])".to_vec());
        assert!(issued[0].contains(&b"LIMIT".to_vec()));
    }

    #[tokio::test]
    async fn test_search_without_index_fails() {
        let (users, _store) = model(StorageKind::Json);
        let search = users.search();
        assert!(matches!(
            users.execute(&search).await,
            Err(crate::error::Error::Store(_))
        ));
    }
}
