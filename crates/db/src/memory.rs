//! In-process [`DocumentStore`] that enforces unique indexes like the server.
//!
//! Every operation yields to the scheduler before touching state, so
//! concurrently polled initializers interleave between steps the way
//! separate processes would.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use mongodb::bson::{Bson, Document};

use crate::store::{DocumentStore, StoreError};

#[derive(Debug, Default)]
struct MemoryCollection {
    documents: Vec<Document>,
    unique_fields: Vec<String>,
}

static NULL: Bson = Bson::Null;

/// A unique index keys a missing field as `null`, like a non-sparse server index.
fn indexed_value<'d>(document: &'d Document, field: &str) -> &'d Bson {
    document.get(field).unwrap_or(&NULL)
}

impl MemoryCollection {
    fn violates_unique(&self, document: &Document) -> Option<&str> {
        self.unique_fields.iter().map(String::as_str).find(|field| {
            let value = indexed_value(document, field);
            self.documents
                .iter()
                .any(|existing| indexed_value(existing, field) == value)
        })
    }

    fn push(&mut self, collection: &str, document: Document) -> Result<(), StoreError> {
        if let Some(field) = self.violates_unique(&document) {
            return Err(StoreError::DuplicateKey(format!(
                "collection `{}` already has a document with this `{}`",
                collection, field
            )));
        }
        self.documents.push(document);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, MemoryCollection>>,
    unreachable: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every call fails as if the server were down.
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    fn state(&self) -> MutexGuard<'_, HashMap<String, MemoryCollection>> {
        self.collections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn enter(&self) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        if self.unreachable {
            return Err(StoreError::Unavailable(
                "no server reachable (memory store offline)".to_string(),
            ));
        }
        Ok(())
    }
}

/// Supports plain equality and `{ "$exists": bool }` per field.
fn matches(document: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, expected)| match expected {
        Bson::Document(op) if op.contains_key("$exists") => {
            let wanted = op.get_bool("$exists").unwrap_or(true);
            document.contains_key(key) == wanted
        }
        _ => document.get(key) == Some(expected),
    })
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.enter().await
    }

    async fn list_collection_names(&self) -> Result<Vec<String>, StoreError> {
        self.enter().await?;
        let mut names: Vec<String> = self.state().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn create_collection(&self, name: &str) -> Result<(), StoreError> {
        self.enter().await?;
        let mut state = self.state();
        if state.contains_key(name) {
            return Err(StoreError::NamespaceExists(name.to_string()));
        }
        state.insert(name.to_string(), MemoryCollection::default());
        Ok(())
    }

    async fn count_documents(
        &self,
        collection: &str,
        filter: Document,
    ) -> Result<u64, StoreError> {
        self.enter().await?;
        let count = self.state().get(collection).map_or(0, |coll| {
            coll.documents
                .iter()
                .filter(|document| matches(document, &filter))
                .count()
        });
        Ok(count as u64)
    }

    async fn insert_one(&self, collection: &str, document: Document) -> Result<(), StoreError> {
        self.enter().await?;
        self.state()
            .entry(collection.to_string())
            .or_default()
            .push(collection, document)
    }

    async fn insert_if_absent(
        &self,
        collection: &str,
        filter: Document,
        document: Document,
    ) -> Result<bool, StoreError> {
        self.enter().await?;
        let mut state = self.state();
        let coll = state.entry(collection.to_string()).or_default();
        if coll.documents.iter().any(|existing| matches(existing, &filter)) {
            return Ok(false);
        }
        coll.push(collection, document)?;
        Ok(true)
    }

    async fn create_unique_index(
        &self,
        collection: &str,
        field: &str,
    ) -> Result<String, StoreError> {
        self.enter().await?;
        let index_name = format!("{}_1", field);
        let mut state = self.state();
        let coll = state.entry(collection.to_string()).or_default();
        if coll.unique_fields.iter().any(|existing| existing == field) {
            return Ok(index_name);
        }

        let mut seen = Vec::new();
        for value in coll.documents.iter().map(|document| indexed_value(document, field)) {
            if seen.contains(&value) {
                return Err(StoreError::IndexConflict(format!(
                    "duplicate `{}` value {} in `{}`",
                    field, value, collection
                )));
            }
            seen.push(value);
        }

        coll.unique_fields.push(field.to_string());
        Ok(index_name)
    }

    async fn find(&self, collection: &str, filter: Document) -> Result<Vec<Document>, StoreError> {
        self.enter().await?;
        let found = self
            .state()
            .get(collection)
            .map(|coll| {
                coll.documents
                    .iter()
                    .filter(|document| matches(document, &filter))
                    .cloned()
                    .map(|mut document| {
                        document.remove("_id");
                        document
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(found)
    }
}
