//! Storage seam used by the initializer.

use async_trait::async_trait;
use mongodb::bson::Document;
use thiserror::Error;

/// Failures reported by a [`DocumentStore`], classified by what the
/// initializer needs to decide.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("collection already exists: {0}")]
    NamespaceExists(String),

    #[error("index conflicts with existing data or indexes: {0}")]
    IndexConflict(String),

    #[error("database unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Driver(mongodb::error::Error),
}

impl StoreError {
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, StoreError::DuplicateKey(_))
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// The handful of database commands the initializer issues.
///
/// Every method targets the database the store was opened on; collections
/// are addressed by name.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Round-trip to the server without touching any collection.
    async fn ping(&self) -> Result<(), StoreError>;

    async fn list_collection_names(&self) -> Result<Vec<String>, StoreError>;

    /// Fails with [`StoreError::NamespaceExists`] if the collection is already there.
    async fn create_collection(&self, name: &str) -> Result<(), StoreError>;

    async fn count_documents(&self, collection: &str, filter: Document)
        -> Result<u64, StoreError>;

    async fn insert_one(&self, collection: &str, document: Document) -> Result<(), StoreError>;

    /// Atomically insert `document` unless a document matching `filter` exists.
    ///
    /// Returns `true` when this call inserted the document.
    async fn insert_if_absent(
        &self,
        collection: &str,
        filter: Document,
        document: Document,
    ) -> Result<bool, StoreError>;

    /// Create an ascending unique index on `field`, returning the index name.
    /// Succeeds without changes when an equivalent index exists.
    async fn create_unique_index(&self, collection: &str, field: &str)
        -> Result<String, StoreError>;

    /// Matching documents, without their `_id`.
    async fn find(&self, collection: &str, filter: Document) -> Result<Vec<Document>, StoreError>;
}
