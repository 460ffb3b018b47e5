//! Idempotent bootstrap of a keyed defaults collection.
//!
//! The unique index is built before the seed write and the seed itself is an
//! insert-if-absent, so concurrent initializers converge on one document.

use mongodb::bson::{doc, Bson, Document};

use crate::error::{InitError, Step};
use crate::store::{DocumentStore, StoreError};

/// Where and what to seed.
#[derive(Debug, Clone, PartialEq)]
pub struct SeedPlan {
    pub collection: String,
    pub key_field: String,
    pub key_value: Bson,
    /// Full document inserted when no document carries the key yet.
    pub document: Document,
}

impl SeedPlan {
    /// The key field is always written into `document`, overriding any
    /// conflicting value.
    pub fn new(
        collection: impl Into<String>,
        key_field: impl Into<String>,
        key_value: impl Into<Bson>,
        mut document: Document,
    ) -> Self {
        let key_field = key_field.into();
        let key_value = key_value.into();
        document.insert(key_field.clone(), key_value.clone());
        Self {
            collection: collection.into(),
            key_field,
            key_value,
            document,
        }
    }

    pub fn key_filter(&self) -> Document {
        let mut filter = Document::new();
        filter.insert(self.key_field.clone(), self.key_value.clone());
        filter
    }
}

/// How the default document step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    Inserted,
    AlreadyPresent,
    /// Another initializer inserted it between our count and our write.
    InsertedConcurrently,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitReport {
    pub collection_created: bool,
    pub index_name: String,
    pub seed: SeedOutcome,
}

pub struct Initializer<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: DocumentStore + ?Sized> Initializer<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Run every step for `plan`: collection, unique index, then the seed.
    pub async fn run(&self, plan: &SeedPlan) -> Result<InitReport, InitError> {
        self.store
            .ping()
            .await
            .map_err(|err| InitError::at(Step::Connect, err))?;

        let collection_created = self.ensure_collection(&plan.collection).await?;
        let index_name = self
            .ensure_unique_index(&plan.collection, &plan.key_field)
            .await?;
        let seed = self
            .ensure_default_document(
                &plan.collection,
                &plan.key_field,
                &plan.key_value,
                &plan.document,
            )
            .await?;

        let report = InitReport {
            collection_created,
            index_name,
            seed,
        };
        tracing::info!(
            collection = %plan.collection,
            created = report.collection_created,
            index = %report.index_name,
            seed = ?report.seed,
            "initialization complete"
        );
        Ok(report)
    }

    /// Create `name` unless the database already lists it.
    ///
    /// Returns `true` when this call created the collection.
    pub async fn ensure_collection(&self, name: &str) -> Result<bool, InitError> {
        let existing = self
            .store
            .list_collection_names()
            .await
            .map_err(|err| InitError::at(Step::ListCollections, err))?;

        if existing.iter().any(|existing| existing == name) {
            tracing::debug!(collection = name, "collection already exists");
            return Ok(false);
        }

        match self.store.create_collection(name).await {
            Ok(()) => {
                tracing::info!(collection = name, "collection created");
                Ok(true)
            }
            Err(StoreError::NamespaceExists(_)) => {
                tracing::info!(collection = name, "collection created by another initializer");
                Ok(false)
            }
            Err(err) => Err(InitError::at(Step::CreateCollection, err)),
        }
    }

    /// Insert `defaults` unless a document with `key_field == key_value` exists.
    pub async fn ensure_default_document(
        &self,
        collection: &str,
        key_field: &str,
        key_value: &Bson,
        defaults: &Document,
    ) -> Result<SeedOutcome, InitError> {
        let mut filter = Document::new();
        filter.insert(key_field, key_value.clone());

        let existing = self
            .store
            .count_documents(collection, filter.clone())
            .await
            .map_err(|err| InitError::at(Step::CountDocuments, err))?;

        if existing > 0 {
            tracing::info!(
                collection,
                field = key_field,
                value = %key_value,
                "default document already present"
            );
            return Ok(SeedOutcome::AlreadyPresent);
        }

        let outcome = match self
            .store
            .insert_if_absent(collection, filter, defaults.clone())
            .await
        {
            Ok(true) => SeedOutcome::Inserted,
            Ok(false) => SeedOutcome::InsertedConcurrently,
            Err(err) if err.is_duplicate_key() => {
                tracing::debug!(error = %err, "seed insert lost race on unique key");
                SeedOutcome::InsertedConcurrently
            }
            Err(err) => return Err(InitError::at(Step::InsertDefault, err)),
        };

        tracing::info!(
            collection,
            field = key_field,
            value = %key_value,
            outcome = ?outcome,
            "default document ensured"
        );
        Ok(outcome)
    }

    /// Make `field` unique across `collection`; returns the index name.
    pub async fn ensure_unique_index(
        &self,
        collection: &str,
        field: &str,
    ) -> Result<String, InitError> {
        match self.store.create_unique_index(collection, field).await {
            Ok(index_name) => {
                tracing::info!(collection, field, index = %index_name, "unique index ensured");
                Ok(index_name)
            }
            Err(source @ StoreError::IndexConflict(_)) => {
                tracing::error!(
                    collection,
                    field,
                    error = %source,
                    "existing documents violate the unique constraint"
                );
                Err(InitError::IndexConflict {
                    collection: collection.to_string(),
                    field: field.to_string(),
                    source,
                })
            }
            Err(err) => Err(InitError::at(Step::CreateIndex, err)),
        }
    }

    /// Every document carrying the key field, without `_id`.
    pub async fn list_defaults(
        &self,
        collection: &str,
        key_field: &str,
    ) -> Result<Vec<Document>, InitError> {
        let mut filter = Document::new();
        filter.insert(key_field, doc! { "$exists": true });

        self.store
            .find(collection, filter)
            .await
            .map_err(|err| InitError::at(Step::ListDefaults, err))
    }
}
