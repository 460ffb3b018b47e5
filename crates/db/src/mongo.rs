//! MongoDB-backed [`DocumentStore`].

use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Document},
    error::{ErrorKind, WriteFailure},
    options::{ClientOptions, IndexOptions},
    Client, Collection, Database, IndexModel,
};
use promptinit_kernel::DatabaseSettings;

use crate::store::{DocumentStore, StoreError};

const DUPLICATE_KEY: i32 = 11000;
const NAMESPACE_EXISTS: i32 = 48;
const INDEX_OPTIONS_CONFLICT: i32 = 85;
const INDEX_KEY_SPECS_CONFLICT: i32 = 86;

pub struct MongoStore {
    database: Database,
}

impl MongoStore {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Build a client from settings and select the configured database.
    ///
    /// No network traffic happens here; call [`DocumentStore::ping`] to
    /// check reachability.
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self, StoreError> {
        let mut options = ClientOptions::parse(settings.uri.as_str())
            .await
            .map_err(classify)?;

        let timeout = Duration::from_millis(settings.connect_timeout_ms);
        options.connect_timeout = Some(timeout);
        options.server_selection_timeout = Some(timeout);
        options.app_name = Some(settings.app_name.clone());

        let client = Client::with_options(options).map_err(classify)?;
        tracing::debug!(database = %settings.name, "mongodb client configured");

        Ok(Self::new(client.database(&settings.name)))
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.database.collection::<Document>(name)
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn list_collection_names(&self) -> Result<Vec<String>, StoreError> {
        self.database.list_collection_names().await.map_err(classify)
    }

    async fn create_collection(&self, name: &str) -> Result<(), StoreError> {
        self.database.create_collection(name).await.map_err(classify)
    }

    async fn count_documents(
        &self,
        collection: &str,
        filter: Document,
    ) -> Result<u64, StoreError> {
        self.collection(collection)
            .count_documents(filter)
            .await
            .map_err(classify)
    }

    async fn insert_one(&self, collection: &str, document: Document) -> Result<(), StoreError> {
        self.collection(collection)
            .insert_one(document)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn insert_if_absent(
        &self,
        collection: &str,
        filter: Document,
        document: Document,
    ) -> Result<bool, StoreError> {
        let result = self
            .collection(collection)
            .update_one(filter, doc! { "$setOnInsert": document })
            .upsert(true)
            .await
            .map_err(classify)?;
        Ok(result.upserted_id.is_some())
    }

    async fn create_unique_index(
        &self,
        collection: &str,
        field: &str,
    ) -> Result<String, StoreError> {
        let mut keys = Document::new();
        keys.insert(field, 1);

        let index = IndexModel::builder()
            .keys(keys)
            .options(IndexOptions::builder().unique(true).build())
            .build();

        let created = self
            .collection(collection)
            .create_index(index)
            .await
            .map_err(|err| classify_with(err, Operation::IndexBuild))?;
        Ok(created.index_name)
    }

    async fn find(&self, collection: &str, filter: Document) -> Result<Vec<Document>, StoreError> {
        let cursor = self
            .collection(collection)
            .find(filter)
            .projection(doc! { "_id": 0 })
            .await
            .map_err(classify)?;
        cursor.try_collect().await.map_err(classify)
    }
}

fn server_code(err: &mongodb::error::Error) -> Option<i32> {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => Some(write_error.code),
        ErrorKind::Command(command_error) => Some(command_error.code),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Command,
    IndexBuild,
}

fn classify(err: mongodb::error::Error) -> StoreError {
    classify_with(err, Operation::Command)
}

fn classify_with(err: mongodb::error::Error, operation: Operation) -> StoreError {
    if matches!(
        err.kind.as_ref(),
        ErrorKind::ServerSelection { .. } | ErrorKind::Io(_) | ErrorKind::Authentication { .. }
    ) {
        return StoreError::Unavailable(err.to_string());
    }

    match server_code(&err).and_then(|code| error_for_code(code, err.to_string(), operation)) {
        Some(classified) => classified,
        None => StoreError::Driver(err),
    }
}

/// Server error codes the initializer reacts to; `None` leaves the driver
/// error as is.
fn error_for_code(code: i32, message: String, operation: Operation) -> Option<StoreError> {
    match (code, operation) {
        (
            DUPLICATE_KEY | INDEX_OPTIONS_CONFLICT | INDEX_KEY_SPECS_CONFLICT,
            Operation::IndexBuild,
        ) => Some(StoreError::IndexConflict(message)),
        (DUPLICATE_KEY, _) => Some(StoreError::DuplicateKey(message)),
        (NAMESPACE_EXISTS, _) => Some(StoreError::NamespaceExists(message)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(code: i32, operation: Operation) -> Option<&'static str> {
        error_for_code(code, format!("code {}", code), operation).map(|err| match err {
            StoreError::DuplicateKey(_) => "duplicate_key",
            StoreError::NamespaceExists(_) => "namespace_exists",
            StoreError::IndexConflict(_) => "index_conflict",
            StoreError::Unavailable(_) => "unavailable",
            StoreError::Driver(_) => "driver",
        })
    }

    #[test]
    fn duplicate_key_on_writes_is_duplicate_key() {
        assert_eq!(kind(11000, Operation::Command), Some("duplicate_key"));
    }

    #[test]
    fn duplicate_key_during_index_build_is_a_conflict() {
        assert_eq!(kind(11000, Operation::IndexBuild), Some("index_conflict"));
    }

    #[test]
    fn index_option_and_key_conflicts_map_to_index_conflict() {
        assert_eq!(kind(85, Operation::IndexBuild), Some("index_conflict"));
        assert_eq!(kind(86, Operation::IndexBuild), Some("index_conflict"));
    }

    #[test]
    fn namespace_exists_is_recognised() {
        assert_eq!(kind(48, Operation::Command), Some("namespace_exists"));
    }

    #[test]
    fn unrelated_codes_stay_driver_errors() {
        assert_eq!(kind(13, Operation::Command), None);
        assert_eq!(kind(85, Operation::Command), None);
    }

    #[test]
    fn message_is_preserved() {
        let err = error_for_code(11000, "E11000 duplicate key".to_string(), Operation::Command);
        assert_eq!(
            err.map(|err| err.to_string()),
            Some("duplicate key: E11000 duplicate key".to_string())
        );
    }
}
