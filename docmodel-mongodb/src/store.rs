use std::time::Duration;
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt, stream};
use bson::{Document, doc, oid::ObjectId};
use mongodb::{
    Client, Collection as MongoCollection,
    error::{Error as MongoError, ErrorKind},
    options::{ClientOptions, FindOptions, ReturnDocument},
};
use tracing::debug;

use docmodel_core::{
    backend::{DeleteResult, DocumentStream, StoreBackend, StoreBackendBuilder, UpdateResult},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, Query},
    update::Update,
};

use crate::query::{MongoQueryTranslator, projection_document, sort_document, update_document};

/// Database used when neither the URI nor the builder names one.
pub const DEFAULT_DATABASE: &str = "test";

const DUPLICATE_KEY: i32 = 11000;


/// MongoDB-backed document store.
///
/// Filters, updates and the atomic find-and-modify verbs are all executed by the server.
#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    /// Starts configuring a store for the given connection string.
    pub fn builder(dsn: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn)
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }

    async fn collection_names(&self) -> DocumentStoreResult<Vec<String>> {
        self.client
            .database(&self.database)
            .list_collection_names()
            .await
            .map_err(map_error)
    }
}

/// Maps driver errors onto the store's error kinds.
pub(crate) fn map_error(error: MongoError) -> DocumentStoreError {
    match *error.kind {
        ErrorKind::ServerSelection { .. }
        | ErrorKind::Io(..)
        | ErrorKind::ConnectionPoolCleared { .. }
        | ErrorKind::DnsResolve { .. }
        | ErrorKind::Authentication { .. } => DocumentStoreError::Connection(error.to_string()),
        ErrorKind::InvalidArgument { .. } => DocumentStoreError::Query(error.to_string()),
        ErrorKind::BsonSerialization(..) | ErrorKind::BsonDeserialization(..) => {
            DocumentStoreError::Serialization(error.to_string())
        },
        _ => DocumentStoreError::Backend(error.to_string()),
    }
}

fn out_of_range(option: &str, value: usize) -> DocumentStoreError {
    DocumentStoreError::Query(format!("{option} {value} is out of range"))
}

fn is_duplicate_key(error: &MongoError) -> bool {
    match &*error.kind {
        ErrorKind::InsertMany(failure) => failure
            .write_errors
            .as_ref()
            .is_some_and(|errors| errors.iter().any(|e| e.code == DUPLICATE_KEY)),
        _ => false,
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn insert_documents(&self, documents: Vec<Document>, collection: &str) -> DocumentStoreResult<()> {
        if documents.is_empty() {
            return Ok(());
        }

        let first_id = documents[0]
            .get("_id")
            .map(|id| id.to_string())
            .unwrap_or_default();

        self.get_collection(collection)
            .insert_many(documents)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    DocumentStoreError::DocumentAlreadyExists(first_id, collection.to_string())
                } else {
                    map_error(e)
                }
            })?;

        Ok(())
    }

    async fn replace_document(&self, id: ObjectId, document: Document, collection: &str) -> DocumentStoreResult<bool> {
        let result = self.get_collection(collection)
            .replace_one(doc! { "_id": id }, document)
            .await
            .map_err(map_error)?;

        Ok(result.matched_count > 0)
    }

    async fn get_documents(&self, ids: Vec<ObjectId>, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        self.get_collection(collection)
            .find(doc! { "_id": { "$in": ids } })
            .await
            .map_err(map_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(map_error)
    }

    async fn query_documents(&self, query: Query, collection: &str) -> DocumentStoreResult<DocumentStream> {
        let mut options = FindOptions::default();

        // The server reads a zero limit as "no limit"
        if query.limit == Some(0) {
            return Ok(stream::empty().boxed());
        }
        if let Some(limit) = query.limit {
            options.limit = Some(i64::try_from(limit).map_err(|_| out_of_range("limit", limit))?);
        }
        if let Some(skip) = query.skip {
            options.skip = Some(u64::try_from(skip).map_err(|_| out_of_range("skip", skip))?);
        }
        if let Some(sort) = &query.sort {
            options.sort = Some(sort_document(sort));
        }
        if let Some(projection) = &query.projection {
            options.projection = Some(projection_document(projection));
        }

        let filter = match &query.filter {
            Some(expr) => MongoQueryTranslator::filter(expr)?,
            None => doc! {},
        };

        let cursor = self.get_collection(collection)
            .find(filter)
            .with_options(options)
            .await
            .map_err(map_error)?;

        Ok(cursor.map_err(map_error).boxed())
    }

    async fn count_documents(&self, filter: Expr, collection: &str) -> DocumentStoreResult<u64> {
        self.get_collection(collection)
            .count_documents(MongoQueryTranslator::filter(&filter)?)
            .await
            .map_err(map_error)
    }

    async fn update_documents(&self, filter: Expr, update: Update, collection: &str) -> DocumentStoreResult<UpdateResult> {
        let result = self.get_collection(collection)
            .update_many(MongoQueryTranslator::filter(&filter)?, update_document(&update)?)
            .await
            .map_err(map_error)?;

        Ok(UpdateResult {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
        })
    }

    async fn find_and_update(&self, id: ObjectId, update: Update, collection: &str) -> DocumentStoreResult<Option<Document>> {
        self.get_collection(collection)
            .find_one_and_update(doc! { "_id": id }, update_document(&update)?)
            .return_document(ReturnDocument::After)
            .await
            .map_err(map_error)
    }

    async fn delete_documents(&self, filter: Expr, many: bool, collection: &str) -> DocumentStoreResult<DeleteResult> {
        let filter = MongoQueryTranslator::filter(&filter)?;
        let collection = self.get_collection(collection);

        let result = if many {
            collection.delete_many(filter).await
        } else {
            collection.delete_one(filter).await
        }
        .map_err(map_error)?;

        Ok(DeleteResult { deleted_count: result.deleted_count })
    }

    async fn find_and_delete(&self, id: ObjectId, collection: &str) -> DocumentStoreResult<Option<Document>> {
        self.get_collection(collection)
            .find_one_and_delete(doc! { "_id": id })
            .await
            .map_err(map_error)
    }

    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        if self.collection_names().await?.iter().any(|n| n == name) {
            return Ok(());
        }

        self.client
            .database(&self.database)
            .create_collection(name)
            .await
            .map_err(map_error)?;

        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        if !self.collection_names().await?.iter().any(|n| n == name) {
            return Err(DocumentStoreError::CollectionNotFound(name.to_string()));
        }

        self.get_collection(name)
            .drop()
            .await
            .map_err(map_error)?;

        Ok(())
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        let mut names = self.collection_names().await?;
        names.sort();

        Ok(names)
    }

    async fn ping(&self) -> DocumentStoreResult<()> {
        self.client
            .database(&self.database)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(map_error)?;

        Ok(())
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.client.shutdown().await;

        debug!(database = %self.database, "mongodb client shut down");

        Ok(())
    }
}

/// Configures and connects a [`MongoDbStore`].
///
/// The database comes from, in order: [`MongoDbStoreBuilder::with_database`], the path of
/// the connection string, [`DEFAULT_DATABASE`]. Building pings the server, so an unreachable
/// deployment fails here with [`DocumentStoreError::Connection`].
pub struct MongoDbStoreBuilder {
    dsn: String,
    database: Option<String>,
    server_selection_timeout: Option<Duration>,
    app_name: Option<String>,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: None,
            server_selection_timeout: None,
            app_name: None,
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// How long operations wait for a suitable server before failing.
    pub fn server_selection_timeout(mut self, timeout: Duration) -> Self {
        self.server_selection_timeout = Some(timeout);
        self
    }

    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let mut options = ClientOptions::parse(&self.dsn)
            .await
            .map_err(|e| match *e.kind {
                ErrorKind::DnsResolve { .. } => DocumentStoreError::Connection(e.to_string()),
                _ => DocumentStoreError::Initialization(e.to_string()),
            })?;

        if let Some(timeout) = self.server_selection_timeout {
            options.server_selection_timeout = Some(timeout);
        }
        if self.app_name.is_some() {
            options.app_name = self.app_name;
        }

        let database = self
            .database
            .or_else(|| options.default_database.clone())
            .unwrap_or_else(|| DEFAULT_DATABASE.to_string());

        let store = MongoDbStore::new(
            Client::with_options(options)
                .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?,
            database,
        );

        store.ping().await?;

        debug!(database = %store.database, "mongodb deployment reachable");

        Ok(store)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn malformed_connection_strings_fail_initialization() {
        let err = MongoDbStore::builder("not-a-uri")
            .build()
            .await
            .unwrap_err();

        assert!(matches!(err, DocumentStoreError::Initialization(_)));
    }

    #[tokio::test]
    async fn unreachable_deployments_fail_with_connection_errors() {
        let err = MongoDbStore::builder("mongodb://127.0.0.1:1/playground")
            .server_selection_timeout(Duration::from_millis(200))
            .build()
            .await
            .unwrap_err();

        assert!(matches!(err, DocumentStoreError::Connection(_)), "got {err:?}");
    }

    // Clients connect lazily, so these never reach a server.
    async fn offline_store() -> MongoDbStore {
        let client = Client::with_uri_str("mongodb://127.0.0.1:1/playground").await.unwrap();
        MongoDbStore::new(client, "playground".to_string())
    }

    #[tokio::test]
    async fn zero_limits_return_nothing() {
        let store = offline_store().await;

        let docs = store
            .query_documents(Query::builder().limit(0).build(), "courses")
            .await
            .unwrap()
            .try_collect::<Vec<_>>()
            .await
            .unwrap();

        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn oversized_limits_are_query_errors() {
        let store = offline_store().await;

        let err = store
            .query_documents(Query::builder().limit(usize::MAX).build(), "courses")
            .await
            .err()
            .unwrap();

        assert!(matches!(err, DocumentStoreError::Query(_)), "got {err:?}");
    }
}
