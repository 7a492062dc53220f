//! Storage backend abstraction for the document store.
//!
//! This module defines the core traits that abstract over different storage implementations,
//! allowing the document store to work with various backends (in-memory, MongoDB, etc.).
//!
//! # Overview
//!
//! The [`StoreBackend`] trait provides a unified async interface for all storage operations
//! including document insertion, retrieval, filtered updates and deletes, querying, and
//! collection management. Implementations are required to be thread-safe (`Send + Sync`)
//! and support concurrent access.
//!
//! # Traits
//!
//! - [`StoreBackend`]: The core trait for storage backends
//! - [`DynStoreBackend`]: A trait for dynamic dispatch over backend implementations
//! - [`StoreBackendBuilder`]: Factory trait for creating backend instances
//!
//! # Examples
//!
//! ```ignore
//! use docmodel::backend::StoreBackend;
//! use bson::{doc, oid::ObjectId};
//!
//! let backend = MyBackendImpl::new();
//!
//! backend
//!     .insert_documents(vec![doc! { "_id": ObjectId::new(), "name": "Alice" }], "users")
//!     .await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use bson::{Document as BsonDocument, oid::ObjectId};
use futures::stream::BoxStream;
use serde::Serialize;
use std::fmt::Debug;

use crate::{
    error::DocumentStoreResult,
    query::{Expr, Query},
    update::Update,
};

/// A lazy, finite stream of raw documents produced by a query.
pub type DocumentStream = BoxStream<'static, DocumentStoreResult<BsonDocument>>;

/// A backend chosen at runtime.
pub type BoxedStoreBackend = Box<dyn DynStoreBackend>;

/// Outcome of a filtered update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpdateResult {
    /// Documents matched by the filter.
    pub matched_count: u64,
    /// Documents whose content actually changed.
    pub modified_count: u64,
}

/// Outcome of a filtered delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeleteResult {
    pub deleted_count: u64,
}

/// Abstract interface for document storage backends.
///
/// Documents cross this boundary as BSON documents that carry their own `_id`.
/// Every operation names the collection it targets; collections that do not exist
/// yet behave as empty and are created implicitly by the first insert.
///
/// # Thread Safety
///
/// All implementations must be thread-safe and support concurrent access from multiple
/// async tasks. Each individual operation, including [`find_and_update`] and
/// [`find_and_delete`], must be atomic with respect to other operations.
///
/// # Error Handling
///
/// An unreachable or shut down store fails with
/// [`DocumentStoreError::Connection`](crate::error::DocumentStoreError::Connection).
/// Filters or updates the backend cannot evaluate fail with
/// [`DocumentStoreError::Query`](crate::error::DocumentStoreError::Query).
///
/// [`find_and_update`]: StoreBackend::find_and_update
/// [`find_and_delete`]: StoreBackend::find_and_delete
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Inserts new documents into a collection.
    ///
    /// Every document must carry an ObjectId `_id`. Inserting an identifier that already
    /// exists fails with
    /// [`DocumentStoreError::DocumentAlreadyExists`](crate::error::DocumentStoreError::DocumentAlreadyExists).
    async fn insert_documents(
        &self,
        documents: Vec<BsonDocument>,
        collection: &str,
    ) -> DocumentStoreResult<()>;

    /// Replaces the document with the given identifier entirely.
    ///
    /// Returns `false` if no such document exists; nothing is written in that case.
    async fn replace_document(
        &self,
        id: ObjectId,
        document: BsonDocument,
        collection: &str,
    ) -> DocumentStoreResult<bool>;

    /// Retrieves documents from a collection by their IDs.
    ///
    /// Identifiers that do not exist are omitted from the results.
    async fn get_documents(
        &self,
        ids: Vec<ObjectId>,
        collection: &str,
    ) -> DocumentStoreResult<Vec<BsonDocument>>;

    /// Queries documents in a collection using a structured query.
    ///
    /// The filter is applied first, then the sort, then skip and limit, then the projection.
    /// The returned stream is finite; calling this method again restarts the query.
    ///
    /// # See Also
    ///
    /// - [`Query`] for constructing queries
    /// - [`crate::query::Filter`] for building filter expressions
    async fn query_documents(
        &self,
        query: Query,
        collection: &str,
    ) -> DocumentStoreResult<DocumentStream>;

    /// Counts the documents matching a filter.
    async fn count_documents(&self, filter: Expr, collection: &str) -> DocumentStoreResult<u64>;

    /// Applies an update to every document matching the filter.
    ///
    /// No schema validation takes place; the update reaches the stored documents as is.
    async fn update_documents(
        &self,
        filter: Expr,
        update: Update,
        collection: &str,
    ) -> DocumentStoreResult<UpdateResult>;

    /// Atomically applies an update to one document and returns its new state.
    ///
    /// Returns `None` if no document has the identifier.
    async fn find_and_update(
        &self,
        id: ObjectId,
        update: Update,
        collection: &str,
    ) -> DocumentStoreResult<Option<BsonDocument>>;

    /// Deletes documents matching the filter.
    ///
    /// With `many` unset, only the first match in natural order is removed.
    async fn delete_documents(
        &self,
        filter: Expr,
        many: bool,
        collection: &str,
    ) -> DocumentStoreResult<DeleteResult>;

    /// Atomically deletes one document and returns its state before deletion.
    ///
    /// Returns `None` if no document has the identifier.
    async fn find_and_delete(
        &self,
        id: ObjectId,
        collection: &str,
    ) -> DocumentStoreResult<Option<BsonDocument>>;

    /// Creates a new, empty collection.
    ///
    /// Creating a collection that already exists is not an error.
    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()>;

    /// Drops (deletes) a collection and all its documents.
    ///
    /// Fails with
    /// [`DocumentStoreError::CollectionNotFound`](crate::error::DocumentStoreError::CollectionNotFound)
    /// if the collection does not exist.
    ///
    /// # Warning
    ///
    /// This operation is irreversible.
    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()>;

    /// Lists the names of all collections in the store, sorted.
    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>>;

    /// Checks that the store is reachable and the session is open.
    async fn ping(&self) -> DocumentStoreResult<()>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op, but backends with persistent storage or
    /// external connections should override this.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Object-safe mirror of [`StoreBackend`], implemented for every backend.
///
/// Used through [`BoxedStoreBackend`] when the backend is chosen at runtime.
#[async_trait]
pub trait DynStoreBackend: Send + Sync + Debug {
    async fn insert_documents(
        &self,
        documents: Vec<BsonDocument>,
        collection: &str,
    ) -> DocumentStoreResult<()>;
    async fn replace_document(
        &self,
        id: ObjectId,
        document: BsonDocument,
        collection: &str,
    ) -> DocumentStoreResult<bool>;
    async fn get_documents(
        &self,
        ids: Vec<ObjectId>,
        collection: &str,
    ) -> DocumentStoreResult<Vec<BsonDocument>>;
    async fn query_documents(
        &self,
        query: Query,
        collection: &str,
    ) -> DocumentStoreResult<DocumentStream>;
    async fn count_documents(&self, filter: Expr, collection: &str) -> DocumentStoreResult<u64>;
    async fn update_documents(
        &self,
        filter: Expr,
        update: Update,
        collection: &str,
    ) -> DocumentStoreResult<UpdateResult>;
    async fn find_and_update(
        &self,
        id: ObjectId,
        update: Update,
        collection: &str,
    ) -> DocumentStoreResult<Option<BsonDocument>>;
    async fn delete_documents(
        &self,
        filter: Expr,
        many: bool,
        collection: &str,
    ) -> DocumentStoreResult<DeleteResult>;
    async fn find_and_delete(
        &self,
        id: ObjectId,
        collection: &str,
    ) -> DocumentStoreResult<Option<BsonDocument>>;
    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()>;
    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()>;
    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>>;
    async fn ping(&self) -> DocumentStoreResult<()>;
    async fn shutdown_boxed(self: Box<Self>) -> DocumentStoreResult<()>;
}

#[async_trait]
impl<B: StoreBackend + 'static> DynStoreBackend for B {
    async fn insert_documents(
        &self,
        documents: Vec<BsonDocument>,
        collection: &str,
    ) -> DocumentStoreResult<()> {
        StoreBackend::insert_documents(self, documents, collection).await
    }

    async fn replace_document(
        &self,
        id: ObjectId,
        document: BsonDocument,
        collection: &str,
    ) -> DocumentStoreResult<bool> {
        StoreBackend::replace_document(self, id, document, collection).await
    }

    async fn get_documents(
        &self,
        ids: Vec<ObjectId>,
        collection: &str,
    ) -> DocumentStoreResult<Vec<BsonDocument>> {
        StoreBackend::get_documents(self, ids, collection).await
    }

    async fn query_documents(
        &self,
        query: Query,
        collection: &str,
    ) -> DocumentStoreResult<DocumentStream> {
        StoreBackend::query_documents(self, query, collection).await
    }

    async fn count_documents(&self, filter: Expr, collection: &str) -> DocumentStoreResult<u64> {
        StoreBackend::count_documents(self, filter, collection).await
    }

    async fn update_documents(
        &self,
        filter: Expr,
        update: Update,
        collection: &str,
    ) -> DocumentStoreResult<UpdateResult> {
        StoreBackend::update_documents(self, filter, update, collection).await
    }

    async fn find_and_update(
        &self,
        id: ObjectId,
        update: Update,
        collection: &str,
    ) -> DocumentStoreResult<Option<BsonDocument>> {
        StoreBackend::find_and_update(self, id, update, collection).await
    }

    async fn delete_documents(
        &self,
        filter: Expr,
        many: bool,
        collection: &str,
    ) -> DocumentStoreResult<DeleteResult> {
        StoreBackend::delete_documents(self, filter, many, collection).await
    }

    async fn find_and_delete(
        &self,
        id: ObjectId,
        collection: &str,
    ) -> DocumentStoreResult<Option<BsonDocument>> {
        StoreBackend::find_and_delete(self, id, collection).await
    }

    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        StoreBackend::create_collection(self, name).await
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        StoreBackend::drop_collection(self, name).await
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        StoreBackend::list_collections(self).await
    }

    async fn ping(&self) -> DocumentStoreResult<()> {
        StoreBackend::ping(self).await
    }

    async fn shutdown_boxed(self: Box<Self>) -> DocumentStoreResult<()> {
        StoreBackend::shutdown(*self).await
    }
}

#[async_trait]
impl StoreBackend for BoxedStoreBackend {
    async fn insert_documents(
        &self,
        documents: Vec<BsonDocument>,
        collection: &str,
    ) -> DocumentStoreResult<()> {
        (**self)
            .insert_documents(documents, collection)
            .await
    }

    async fn replace_document(
        &self,
        id: ObjectId,
        document: BsonDocument,
        collection: &str,
    ) -> DocumentStoreResult<bool> {
        (**self)
            .replace_document(id, document, collection)
            .await
    }

    async fn get_documents(
        &self,
        ids: Vec<ObjectId>,
        collection: &str,
    ) -> DocumentStoreResult<Vec<BsonDocument>> {
        (**self)
            .get_documents(ids, collection)
            .await
    }

    async fn query_documents(
        &self,
        query: Query,
        collection: &str,
    ) -> DocumentStoreResult<DocumentStream> {
        (**self)
            .query_documents(query, collection)
            .await
    }

    async fn count_documents(&self, filter: Expr, collection: &str) -> DocumentStoreResult<u64> {
        (**self)
            .count_documents(filter, collection)
            .await
    }

    async fn update_documents(
        &self,
        filter: Expr,
        update: Update,
        collection: &str,
    ) -> DocumentStoreResult<UpdateResult> {
        (**self)
            .update_documents(filter, update, collection)
            .await
    }

    async fn find_and_update(
        &self,
        id: ObjectId,
        update: Update,
        collection: &str,
    ) -> DocumentStoreResult<Option<BsonDocument>> {
        (**self)
            .find_and_update(id, update, collection)
            .await
    }

    async fn delete_documents(
        &self,
        filter: Expr,
        many: bool,
        collection: &str,
    ) -> DocumentStoreResult<DeleteResult> {
        (**self)
            .delete_documents(filter, many, collection)
            .await
    }

    async fn find_and_delete(
        &self,
        id: ObjectId,
        collection: &str,
    ) -> DocumentStoreResult<Option<BsonDocument>> {
        (**self)
            .find_and_delete(id, collection)
            .await
    }

    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        (**self).create_collection(name).await
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        (**self).drop_collection(name).await
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        (**self).list_collections().await
    }

    async fn ping(&self) -> DocumentStoreResult<()> {
        (**self).ping().await
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.shutdown_boxed().await
    }
}

/// Factory for backends that need asynchronous setup, such as opening a connection.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
