//! In-memory storage implementation for document stores.
//!
//! This module provides a simple in-memory backend that keeps documents as BSON
//! in insertion order, behind an async-safe read-write lock.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use async_trait::async_trait;
use mea::rwlock::RwLock;
use bson::{Document as BsonDocument, oid::ObjectId};
use futures::{StreamExt, stream};
use tracing::debug;

use docmodel_core::{
    backend::{DeleteResult, DocumentStream, StoreBackend, StoreBackendBuilder, UpdateResult},
    document::document_id,
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, Query, SortDirection},
    update::Update,
};

use crate::evaluator::{DocumentEvaluator, compare_field, project};

/// Name used when a store is built without one.
pub const DEFAULT_STORE_NAME: &str = "default";

/// Documents of one collection, in natural (insertion) order.
#[derive(Debug, Default)]
struct CollectionMap {
    /// Insertion sequence number -> document
    documents: BTreeMap<u64, BsonDocument>,
    /// Document id -> insertion sequence number
    index: HashMap<ObjectId, u64>,
    next_seq: u64,
}

impl CollectionMap {
    fn insert(&mut self, id: ObjectId, document: BsonDocument) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.index.insert(id, seq);
        self.documents.insert(seq, document);
    }

    fn get(&self, id: &ObjectId) -> Option<&BsonDocument> {
        self.index
            .get(id)
            .and_then(|seq| self.documents.get(seq))
    }

    fn get_mut(&mut self, id: &ObjectId) -> Option<&mut BsonDocument> {
        self.index
            .get(id)
            .and_then(|seq| self.documents.get_mut(seq))
    }

    fn remove(&mut self, id: &ObjectId) -> Option<BsonDocument> {
        self.index
            .remove(id)
            .and_then(|seq| self.documents.remove(&seq))
    }

    /// Sequence numbers of the documents matching `filter`, in natural order.
    fn matching(&self, filter: &Expr) -> DocumentStoreResult<Vec<u64>> {
        let mut matched = Vec::new();

        for (seq, document) in &self.documents {
            if DocumentEvaluator::matches(document, filter)? {
                matched.push(*seq);
            }
        }

        Ok(matched)
    }
}

type StoreMap = HashMap<String, CollectionMap>;


/// Thread-safe in-memory document storage backend.
///
/// # Thread Safety
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing
/// it to be safely shared across async tasks. Multiple clones of the same instance
/// share the same underlying data, and every operation holds the lock for its whole
/// duration, so each verb is atomic.
///
/// Once any clone is shut down, every clone fails all operations with
/// [`DocumentStoreError::Connection`].
///
/// # Performance
///
/// Queries scan all documents in a collection (no indexing). This backend is meant
/// for development and tests.
///
/// # Example
///
/// ```ignore
/// use docmodel_memory::InMemoryStore;
/// use docmodel::backend::StoreBackend;
/// use bson::{doc, oid::ObjectId};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = InMemoryStore::new();
///
///     let id = ObjectId::new();
///     store.insert_documents(vec![doc! { "_id": id, "name": "Alice" }], "users").await?;
///
///     let docs = store.get_documents(vec![id], "users").await?;
///     assert_eq!(docs.len(), 1);
///
///     Ok(())
/// }
/// ```
#[derive(Clone, Debug)]
pub struct InMemoryStore {
    name: String,
    /// The main storage map: collection_name -> documents
    store: Arc<RwLock<StoreMap>>,
    open: Arc<AtomicBool>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self::named(DEFAULT_STORE_NAME)
    }

    /// Creates a new empty in-memory document store with a name, used in logs and errors.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            store: Arc::new(RwLock::new(StoreMap::new())),
            open: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore` with custom options.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn ensure_open(&self) -> DocumentStoreResult<()> {
        if self.open.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(DocumentStoreError::Connection(format!("in-memory store `{}` is shut down", self.name)))
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}


#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn insert_documents(&self, documents: Vec<BsonDocument>, collection: &str) -> DocumentStoreResult<()> {
        self.ensure_open()?;

        let mut store = self.store.write().await;
        let collection_map = store
            .entry(collection.to_string())
            .or_default();

        let mut batch = Vec::with_capacity(documents.len());

        for doc in documents {
            let id = document_id(&doc)?;

            if collection_map.index.contains_key(&id) || batch.iter().any(|(seen, _)| *seen == id) {
                return Err(DocumentStoreError::DocumentAlreadyExists(id.to_hex(), collection.to_string()));
            }

            batch.push((id, doc));
        }

        for (id, doc) in batch {
            collection_map.insert(id, doc);
        }

        Ok(())
    }

    async fn replace_document(&self, id: ObjectId, document: BsonDocument, collection: &str) -> DocumentStoreResult<bool> {
        self.ensure_open()?;

        let mut store = self.store.write().await;

        match store
            .get_mut(collection)
            .and_then(|col| col.get_mut(&id))
        {
            Some(existing) => {
                *existing = document;
                Ok(true)
            },
            None => Ok(false),
        }
    }

    async fn get_documents(&self, ids: Vec<ObjectId>, collection: &str) -> DocumentStoreResult<Vec<BsonDocument>> {
        self.ensure_open()?;

        let store = self.store.read().await;
        let collection_map = match store.get(collection) {
            Some(col) => col,
            None => return Ok(vec![]),
        };

        Ok(
            ids.iter()
                .filter_map(|id| collection_map.get(id).cloned())
                .collect()
        )
    }

    async fn query_documents(&self, query: Query, collection: &str) -> DocumentStoreResult<DocumentStream> {
        self.ensure_open()?;

        let store = self.store.read().await;
        let collection_map = match store.get(collection) {
            Some(col) => col,
            None => return Ok(stream::empty().boxed()),
        };

        let mut documents = match &query.filter {
            Some(filter) => collection_map
                .matching(filter)?
                .iter()
                .filter_map(|seq| collection_map.documents.get(seq).cloned())
                .collect::<Vec<_>>(),
            None => collection_map
                .documents
                .values()
                .cloned()
                .collect::<Vec<_>>(),
        };

        drop(store);

        // Stable sort, so ties keep natural order
        if let Some(sort) = &query.sort {
            documents.sort_by(|a, b| match sort.direction {
                SortDirection::Asc => compare_field(a, b, &sort.field),
                SortDirection::Desc => compare_field(b, a, &sort.field),
            });
        }

        let documents = documents
            .into_iter()
            .skip(query.skip.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|doc| match &query.projection {
                Some(projection) => project(doc, projection),
                None => doc,
            })
            .map(Ok)
            .collect::<Vec<_>>();

        Ok(stream::iter(documents).boxed())
    }

    async fn count_documents(&self, filter: Expr, collection: &str) -> DocumentStoreResult<u64> {
        self.ensure_open()?;

        let store = self.store.read().await;

        match store.get(collection) {
            Some(col) => Ok(col.matching(&filter)?.len() as u64),
            None => Ok(0),
        }
    }

    async fn update_documents(&self, filter: Expr, update: Update, collection: &str) -> DocumentStoreResult<UpdateResult> {
        self.ensure_open()?;

        let mut store = self.store.write().await;
        let collection_map = match store.get_mut(collection) {
            Some(col) => col,
            None => return Ok(UpdateResult::default()),
        };

        // Compute every new version before writing any, so a failing update changes nothing
        let mut updated = Vec::new();

        for seq in collection_map.matching(&filter)? {
            if let Some(current) = collection_map.documents.get(&seq) {
                let mut next = current.clone();
                let changed = update.apply(&mut next)?;
                updated.push((seq, next, changed));
            }
        }

        let mut result = UpdateResult { matched_count: updated.len() as u64, modified_count: 0 };

        for (seq, next, changed) in updated {
            if changed {
                collection_map.documents.insert(seq, next);
                result.modified_count += 1;
            }
        }

        Ok(result)
    }

    async fn find_and_update(&self, id: ObjectId, update: Update, collection: &str) -> DocumentStoreResult<Option<BsonDocument>> {
        self.ensure_open()?;

        let mut store = self.store.write().await;

        let Some(existing) = store
            .get_mut(collection)
            .and_then(|col| col.get_mut(&id))
        else {
            return Ok(None);
        };

        let mut next = existing.clone();
        update.apply(&mut next)?;
        *existing = next.clone();

        Ok(Some(next))
    }

    async fn delete_documents(&self, filter: Expr, many: bool, collection: &str) -> DocumentStoreResult<DeleteResult> {
        self.ensure_open()?;

        let mut store = self.store.write().await;
        let collection_map = match store.get_mut(collection) {
            Some(col) => col,
            None => return Ok(DeleteResult::default()),
        };

        let mut matched = collection_map.matching(&filter)?;

        if !many {
            matched.truncate(1);
        }

        let mut deleted_count = 0;

        for seq in matched {
            if let Some(doc) = collection_map.documents.remove(&seq) {
                if let Ok(id) = document_id(&doc) {
                    collection_map.index.remove(&id);
                }
                deleted_count += 1;
            }
        }

        Ok(DeleteResult { deleted_count })
    }

    async fn find_and_delete(&self, id: ObjectId, collection: &str) -> DocumentStoreResult<Option<BsonDocument>> {
        self.ensure_open()?;

        Ok(
            self.store
                .write()
                .await
                .get_mut(collection)
                .and_then(|col| col.remove(&id))
        )
    }

    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.ensure_open()?;

        self.store
            .write()
            .await
            .entry(name.to_string())
            .or_default();

        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.ensure_open()?;

        let mut store = self.store.write().await;

        if store.remove(name).is_none() {
            return Err(DocumentStoreError::CollectionNotFound(name.to_string()));
        }

        Ok(())
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        self.ensure_open()?;

        let mut names = self.store
            .read()
            .await
            .keys()
            .cloned()
            .collect::<Vec<_>>();

        names.sort();

        Ok(names)
    }

    async fn ping(&self) -> DocumentStoreResult<()> {
        self.ensure_open()
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.open.store(false, Ordering::Release);
        self.store.write().await.clear();

        debug!(store = %self.name, "in-memory store shut down");

        Ok(())
    }
}


/// Builder for constructing [`InMemoryStore`] instances.
///
/// # Example
///
/// ```ignore
/// use docmodel_memory::InMemoryStore;
/// use docmodel::backend::StoreBackendBuilder;
///
/// #[tokio::main]
/// async fn main() {
///     let store = InMemoryStore::builder().with_name("playground").build().await.unwrap();
/// }
/// ```
#[derive(Default)]
pub struct InMemoryStoreBuilder {
    name: Option<String>,
}

impl InMemoryStoreBuilder {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Builds and returns a new, empty [`InMemoryStore`].
    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let store = InMemoryStore::named(self.name.unwrap_or_else(|| DEFAULT_STORE_NAME.to_string()));

        debug!(store = %store.name, "in-memory store ready");

        Ok(store)
    }
}
