//! Typed collection operations.
//!
//! A [`TypedCollection`] binds a document type to its collection on a backend. It owns the
//! client-side half of every operation: identifier assignment, schema defaults, validation
//! before writes, and conversion between BSON and the document type. Everything else is
//! delegated to the [`StoreBackend`].
//!
//! The three update verbs are deliberately different:
//!
//! - [`TypedCollection::update_in_place`] fetches, mutates, revalidates and replaces.
//! - [`TypedCollection::update_by_filter`] sends field mutations to the store, unvalidated.
//! - [`TypedCollection::update_and_return`] has the store mutate one document atomically
//!   and return its new state, unvalidated.
//!
//! # Example
//!
//! ```ignore
//! let courses = store.typed_collection::<Course>();
//!
//! let created = courses.create(course).await?;
//! let published = courses
//!     .update_in_place(created.id().unwrap(), |c| c.is_published = true)
//!     .await?;
//! ```

use bson::{Bson, Document as BsonDocument, doc, oid::ObjectId};
use futures::{StreamExt, TryStreamExt, stream::BoxStream};
use std::marker::PhantomData;
use tracing::{debug, warn};

use crate::{
    backend::{StoreBackend, UpdateResult},
    document::{Document, DocumentExt, ID_FIELD, IntoDocumentId},
    error::{DocumentStoreError, DocumentStoreResult},
    page::{Page, PaginationParams},
    query::{Expr, Filter, Query},
    schema::Schema,
    update::Update,
};

/// A lazy stream of typed query results.
pub type TypedStream<D> = BoxStream<'static, DocumentStoreResult<D>>;

#[derive(Debug)]
pub struct TypedCollection<'a, B: StoreBackend, D: Document> {
    name: String,
    backend: &'a B,
    schema: Schema,
    _marker: PhantomData<D>,
}

impl<'a, B: StoreBackend, D: Document> TypedCollection<'a, B, D> {
    pub(crate) fn new(name: String, backend: &'a B) -> Self {
        Self {
            name,
            backend,
            schema: D::schema(),
            _marker: PhantomData,
        }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the schema documents are validated against.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Validates a document against the collection's schema without touching the store.
    pub fn validate(&self, document: &D) -> DocumentStoreResult<()> {
        Ok(self.schema.validate(&document.to_document()?)?)
    }

    /// Persists a new document and returns it as stored.
    ///
    /// Assigns an `_id` when the document has none, applies schema defaults to absent
    /// fields, then validates. Nothing is written if validation fails.
    ///
    /// # Errors
    ///
    /// - [`DocumentStoreError::Validation`] if the document violates the schema
    /// - [`DocumentStoreError::DocumentAlreadyExists`] if the `_id` is taken
    pub async fn create(&self, document: D) -> DocumentStoreResult<D> {
        let mut raw = document.to_document()?;
        let id = match document.id() {
            Some(id) => *id,
            None => ObjectId::new(),
        };

        raw.remove(ID_FIELD);
        let mut stored = doc! { ID_FIELD: id };
        for (key, value) in raw {
            stored.insert(key, value);
        }

        self.schema.apply_defaults(&mut stored);
        self.check_schema(&stored)?;

        self.backend
            .insert_documents(vec![stored.clone()], &self.name)
            .await?;

        debug!(collection = %self.name, %id, "created document");

        D::from_document(stored)
    }

    /// Runs a query and streams the matching documents.
    ///
    /// Backends decide when results are read: the in-memory store takes a snapshot when
    /// this call resolves, MongoDB pulls batches from a cursor as the stream is polled.
    pub async fn find(&self, query: Query) -> DocumentStoreResult<TypedStream<D>> {
        if let Some(filter) = &query.filter {
            filter.check()?;
        }

        let stream = self
            .backend
            .query_documents(query, &self.name)
            .await?;

        Ok(stream
            .map(|result| result.and_then(D::from_document))
            .boxed())
    }

    /// Runs a query and collects every matching document.
    pub async fn find_many(&self, query: Query) -> DocumentStoreResult<Vec<D>> {
        self.find(query)
            .await?
            .try_collect()
            .await
    }

    /// Fetches one page of results along with the total number of matches.
    ///
    /// Any skip or limit already on `query` is replaced by the page parameters.
    pub async fn find_page(&self, query: Query, params: &PaginationParams) -> DocumentStoreResult<Page<D>> {
        let filter = query
            .filter
            .clone()
            .unwrap_or_else(Filter::all);
        let count = self.count(filter).await?;

        let query = Query {
            skip: Some(params.offset()),
            limit: Some(params.per_page),
            ..query
        };
        let items = self.find_many(query).await?;

        Ok(Page::from_parts(items, count as usize, params))
    }

    /// Looks up a document by identifier.
    ///
    /// # Errors
    ///
    /// [`DocumentStoreError::Query`] if `id` is not a valid identifier.
    pub async fn find_by_id(&self, id: impl IntoDocumentId) -> DocumentStoreResult<Option<D>> {
        let id = id.into_document_id()?;

        self.fetch(id)
            .await?
            .map(D::from_document)
            .transpose()
    }

    /// Writes the fields of `document` that differ from the stored copy with the same `_id`,
    /// after validating the result.
    ///
    /// Stored fields that `D` does not model are kept. Returns `None` if no stored document
    /// has that identifier.
    ///
    /// # Errors
    ///
    /// [`DocumentStoreError::Query`] if the document has no identifier.
    pub async fn save(&self, document: &D) -> DocumentStoreResult<Option<D>> {
        let id = *document
            .id()
            .ok_or_else(|| DocumentStoreError::Query("cannot save a document without an `_id`".into()))?;

        let Some(stored) = self.fetch(id).await? else {
            debug!(collection = %self.name, %id, "no document to save");
            return Ok(None);
        };
        let before = D::from_document(stored.clone())?.to_document()?;

        self.replace(id, stored, &before, &document.to_document()?).await
    }

    /// Fetches a document, applies `mutate` to it and saves it after revalidation.
    ///
    /// Returns the saved document, or `None` (and does nothing) if no document has the
    /// identifier. If the mutated document fails validation the stored copy is left as it was.
    ///
    /// Only the fields the mutation changed are written; stored fields that `D` does not
    /// model are kept. The identifier cannot be changed through the mutation.
    pub async fn update_in_place<F>(&self, id: impl IntoDocumentId, mutate: F) -> DocumentStoreResult<Option<D>>
    where
        F: FnOnce(&mut D) + Send,
    {
        let id = id.into_document_id()?;

        let Some(stored) = self.fetch(id).await? else {
            debug!(collection = %self.name, %id, "no document to update");
            return Ok(None);
        };

        let mut document = D::from_document(stored.clone())?;
        let before = document.to_document()?;

        mutate(&mut document);

        self.replace(id, stored, &before, &document.to_document()?).await
    }

    /// Applies field mutations to every document matching `filter`, directly at the store.
    ///
    /// The schema is not consulted: the mutations can leave documents in a state that
    /// [`TypedCollection::validate`] would reject.
    pub async fn update_by_filter(&self, filter: Expr, update: Update) -> DocumentStoreResult<UpdateResult> {
        filter.check()?;
        update.check()?;

        let result = self
            .backend
            .update_documents(filter, update, &self.name)
            .await?;

        debug!(
            collection = %self.name,
            matched = result.matched_count,
            modified = result.modified_count,
            "updated documents by filter"
        );

        Ok(result)
    }

    /// Atomically applies field mutations to one document and returns its new state.
    ///
    /// Like [`TypedCollection::update_by_filter`], the schema is not consulted.
    pub async fn update_and_return(&self, id: impl IntoDocumentId, update: Update) -> DocumentStoreResult<Option<D>> {
        let id = id.into_document_id()?;
        update.check()?;

        self.backend
            .find_and_update(id, update, &self.name)
            .await?
            .map(D::from_document)
            .transpose()
    }

    /// Deletes the first document matching `filter`, in natural order.
    ///
    /// Returns the number of documents deleted, `0` or `1`.
    pub async fn delete_one(&self, filter: Expr) -> DocumentStoreResult<u64> {
        self.delete(filter, false).await
    }

    /// Deletes the document with the given identifier.
    pub async fn delete_by_id(&self, id: impl IntoDocumentId) -> DocumentStoreResult<u64> {
        self.delete_one(Filter::id(id.into_document_id()?)).await
    }

    /// Deletes every document matching `filter`.
    pub async fn delete_many(&self, filter: Expr) -> DocumentStoreResult<u64> {
        self.delete(filter, true).await
    }

    /// Atomically deletes a document and returns it as it was before deletion.
    pub async fn delete_and_return(&self, id: impl IntoDocumentId) -> DocumentStoreResult<Option<D>> {
        let id = id.into_document_id()?;

        let deleted = self
            .backend
            .find_and_delete(id, &self.name)
            .await?;

        if deleted.is_some() {
            debug!(collection = %self.name, %id, "deleted document");
        }

        deleted
            .map(D::from_document)
            .transpose()
    }

    /// Counts the documents matching `filter`.
    pub async fn count(&self, filter: Expr) -> DocumentStoreResult<u64> {
        filter.check()?;

        self.backend
            .count_documents(filter, &self.name)
            .await
    }

    async fn delete(&self, filter: Expr, many: bool) -> DocumentStoreResult<u64> {
        filter.check()?;

        let result = self
            .backend
            .delete_documents(filter, many, &self.name)
            .await?;

        debug!(collection = %self.name, deleted = result.deleted_count, many, "deleted documents");

        Ok(result.deleted_count)
    }

    async fn fetch(&self, id: ObjectId) -> DocumentStoreResult<Option<BsonDocument>> {
        Ok(self
            .backend
            .get_documents(vec![id], &self.name)
            .await?
            .into_iter()
            .next())
    }

    /// Carries the differences between `before` and `after` over to `stored`, validates
    /// the result and replaces the stored copy with it.
    async fn replace(
        &self,
        id: ObjectId,
        mut raw: BsonDocument,
        before: &BsonDocument,
        after: &BsonDocument,
    ) -> DocumentStoreResult<Option<D>> {
        for (key, value) in after {
            if key != ID_FIELD && before.get(key) != Some(value) {
                raw.insert(key.clone(), value.clone());
            }
        }
        for key in before.keys() {
            if key != ID_FIELD && !after.contains_key(key) {
                raw.remove(key);
            }
        }

        raw.insert(ID_FIELD, Bson::ObjectId(id));
        self.check_schema(&raw)?;

        if !self
            .backend
            .replace_document(id, raw.clone(), &self.name)
            .await?
        {
            debug!(collection = %self.name, %id, "document vanished before it could be saved");
            return Ok(None);
        }

        debug!(collection = %self.name, %id, "saved document");

        D::from_document(raw).map(Some)
    }

    fn check_schema(&self, raw: &BsonDocument) -> DocumentStoreResult<()> {
        self.schema.validate(raw).map_err(|e| {
            warn!(collection = %self.name, error = %e, "document failed validation");
            DocumentStoreError::from(e)
        })
    }
}
