//! Core traits and types for document representation and serialization.
//!
//! This module provides the fundamental trait that all stored documents must implement,
//! utilities for converting documents between formats (BSON, JSON), and the
//! [`IntoDocumentId`] conversion used by every point operation.

use bson::{
    Document as BsonDocument,
    de::deserialize_from_document,
    oid::ObjectId,
    ser::serialize_to_document,
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, to_value};

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    schema::Schema,
};

/// Name of the identifier field on the wire.
pub const ID_FIELD: &str = "_id";

/// Core trait that all documents stored in a document store must implement.
///
/// A document carries an optional identifier (assigned on creation when absent),
/// names the collection it lives in, and declares the [`Schema`] its content is
/// validated against before any write.
///
/// # Example
///
/// ```ignore
/// use docmodel::prelude::*;
/// use bson::oid::ObjectId;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct Author {
///     #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
///     pub id: Option<ObjectId>,
///     pub name: String,
/// }
///
/// impl Document for Author {
///     fn id(&self) -> Option<&ObjectId> {
///         self.id.as_ref()
///     }
///
///     fn collection_name() -> &'static str {
///         "authors"
///     }
///
///     fn schema() -> Schema {
///         Schema::builder("Author")
///             .field(FieldSpec::string("name").required().min_length(3))
///             .build()
///     }
/// }
/// ```
pub trait Document: Serialize + DeserializeOwned + Send + Sync + Clone + 'static {
    /// Returns this document's identifier, or `None` if it has not been persisted yet.
    fn id(&self) -> Option<&ObjectId>;

    /// Returns the name of the collection this document belongs to.
    fn collection_name() -> &'static str;

    /// Returns the schema documents of this type are validated against.
    ///
    /// The default schema accepts any content.
    fn schema() -> Schema {
        Schema::builder(Self::collection_name()).build()
    }
}

/// Extension trait providing serialization and validation utilities for documents.
///
/// This trait is automatically implemented for all types that implement [`Document`].
pub trait DocumentExt: Document {
    /// Converts this document to a BSON document.
    fn to_document(&self) -> DocumentStoreResult<BsonDocument>;

    /// Creates a document from a BSON document.
    fn from_document(document: BsonDocument) -> DocumentStoreResult<Self>;

    /// Converts this document to a JSON value, for display.
    fn to_json(&self) -> DocumentStoreResult<Value>;

    /// Validates this document against [`Document::schema`].
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Validation`] listing every violated constraint.
    fn validate(&self) -> DocumentStoreResult<()>;
}

impl<D: Document> DocumentExt for D {
    fn to_document(&self) -> DocumentStoreResult<BsonDocument> {
        Ok(serialize_to_document(self)?)
    }

    fn from_document(document: BsonDocument) -> DocumentStoreResult<Self> {
        Ok(deserialize_from_document(document)?)
    }

    fn to_json(&self) -> DocumentStoreResult<Value> {
        Ok(to_value(self)?)
    }

    fn validate(&self) -> DocumentStoreResult<()> {
        Ok(D::schema().validate(&self.to_document()?)?)
    }
}

/// Conversion into a document identifier.
///
/// Implemented for [`ObjectId`] and for its 24-character hex string form, so that
/// identifiers arriving from users can be passed straight to point operations.
/// A malformed string fails with [`DocumentStoreError::Query`].
pub trait IntoDocumentId {
    fn into_document_id(self) -> DocumentStoreResult<ObjectId>;
}

impl IntoDocumentId for ObjectId {
    fn into_document_id(self) -> DocumentStoreResult<ObjectId> {
        Ok(self)
    }
}

impl IntoDocumentId for &ObjectId {
    fn into_document_id(self) -> DocumentStoreResult<ObjectId> {
        Ok(*self)
    }
}

impl IntoDocumentId for &str {
    fn into_document_id(self) -> DocumentStoreResult<ObjectId> {
        ObjectId::parse_str(self)
            .map_err(|e| DocumentStoreError::Query(format!("invalid document id `{self}`: {e}")))
    }
}

impl IntoDocumentId for String {
    fn into_document_id(self) -> DocumentStoreResult<ObjectId> {
        self.as_str().into_document_id()
    }
}

impl IntoDocumentId for &String {
    fn into_document_id(self) -> DocumentStoreResult<ObjectId> {
        self.as_str().into_document_id()
    }
}

/// Reads the identifier out of a stored BSON document.
pub fn document_id(document: &BsonDocument) -> DocumentStoreResult<ObjectId> {
    document
        .get_object_id(ID_FIELD)
        .map_err(|_| DocumentStoreError::Serialization("stored document has no ObjectId `_id`".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_identifiers() {
        let id = ObjectId::new();
        assert_eq!(id.to_hex().into_document_id().unwrap(), id);
        assert_eq!((&id).into_document_id().unwrap(), id);
    }

    #[test]
    fn malformed_identifier_is_a_query_error() {
        let err = "not-an-object-id".into_document_id().unwrap_err();
        assert!(matches!(err, DocumentStoreError::Query(_)));
    }
}
