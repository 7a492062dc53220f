//! Error types and result types for document store operations.
//!
//! This module provides error handling for all document store operations.
//! Use [`DocumentStoreResult<T>`] as the return type for fallible operations.
//!
//! "Not found" is deliberately absent from the error enum: point lookups return
//! `Ok(None)` and bulk operations report a zero count.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

use crate::schema::Violation;

/// Represents all possible errors that can occur when interacting with a document store.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// The store is unreachable, refused the session, or has been shut down.
    #[error("Connection error: {0}")]
    Connection(String),
    /// The store could not be configured (malformed URI, unknown scheme, bad options).
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// The document violates its schema. Nothing was written.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// A malformed identifier, filter or update was supplied.
    #[error("Query error: {0}")]
    Query(String),
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// A document with the given ID already exists in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// The requested collection does not exist in the store.
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl DocumentStoreError {
    /// Returns the validation details if this is a [`DocumentStoreError::Validation`].
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            DocumentStoreError::Validation(err) => Some(err),
            _ => None,
        }
    }
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

/// Every constraint a candidate document violated, in schema declaration order.
///
/// The message format mirrors the one users of document mappers are used to:
///
/// ```text
/// Course validation failed: name: Path `name` is required., category: `-` is not a valid enum value for path `category`.
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{model} validation failed: {}", join_violations(.violations))]
pub struct ValidationError {
    /// Name of the model whose schema rejected the document.
    pub model: String,
    /// The violated constraints. Never empty.
    pub violations: Vec<Violation>,
}

impl ValidationError {
    /// Returns `true` if any violation was reported for `path`.
    pub fn has_violation(&self, path: &str) -> bool {
        self.violations
            .iter()
            .any(|v| v.path == path)
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| format!("{}: {}", v.path, v))
        .collect::<Vec<_>>()
        .join(", ")
}
