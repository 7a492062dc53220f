//! Convenient re-exports of commonly used types from docmodel.
//!
//! ```ignore
//! use docmodel::prelude::*;
//! ```
//!
//! This provides access to:
//! - Document traits and schemas
//! - Stores, backends and builders
//! - Query, update and pagination construction
//! - Error types

pub use docmodel_core::{
    collection::TypedCollection,
    store::{DocumentStore, DynDocumentStore},
    document::{Document, DocumentExt, IntoDocumentId},
    schema::{FieldSpec, FieldType, Schema},
    backend::{StoreBackend, StoreBackendBuilder, UpdateResult},
    query::{Query, Expr, Sort, SortDirection, FieldOp, Projection, QueryBuilder, Filter},
    update::Update,
    page::{Page, PaginationParams},
    error::{DocumentStoreError, DocumentStoreResult, ValidationError},
};

pub use crate::connection::{ConnectOptions, connect};
