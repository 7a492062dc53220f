//! Main docmodel crate providing a schema-validated document model over document stores.
//!
//! This crate is the primary entry point for users of the docmodel framework.
//! It re-exports the core types and functionality from the sub-crates, provides
//! access to the storage backends, and opens sessions from endpoint URIs.
//!
//! # Features
//!
//! - **Type-safe documents** - Define your data structures with Serde and store them safely
//! - **Schemas** - Required and conditionally required fields, enums, lengths and bounds
//! - **Multiple backends** - In-memory and MongoDB storage behind one trait
//! - **Flexible querying** - Composable filters with skip/limit, sorting and projection
//!
//! # Quick Start
//!
//! ```ignore
//! use docmodel::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let store = docmodel::connect("memory://playground").await?;
//!     let courses = store.typed_collection::<Course>();
//!
//!     let course = courses.create(Course::new("Node.js Course", "web")).await?;
//!
//!     let published = courses
//!         .find_many(
//!             Query::builder()
//!                 .filter(Filter::eq("isPublished", true))
//!                 .sort("name", SortDirection::Asc)
//!                 .limit(10)
//!                 .build(),
//!         )
//!         .await?;
//!
//!     store.shutdown().await
//! }
//! ```
//!
//! # Dynamic Dispatch
//!
//! [`connect`] picks the backend at runtime and returns a [`DynDocumentStore`]. A store built
//! directly over a concrete backend can be converted with `into_dyn`:
//!
//! ```ignore
//! use docmodel::{prelude::*, memory::InMemoryStore};
//!
//! let store: DynDocumentStore = DocumentStore::new(InMemoryStore::new()).into_dyn();
//! ```
//!
//! # Backends
//!
//! - [`memory`] - Fast in-memory storage for development and testing
//! - [`mongodb`] - Persistent MongoDB backend (requires `mongodb` feature)
//!
//! [`DynDocumentStore`]: store::DynDocumentStore

pub mod connection;
pub mod prelude;

pub use docmodel_core::{backend, collection, document, error, page, query, schema, store, update};
pub use connection::{ConnectOptions, connect, connect_with};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docmodel_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docmodel_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
