//! A schema-validated document model over pluggable document stores.
//!
//! This crate is the core of the docmodel project and provides:
//!
//! - **Document traits** ([`document`]) - Core traits for defining and serializing documents
//! - **Schemas** ([`schema`]) - Field constraints, defaults and validation
//! - **Store backend abstraction** ([`backend`]) - Traits for implementing different storage backends
//! - **Query and filtering API** ([`query`]) - Type-safe query construction and filtering
//! - **Field mutations** ([`update`]) - `$set`, `$unset` and `$inc` updates
//! - **Collections interface** ([`collection`]) - The typed create, find, update and delete verbs
//! - **Document store** ([`store`]) - The connection handle
//! - **Error handling** ([`error`]) - Error and result types
//! - **Pagination** ([`page`]) - Page requests and page results
//!
//! # Example
//!
//! ```ignore
//! use docmodel::prelude::{Document, FieldSpec, Schema};
//! use bson::oid::ObjectId;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct User {
//!     #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
//!     pub id: Option<ObjectId>,
//!     pub name: String,
//! }
//!
//! impl Document for User {
//!     fn id(&self) -> Option<&ObjectId> {
//!         self.id.as_ref()
//!     }
//!
//!     fn collection_name() -> &'static str {
//!         "users"
//!     }
//!
//!     fn schema() -> Schema {
//!         Schema::builder("User")
//!             .field(FieldSpec::string("name").required())
//!             .build()
//!     }
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmodel_core;

pub mod backend;
pub mod collection;
pub mod document;
pub mod error;
pub mod page;
pub mod query;
pub mod schema;
pub mod store;
pub mod update;
