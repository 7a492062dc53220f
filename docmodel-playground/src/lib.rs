//! Course catalogue playground built on docmodel.
//!
//! The binary connects to a store, then creates, queries, updates and removes `Course`
//! documents. The pieces are exposed here so they can be driven from tests against an
//! in-memory store.

pub mod config;
pub mod course;
pub mod logging;
pub mod scenario;

pub use config::PlaygroundConfig;
pub use course::Course;
