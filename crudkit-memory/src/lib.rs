//! In-memory session provider for crudkit.
//!
//! This crate provides a thread-safe in-memory implementation of both backend
//! boundaries — the relational [`SqlSessionProvider`] and the
//! document-collection [`DocSessionProvider`] — over one shared store. It is
//! intended for development and testing: no persistence, no indexing, and no
//! raw-statement execution.
//!
//! # Quick Start
//!
//! ```ignore
//! use crudkit_core::client::{ClientSettings, DatabaseClient};
//! use crudkit_core::mapper::ErrorsMapper;
//! use crudkit_core::schema::DocumentSchema;
//! use crudkit_docstore::{DocStoreClient, DocStoreCrud};
//! use crudkit_memory::MemoryBackend;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), crudkit_core::error::DbError> {
//!     let mut client = DocStoreClient::new(
//!         MemoryBackend::new(),
//!         ClientSettings::default(),
//!         ErrorsMapper::new(),
//!     );
//!     client.connect().await?;
//!
//!     let offices = DocStoreCrud::new(&client, DocumentSchema::builder("office").build());
//!     client
//!         .using_session(move |session| async move {
//!             offices.init(&session).await
//!         }, false)
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! [`SqlSessionProvider`]: crudkit_sql::session::SqlSessionProvider
//! [`DocSessionProvider`]: crudkit_docstore::session::DocSessionProvider

#[allow(unused_extern_crates)]
extern crate self as crudkit_memory;

pub mod evaluator;
pub mod store;

pub use evaluator::StatementFilter;
pub use store::{MemoryBackend, MemorySession};
