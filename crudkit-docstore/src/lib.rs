//! Schema-less document-collection backend for crudkit.
//!
//! This crate provides the document-collection variant of the shared CRUD
//! contract: [`DocStoreCrud`] drives a collection through the
//! [`DocSession`]/[`DocSessionProvider`] boundary an external driver
//! implements. Structured finds use the collection API; search, group-by, and
//! stored procedures drop to raw statements over the JSON document column.
//!
//! # Example
//!
//! ```ignore
//! use crudkit_core::client::{ClientSettings, DatabaseClient};
//! use crudkit_core::mapper::ErrorsMapper;
//! use crudkit_core::schema::DocumentSchema;
//! use crudkit_docstore::{DocStoreClient, DocStoreCrud};
//!
//! let mut client = DocStoreClient::new(provider, ClientSettings::default(), ErrorsMapper::new());
//! client.connect().await?;
//!
//! let offices = DocStoreCrud::new(&client, DocumentSchema::builder("office").build());
//! client
//!     .using_session(move |session| async move {
//!         offices.init(&session).await
//!     }, true)
//!     .await?;
//! # Ok::<(), crudkit_core::error::DbError>(())
//! ```

#[allow(unused_extern_crates)]
extern crate self as crudkit_docstore;

pub mod client;
pub mod crud;
pub mod session;

pub use client::DocStoreClient;
pub use crud::DocStoreCrud;
pub use session::{AddResult, DocSession, DocSessionProvider, FindQuery};
