//! Backend-agnostic document CRUD.
//!
//! This crate is the primary entry point for users of the crudkit framework.
//! It re-exports the core criteria/pagination/schema machinery and provides
//! the two backend orchestrators behind one contract.
//!
//! # Features
//!
//! - **One contract, two backends** - The same operation set runs against a
//!   relational table or a schema-less document collection
//! - **Parameterized criteria** - Filter trees compile to statement fragments
//!   with named bindings; values are never interpolated into statements
//! - **Schema-driven orchestration** - Uniqueness guards, identity policy, and
//!   default filling declared once per collection
//! - **Typed failures** - Every error carries a stable code from a closed
//!   taxonomy, with backend errors normalized by substring registry
//!
//! # Quick Start
//!
//! ```ignore
//! use crudkit::prelude::*;
//! use crudkit::memory::MemoryBackend;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), DbError> {
//!     let mut errors = ErrorsMapper::new();
//!     register_db_user_friendly_exceptions(&mut errors);
//!
//!     let mut client = DocStoreClient::new(
//!         MemoryBackend::new(),
//!         ClientSettings::default(),
//!         errors,
//!     );
//!     client.connect().await?;
//!
//!     let schema = DocumentSchema::builder("office")
//!         .alias("office")
//!         .unique(["officeCode"])
//!         .build();
//!     let offices = std::sync::Arc::new(DocStoreCrud::new(&client, schema));
//!
//!     let controller = offices.clone();
//!     let office = client
//!         .using_session(
//!             move |session| async move {
//!                 controller.init(&session).await?;
//!                 controller
//!                     .create_document(
//!                         &session,
//!                         json!({ "officeCode": "HQ", "name": "Headquarters" })
//!                             .as_object()
//!                             .cloned()
//!                             .unwrap(),
//!                     )
//!                     .await
//!             },
//!             true,
//!         )
//!         .await?;
//!
//!     println!("created {}", offices.display(Some(&office)));
//!     Ok(())
//! }
//! ```
//!
//! # Backends
//!
//! - [`sql`] - Relational-table orchestrator over an external SQL driver
//! - [`docstore`] - Document-collection orchestrator over an external
//!   document-protocol driver
//! - [`memory`] - In-memory provider for development and testing

#[allow(unused_extern_crates)]
extern crate self as crudkit;

pub mod prelude;

pub use crudkit_core::{client, crud, document, error, filter, group, ident, mapper, page, schema, sort};

// Re-export the JSON value types documents are built from.
pub use serde_json;

/// Relational-table backend.
pub mod sql {
    pub use crudkit_sql::{InsertResult, SelectQuery, SqlClient, SqlCrud, SqlSession, SqlSessionProvider};
}

/// Schema-less document-collection backend.
pub mod docstore {
    pub use crudkit_docstore::{AddResult, DocSession, DocSessionProvider, DocStoreClient, DocStoreCrud, FindQuery};
}

/// In-memory provider for development and testing.
pub mod memory {
    pub use crudkit_memory::{MemoryBackend, MemorySession, StatementFilter};
}
