//! Relational-table backend for crudkit.
//!
//! This crate provides the relational variant of the shared CRUD contract:
//! [`SqlCrud`] composes parameterized statements and structured requests from
//! the core criteria algebra, and executes them through the
//! [`SqlSession`]/[`SqlSessionProvider`] boundary an external driver
//! implements.
//!
//! # Example
//!
//! ```ignore
//! use crudkit_core::client::{ClientSettings, DatabaseClient};
//! use crudkit_core::mapper::ErrorsMapper;
//! use crudkit_core::schema::DocumentSchema;
//! use crudkit_sql::{SqlClient, SqlCrud};
//!
//! let mut client = SqlClient::new(provider, ClientSettings::default(), ErrorsMapper::new());
//! client.connect().await?;
//!
//! let employees = SqlCrud::new(&client, DocumentSchema::builder("employee").build());
//! let created = client
//!     .using_session(move |session| async move {
//!         employees.create_document(&session, values).await
//!     }, true)
//!     .await?;
//! # Ok::<(), crudkit_core::error::DbError>(())
//! ```

#[allow(unused_extern_crates)]
extern crate self as crudkit_sql;

pub mod client;
pub mod crud;
pub mod session;

pub use client::SqlClient;
pub use crud::SqlCrud;
pub use session::{InsertResult, SelectQuery, SqlSession, SqlSessionProvider};
