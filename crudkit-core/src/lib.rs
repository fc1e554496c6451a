//! Backend-agnostic document CRUD: the core contracts and algebra.
//!
//! This crate is the core of the crudkit project and provides:
//!
//! - **Filter criteria algebra** ([`filter`]) - Recursive condition/group trees compiled to parameterized query fragments
//! - **Sorting** ([`sort`]) - Chainable, eagerly-validated sort builder
//! - **Grouping** ([`group`]) - Grouping/aggregation request shapes
//! - **Pagination** ([`page`]) - Page/limit/offset calculus and result envelopes
//! - **Error handling** ([`error`], [`mapper`]) - Closed error taxonomy and the backend-error normalizer
//! - **Document schemas** ([`schema`], [`document`]) - Collection descriptors, identity policy, and materialization helpers
//! - **CRUD contract** ([`crud`]) - The operation set every backend orchestrator implements
//! - **Client contract** ([`client`]) - Connection lifecycle and the session/transaction wrapper
//!
//! # Example
//!
//! ```ignore
//! use crudkit_core::filter::{Condition, Filter};
//! use crudkit_core::schema::DocumentSchema;
//!
//! let schema = DocumentSchema::builder("office")
//!     .alias("office")
//!     .unique(["officeCode"])
//!     .build();
//!
//! let filter = Filter::and([
//!     Condition::eq("country", "US").into(),
//!     Condition::gr("places", 10).into(),
//! ]);
//! let criteria = Filter::to_criteria(&filter)?;
//! # Ok::<(), crudkit_core::error::DbError>(())
//! ```

#[allow(unused_extern_crates)]
extern crate self as crudkit_core;

pub mod client;
pub mod crud;
pub mod document;
pub mod error;
pub mod filter;
pub mod group;
pub mod ident;
pub mod mapper;
pub mod page;
pub mod schema;
pub mod sort;
