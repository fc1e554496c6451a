//! Session-provider boundary for the document-collection backend.
//!
//! The boundary mirrors a document-store wire API: collections are keyed by
//! name, predicates arrive as parameterized statement fragments with named
//! bindings, and an escape hatch executes raw statements with positional
//! parameters for the search/group/procedure paths.

use async_trait::async_trait;
use serde_json::Value;

use crudkit_core::document::{Document, SqlResultSet};
use crudkit_core::error::DbResult;
use crudkit_core::filter::FilterCriteria;
use crudkit_core::schema::DocumentValidation;

/// Outcome of adding documents to a collection.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AddResult {
    /// Documents written.
    pub affected: u64,
    /// Identifiers generated by the backend for documents that arrived
    /// without one.
    pub generated_ids: Vec<String>,
}

/// A structured find request against one collection.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FindQuery {
    /// Parameterized predicate fragment; `None` matches everything.
    pub criteria: Option<FilterCriteria>,
    /// Ordering fragments, e.g. `["name asc", "places desc"]`, applied in
    /// order.
    pub sort: Vec<String>,
    /// Document cap; `None` means unbounded.
    pub limit: Option<u64>,
    /// Documents to skip.
    pub offset: u64,
}

/// A live document-collection session. Implementations are expected to
/// pipeline concurrent calls issued against one session.
#[async_trait]
pub trait DocSession: Send + Sync {
    async fn begin(&self) -> DbResult<()>;
    async fn commit(&self) -> DbResult<()>;
    async fn rollback(&self) -> DbResult<()>;

    /// Creates a collection if it does not exist, attaching the validation
    /// descriptor uninterpreted. Idempotent.
    async fn create_collection(
        &self,
        name: &str,
        validation: Option<&DocumentValidation>,
    ) -> DbResult<()>;

    /// Drops a collection and its documents. Idempotent.
    async fn drop_collection(&self, name: &str) -> DbResult<()>;

    /// Adds one document, generating an identity when it carries none.
    async fn add(&self, collection: &str, document: &Document) -> DbResult<AddResult>;

    /// Runs a structured find.
    async fn find(&self, collection: &str, query: &FindQuery) -> DbResult<Vec<Document>>;

    /// Patches every document matching the criteria with the given fields,
    /// returning the affected count.
    async fn modify(
        &self,
        collection: &str,
        criteria: &FilterCriteria,
        patch: &Document,
    ) -> DbResult<u64>;

    /// Removes documents matching the criteria, returning the affected count.
    async fn remove(&self, collection: &str, criteria: &FilterCriteria) -> DbResult<u64>;

    /// Removes every document in the collection.
    async fn remove_all(&self, collection: &str) -> DbResult<u64>;

    /// Counts documents matching the criteria (all documents for `None`).
    async fn count(&self, collection: &str, criteria: Option<&FilterCriteria>) -> DbResult<u64>;

    /// Executes a raw statement with positional parameters, returning a
    /// column-introspected result set.
    async fn sql(&self, statement: &str, params: &[Value]) -> DbResult<SqlResultSet>;
}

/// Factory for document-collection sessions: the external collaborator owning
/// the pool.
#[async_trait]
pub trait DocSessionProvider: Send + Sync {
    type Session: DocSession + Send + Sync + Clone + 'static;

    /// Opens the underlying pool/connection.
    async fn connect(&self) -> DbResult<()>;

    /// Closes all pooled connections.
    async fn disconnect(&self) -> DbResult<()>;

    /// Verifies the backend is reachable.
    async fn healthcheck(&self) -> DbResult<()>;

    /// Acquires a session from the pool.
    async fn session(&self) -> DbResult<Self::Session>;

    /// Releases a session back to the pool.
    async fn release(&self, session: Self::Session) -> DbResult<()>;
}
