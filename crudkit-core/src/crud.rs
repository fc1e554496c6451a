//! The shared CRUD contract implemented by every backend orchestrator.
//!
//! One trait, two independent implementations — the relational-table
//! orchestrator and the document-collection orchestrator — selected at
//! construction time. Their result-materialization internals differ and are
//! deliberately not unified behind a single code path.

use async_trait::async_trait;
use serde_json::Value;

use crate::document::{Document, SqlResultSet};
use crate::error::DbResult;
use crate::filter::{FilterCriteria, GroupOperation};
use crate::group::Group;
use crate::page::{OffsetPagination, PaginatedSet, offset_pagination};
use crate::schema::DocumentSchema;
use crate::sort::Sort;

/// Page size used by [`CrudOperations::fetch_all`] to drain a collection.
const FETCH_ALL_PAGE_SIZE: u64 = 100;

/// Uniform document CRUD over a bound `(session, schema)` pair.
///
/// Validation errors (missing id or criteria, malformed caller criteria) are
/// raised before any backend call; backend-raised errors surface through the
/// error normalizer as typed [`DbError`](crate::error::DbError)s.
#[async_trait]
pub trait CrudOperations: Send + Sync {
    /// The backend session type operations execute against.
    type Session: Send + Sync;

    /// The schema this orchestrator is bound to.
    fn schema(&self) -> &DocumentSchema;

    /// Renders a document for humans via the schema.
    fn display(&self, document: Option<&Document>) -> String {
        self.schema().display(document)
    }

    /// Backend-specific collection/table preparation. Idempotent.
    async fn init(&self, session: &Self::Session) -> DbResult<()>;

    /// Fills defaults, enforces every declared unique index, inserts, and
    /// returns the canonical stored form.
    ///
    /// Fails with `DuplicatedDocument` when any unique index already matches.
    async fn create_document(
        &self,
        session: &Self::Session,
        values: Document,
    ) -> DbResult<Document>;

    /// Like [`create_document`](Self::create_document), but returns the first
    /// existing match of a unique index instead of failing.
    async fn create_document_if_not_exists(
        &self,
        session: &Self::Session,
        values: Document,
    ) -> DbResult<Document>;

    /// Re-derives the full document by merging stored state with incoming
    /// values through the schema factory, applies the update, and returns the
    /// canonical stored form.
    async fn update_document(
        &self,
        session: &Self::Session,
        id: &str,
        values: Document,
    ) -> DbResult<Document>;

    /// Deletes by identity. Fails with `NothingWasDeleted` when no row
    /// matched.
    async fn delete_document(&self, session: &Self::Session, id: &str) -> DbResult<String>;

    /// Deletes every document, or every document matching the compiled
    /// criteria.
    async fn delete_all(
        &self,
        session: &Self::Session,
        filter: Option<&FilterCriteria>,
    ) -> DbResult<u64>;

    /// Fetches by identity. Fails with `NoIdProvided` for a missing id and
    /// `DocumentNotFound` for a miss.
    async fn get_document(&self, session: &Self::Session, id: Option<&str>) -> DbResult<Document>;

    /// Criteria-based single-document fetch; fails with `DocumentNotFound` on
    /// a miss.
    async fn get_document_by_criteria(
        &self,
        session: &Self::Session,
        props: &Document,
        join: GroupOperation,
    ) -> DbResult<Document>;

    /// Criteria-based single-document fetch returning `None` on a miss.
    async fn find_document(
        &self,
        session: &Self::Session,
        props: &Document,
    ) -> DbResult<Option<Document>>;

    /// Unfiltered paginated listing; sorts ascending by identity when no sort
    /// is given.
    async fn get_documents(
        &self,
        session: &Self::Session,
        pagination: Option<OffsetPagination>,
        sort: Option<&Sort>,
    ) -> DbResult<PaginatedSet<Document>>;

    /// Paginated listing filtered by equality on the given properties.
    async fn filter_documents(
        &self,
        session: &Self::Session,
        props: &Document,
        join: GroupOperation,
        pagination: Option<OffsetPagination>,
        sort: Option<&Sort>,
    ) -> DbResult<PaginatedSet<Document>>;

    /// Paginated listing filtered by a compiled criteria fragment. The total
    /// comes from an independent count query over the same criteria.
    async fn filter_documents_by_criteria(
        &self,
        session: &Self::Session,
        filter: &FilterCriteria,
        pagination: Option<OffsetPagination>,
        sort: Option<&Sort>,
    ) -> DbResult<PaginatedSet<Document>>;

    /// Paginated listing over the given identities, optionally intersected
    /// with an extra compiled filter. An empty id list returns an empty
    /// envelope without a backend round-trip.
    async fn filter_documents_by_ids(
        &self,
        session: &Self::Session,
        ids: &[String],
        pagination: Option<OffsetPagination>,
        sort: Option<&Sort>,
        filter: Option<&FilterCriteria>,
    ) -> DbResult<PaginatedSet<Document>>;

    /// Case-insensitive pattern-match search over the given properties, using
    /// the collation configured on the backend connection.
    async fn search_documents(
        &self,
        session: &Self::Session,
        props: &Document,
        join: GroupOperation,
        pagination: Option<OffsetPagination>,
    ) -> DbResult<PaginatedSet<Document>>;

    /// Search by a caller-assembled statement with its named bindings.
    async fn search_documents_by_criteria(
        &self,
        session: &Self::Session,
        criteria: &str,
        props: &Document,
        pagination: Option<OffsetPagination>,
        sort: Option<&Sort>,
    ) -> DbResult<PaginatedSet<Document>>;

    /// Executes the group/aggregate translation and returns one document per
    /// aggregated row, keyed by the requested aliases.
    async fn group_by_documents(
        &self,
        session: &Self::Session,
        group_by: &Group,
    ) -> DbResult<Vec<Document>>;

    /// Uniqueness guard: fails with `DuplicatedDocument` when a document
    /// matching the given properties exists. Success means "does not exist".
    async fn exists_document(&self, session: &Self::Session, props: &Document) -> DbResult<()>;

    /// Count of documents matching equality on the given properties.
    async fn get_count(
        &self,
        session: &Self::Session,
        props: &Document,
        join: GroupOperation,
    ) -> DbResult<u64>;

    /// Unfiltered count of the whole collection.
    async fn get_total(&self, session: &Self::Session) -> DbResult<u64>;

    /// Invokes a stored procedure, binding positional values through
    /// generated, collision-free session-scoped variables.
    async fn call_stored_procedure(
        &self,
        session: &Self::Session,
        procedure: &str,
        values: &[Value],
    ) -> DbResult<SqlResultSet>;

    /// Drains every page of the (optionally filtered) listing into one
    /// vector.
    async fn fetch_all(
        &self,
        session: &Self::Session,
        sort: Option<&Sort>,
        filter: Option<(&Document, GroupOperation)>,
    ) -> DbResult<Vec<Document>> {
        let mut result = Vec::new();
        let mut page = 1;
        loop {
            let pagination = Some(offset_pagination(page, FETCH_ALL_PAGE_SIZE));
            let set = match filter {
                Some((props, join)) => {
                    self.filter_documents(session, props, join, pagination, sort)
                        .await?
                }
                None => self.get_documents(session, pagination, sort).await?,
            };
            let total_pages = set.total_pages;
            result.extend(set.data);
            page += 1;
            if page > total_pages {
                break;
            }
        }
        Ok(result)
    }
}
