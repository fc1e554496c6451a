//! Session-provider boundary for the relational-table backend.
//!
//! These traits are the seam to the external SQL driver: the orchestrator
//! composes parameterized statements and structured requests, the driver
//! executes them. Pooling, the wire protocol, and timeouts live behind this
//! boundary.

use async_trait::async_trait;
use serde_json::Value;

use crudkit_core::document::{Document, SqlResultSet};
use crudkit_core::error::DbResult;
use crudkit_core::filter::FilterCriteria;

/// Outcome of a row insert.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InsertResult {
    /// Rows written.
    pub affected: u64,
    /// Identity generated by the backend, when the table generates one.
    pub generated_id: Option<String>,
}

/// A structured select request against one table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectQuery {
    /// Parameterized `WHERE` fragment; `None` selects everything.
    pub criteria: Option<FilterCriteria>,
    /// Rendered `ORDER BY` clause body, e.g. `` `name` asc, `age` desc ``.
    pub order_by: Option<String>,
    /// Row cap; `None` means unbounded.
    pub limit: Option<u64>,
    /// Rows to skip.
    pub offset: u64,
}

/// A live relational session. Implementations are expected to pipeline
/// concurrent calls issued against one session; program order is only
/// guaranteed for sequentially awaited calls.
#[async_trait]
pub trait SqlSession: Send + Sync {
    async fn begin(&self) -> DbResult<()>;
    async fn commit(&self) -> DbResult<()>;
    async fn rollback(&self) -> DbResult<()>;

    /// Inserts one row.
    async fn insert(&self, table: &str, values: &Document) -> DbResult<InsertResult>;

    /// Updates rows matching the criteria, returning the affected count.
    async fn update(
        &self,
        table: &str,
        criteria: &FilterCriteria,
        values: &Document,
    ) -> DbResult<u64>;

    /// Deletes rows matching the criteria (all rows for `None`), returning
    /// the affected count.
    async fn delete(&self, table: &str, criteria: Option<&FilterCriteria>) -> DbResult<u64>;

    /// Runs a structured select, materializing rows as documents.
    async fn select(&self, table: &str, query: &SelectQuery) -> DbResult<Vec<Document>>;

    /// Counts rows matching the criteria (all rows for `None`).
    async fn count(&self, table: &str, criteria: Option<&FilterCriteria>) -> DbResult<u64>;

    /// Executes a raw statement with positional parameters, returning a
    /// column-introspected result set.
    async fn sql(&self, statement: &str, params: &[Value]) -> DbResult<SqlResultSet>;
}

/// Factory for relational sessions: the external collaborator owning the pool.
#[async_trait]
pub trait SqlSessionProvider: Send + Sync {
    type Session: SqlSession + Send + Sync + Clone + 'static;

    /// Opens the underlying pool/connection.
    async fn connect(&self) -> DbResult<()>;

    /// Destroys the underlying pool/connection.
    async fn disconnect(&self) -> DbResult<()>;

    /// Verifies the backend is reachable.
    async fn healthcheck(&self) -> DbResult<()>;

    /// Acquires a session from the pool.
    async fn session(&self) -> DbResult<Self::Session>;

    /// Returns a session to the pool.
    async fn release(&self, session: Self::Session) -> DbResult<()>;
}
