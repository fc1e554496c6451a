//! The database-client contract shared by every backend.
//!
//! A client owns the connection lifecycle and the session/transaction
//! wrapper. The underlying pool, wire protocol, and timeouts belong to the
//! backend-specific session provider behind it.

use std::future::Future;

use async_trait::async_trait;

use crate::error::DbResult;

/// Case-insensitive collation applied by the search paths when none is
/// configured.
pub const DEFAULT_CI_COLLATION: &str = "utf8mb4_0900_ai_ci";

/// Connection-level settings shared by both backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    /// Collation used for case-insensitive search statements.
    pub ci_collation: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self { ci_collation: DEFAULT_CI_COLLATION.to_string() }
    }
}

/// Uniform client surface: connection lifecycle plus scoped session
/// acquisition.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Session handle passed to [`using_session`](Self::using_session)
    /// callbacks. Cloning yields another handle to the same session; the
    /// session is owned exclusively by the callback for the duration of the
    /// call and must not be retained afterwards.
    type Session: Send + Sync + Clone + 'static;

    /// Collation used for case-insensitive search statements.
    fn ci_collation(&self) -> &str;

    /// Opens the underlying connection. Fails with `ConnectionAlreadyOpen`
    /// when called twice.
    async fn connect(&mut self) -> DbResult<()>;

    /// Closes the underlying connection. Fails with `ConnectionNotOpen` when
    /// the client is not connected.
    async fn disconnect(&mut self) -> DbResult<()>;

    /// Verifies the connection is alive.
    async fn healthcheck(&self) -> DbResult<()>;

    /// Acquires a session, optionally opens a transaction, runs the callback,
    /// commits or rolls back, and always releases the session.
    ///
    /// On failure the error is re-thrown normalized through the client's
    /// [`ErrorsMapper`](crate::mapper::ErrorsMapper); a rollback failure never
    /// masks the original error. Fails with `ConnectionNotOpen` when the
    /// client is not connected.
    async fn using_session<T, F, Fut>(&self, callback: F, transacted: bool) -> DbResult<T>
    where
        T: Send + 'static,
        F: FnOnce(Self::Session) -> Fut + Send + 'static,
        Fut: Future<Output = DbResult<T>> + Send + 'static;
}
