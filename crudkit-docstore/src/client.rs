//! Document-store client: connection lifecycle and the session/transaction
//! wrapper.

use std::future::Future;

use async_trait::async_trait;
use tracing::{debug, warn};

use crudkit_core::client::{ClientSettings, DatabaseClient};
use crudkit_core::error::{DbResult, db_errors};
use crudkit_core::mapper::ErrorsMapper;

use crate::session::{DocSession, DocSessionProvider};

/// Client for the schema-less document-collection backend.
///
/// Wraps an external [`DocSessionProvider`] with connection-state tracking,
/// scoped session acquisition, and error normalization through an injected
/// [`ErrorsMapper`].
#[derive(Debug)]
pub struct DocStoreClient<P: DocSessionProvider> {
    provider: P,
    settings: ClientSettings,
    errors: ErrorsMapper,
    connected: bool,
}

impl<P: DocSessionProvider> DocStoreClient<P> {
    pub fn new(provider: P, settings: ClientSettings, errors: ErrorsMapper) -> Self {
        Self { provider, settings, errors, connected: false }
    }

    pub fn errors(&self) -> &ErrorsMapper {
        &self.errors
    }

    async fn run_scoped<T, F, Fut>(
        &self,
        session: &P::Session,
        callback: F,
        transacted: bool,
    ) -> DbResult<T>
    where
        F: FnOnce(P::Session) -> Fut + Send,
        Fut: Future<Output = DbResult<T>> + Send,
    {
        if transacted {
            session.begin().await?;
            debug!("transaction started");
        }
        match callback(session.clone()).await {
            Ok(value) => {
                if transacted {
                    session.commit().await?;
                    debug!("transaction committed");
                }
                Ok(value)
            }
            Err(error) => {
                if transacted {
                    // A rollback failure must not mask the original error.
                    if let Err(rollback_error) = session.rollback().await {
                        warn!(error = %rollback_error, "rollback failed");
                    } else {
                        debug!("transaction rolled back");
                    }
                }
                Err(error)
            }
        }
    }
}

#[async_trait]
impl<P: DocSessionProvider + 'static> DatabaseClient for DocStoreClient<P> {
    type Session = P::Session;

    fn ci_collation(&self) -> &str {
        &self.settings.ci_collation
    }

    async fn connect(&mut self) -> DbResult<()> {
        if self.connected {
            return Err(db_errors::connection_already_open());
        }
        self.provider.connect().await?;
        self.connected = true;
        debug!("document store connection opened");
        Ok(())
    }

    async fn disconnect(&mut self) -> DbResult<()> {
        if !self.connected {
            return Err(db_errors::connection_not_open());
        }
        self.provider.disconnect().await?;
        self.connected = false;
        debug!("document store connection closed");
        Ok(())
    }

    async fn healthcheck(&self) -> DbResult<()> {
        if !self.connected {
            return Err(db_errors::connection_not_open());
        }
        self.provider.healthcheck().await
    }

    async fn using_session<T, F, Fut>(&self, callback: F, transacted: bool) -> DbResult<T>
    where
        T: Send + 'static,
        F: FnOnce(Self::Session) -> Fut + Send + 'static,
        Fut: Future<Output = DbResult<T>> + Send + 'static,
    {
        if !self.connected {
            return Err(db_errors::connection_not_open());
        }
        let session = self
            .provider
            .session()
            .await
            .map_err(|error| self.errors.resolve(&error))?;

        let result = self.run_scoped(&session, callback, transacted).await;

        // Release on every exit path; a release failure is logged, not raised.
        if let Err(release_error) = self.provider.release(session).await {
            warn!(error = %release_error, "failed to release session");
        }

        result.map_err(|error| self.errors.resolve(&error))
    }
}
