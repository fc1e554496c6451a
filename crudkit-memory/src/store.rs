//! Thread-safe in-memory session provider for development and testing.
//!
//! [`MemoryBackend`] implements both the relational and the
//! document-collection provider boundaries over one shared store, so either
//! orchestrator can run against it. Documents live in insertion order inside
//! async-aware read-write locks; transactions are whole-store snapshots
//! restored on rollback.
//!
//! The raw-statement escape hatch (`sql`) is not available here — search,
//! group-by, and stored procedures need a real backend and fail with
//! `NotImplemented`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use mea::rwlock::RwLock;
use nanoid::nanoid;
use serde_json::Value;

use crudkit_core::document::{Document, SqlResultSet};
use crudkit_core::error::{DbResult, db_errors};
use crudkit_core::filter::FilterCriteria;
use crudkit_core::schema::DocumentValidation;
use crudkit_docstore::session::{AddResult, DocSession, DocSessionProvider, FindQuery};
use crudkit_sql::session::{InsertResult, SelectQuery, SqlSession, SqlSessionProvider};

use crate::evaluator::{StatementFilter, sort_documents};

/// Identity field generated for documents added without one, matching the
/// document-protocol convention.
const GENERATED_ID_FIELD: &str = "_id";

type CollectionMap = Vec<Document>;
type StoreMap = HashMap<String, CollectionMap>;

/// In-memory backend serving sessions for both orchestrator flavors.
///
/// Cloning shares the same underlying store. Queries scan collections in
/// insertion order; there is no indexing.
#[derive(Default, Clone, Debug)]
pub struct MemoryBackend {
    store: Arc<RwLock<StoreMap>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently held by a collection.
    pub async fn collection_len(&self, name: &str) -> usize {
        self.store
            .read()
            .await
            .get(name)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

/// A session over a [`MemoryBackend`]. Cloning yields another handle to the
/// same session state.
#[derive(Clone, Debug)]
pub struct MemorySession {
    store: Arc<RwLock<StoreMap>>,
    snapshot: Arc<RwLock<Option<StoreMap>>>,
}

impl MemorySession {
    fn new(store: Arc<RwLock<StoreMap>>) -> Self {
        Self {
            store,
            snapshot: Arc::new(RwLock::new(None)),
        }
    }

    async fn begin_snapshot(&self) -> DbResult<()> {
        let current = self.store.read().await.clone();
        *self.snapshot.write().await = Some(current);
        Ok(())
    }

    async fn drop_snapshot(&self) -> DbResult<()> {
        *self.snapshot.write().await = None;
        Ok(())
    }

    async fn restore_snapshot(&self) -> DbResult<()> {
        if let Some(snapshot) = self.snapshot.write().await.take() {
            *self.store.write().await = snapshot;
        }
        Ok(())
    }

    fn filter_for(criteria: Option<&FilterCriteria>) -> DbResult<Option<StatementFilter>> {
        match criteria {
            Some(criteria) if !criteria.is_empty() => {
                Ok(Some(StatementFilter::from_criteria(criteria)?))
            }
            _ => Ok(None),
        }
    }

    fn matching(
        collection: &[Document],
        criteria: Option<&FilterCriteria>,
    ) -> DbResult<Vec<Document>> {
        let filter = Self::filter_for(criteria)?;
        let mut matched = Vec::new();
        for document in collection {
            let keep = match (&filter, criteria) {
                (Some(filter), Some(criteria)) => filter.matches(document, &criteria.variables)?,
                _ => true,
            };
            if keep {
                matched.push(document.clone());
            }
        }
        Ok(matched)
    }

    async fn query(
        &self,
        collection: &str,
        criteria: Option<&FilterCriteria>,
        sort: &[String],
        limit: Option<u64>,
        offset: u64,
    ) -> DbResult<Vec<Document>> {
        let store = self.store.read().await;
        let documents = match store.get(collection) {
            Some(documents) => Self::matching(documents, criteria)?,
            None => Vec::new(),
        };
        drop(store);

        let mut documents = documents;
        sort_documents(&mut documents, sort);

        Ok(documents
            .into_iter()
            .skip(offset as usize)
            .take(limit.unwrap_or(u64::MAX) as usize)
            .collect())
    }

    async fn patch(
        &self,
        collection: &str,
        criteria: &FilterCriteria,
        patch: &Document,
    ) -> DbResult<u64> {
        let filter = StatementFilter::from_criteria(criteria)?;
        let mut store = self.store.write().await;
        let Some(documents) = store.get_mut(collection) else {
            return Ok(0);
        };

        let mut affected = 0;
        for document in documents.iter_mut() {
            if filter.matches(document, &criteria.variables)? {
                for (key, value) in patch {
                    document.insert(key.clone(), value.clone());
                }
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn delete_matching(
        &self,
        collection: &str,
        criteria: Option<&FilterCriteria>,
    ) -> DbResult<u64> {
        let filter = Self::filter_for(criteria)?;
        let mut store = self.store.write().await;
        let Some(documents) = store.get_mut(collection) else {
            return Ok(0);
        };

        let before = documents.len();
        match (&filter, criteria) {
            (Some(filter), Some(criteria)) => {
                let mut keep = Vec::with_capacity(before);
                for document in documents.iter() {
                    keep.push(!filter.matches(document, &criteria.variables)?);
                }
                let mut flags = keep.into_iter();
                documents.retain(|_| flags.next().unwrap_or(true));
            }
            _ => documents.clear(),
        }
        Ok((before - documents.len()) as u64)
    }

    async fn count_matching(
        &self,
        collection: &str,
        criteria: Option<&FilterCriteria>,
    ) -> DbResult<u64> {
        let store = self.store.read().await;
        match store.get(collection) {
            Some(documents) => Ok(Self::matching(documents, criteria)?.len() as u64),
            None => Ok(0),
        }
    }
}

#[async_trait]
impl DocSession for MemorySession {
    async fn begin(&self) -> DbResult<()> {
        self.begin_snapshot().await
    }

    async fn commit(&self) -> DbResult<()> {
        self.drop_snapshot().await
    }

    async fn rollback(&self) -> DbResult<()> {
        self.restore_snapshot().await
    }

    async fn create_collection(
        &self,
        name: &str,
        _validation: Option<&DocumentValidation>,
    ) -> DbResult<()> {
        self.store
            .write()
            .await
            .entry(name.to_string())
            .or_default();
        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> DbResult<()> {
        self.store.write().await.remove(name);
        Ok(())
    }

    async fn add(&self, collection: &str, document: &Document) -> DbResult<AddResult> {
        let mut document = document.clone();
        let mut generated_ids = Vec::new();
        if !document.contains_key(GENERATED_ID_FIELD) {
            let id = nanoid!();
            document.insert(GENERATED_ID_FIELD.to_string(), Value::String(id.clone()));
            generated_ids.push(id);
        }

        self.store
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .push(document);
        Ok(AddResult { affected: 1, generated_ids })
    }

    async fn find(&self, collection: &str, query: &FindQuery) -> DbResult<Vec<Document>> {
        self.query(
            collection,
            query.criteria.as_ref(),
            &query.sort,
            query.limit,
            query.offset,
        )
        .await
    }

    async fn modify(
        &self,
        collection: &str,
        criteria: &FilterCriteria,
        patch: &Document,
    ) -> DbResult<u64> {
        self.patch(collection, criteria, patch).await
    }

    async fn remove(&self, collection: &str, criteria: &FilterCriteria) -> DbResult<u64> {
        self.delete_matching(collection, Some(criteria)).await
    }

    async fn remove_all(&self, collection: &str) -> DbResult<u64> {
        self.delete_matching(collection, None).await
    }

    async fn count(&self, collection: &str, criteria: Option<&FilterCriteria>) -> DbResult<u64> {
        self.count_matching(collection, criteria).await
    }

    async fn sql(&self, _statement: &str, _params: &[Value]) -> DbResult<SqlResultSet> {
        Err(db_errors::not_implemented())
    }
}

#[async_trait]
impl SqlSession for MemorySession {
    async fn begin(&self) -> DbResult<()> {
        self.begin_snapshot().await
    }

    async fn commit(&self) -> DbResult<()> {
        self.drop_snapshot().await
    }

    async fn rollback(&self) -> DbResult<()> {
        self.restore_snapshot().await
    }

    async fn insert(&self, table: &str, values: &Document) -> DbResult<InsertResult> {
        self.store
            .write()
            .await
            .entry(table.to_string())
            .or_default()
            .push(values.clone());
        Ok(InsertResult { affected: 1, generated_id: None })
    }

    async fn update(
        &self,
        table: &str,
        criteria: &FilterCriteria,
        values: &Document,
    ) -> DbResult<u64> {
        self.patch(table, criteria, values).await
    }

    async fn delete(&self, table: &str, criteria: Option<&FilterCriteria>) -> DbResult<u64> {
        self.delete_matching(table, criteria).await
    }

    async fn select(&self, table: &str, query: &SelectQuery) -> DbResult<Vec<Document>> {
        let sort: Vec<String> = query
            .order_by
            .as_deref()
            .map(|order_by| {
                order_by
                    .split(',')
                    .map(|fragment| fragment.trim().to_string())
                    .filter(|fragment| !fragment.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        self.query(table, query.criteria.as_ref(), &sort, query.limit, query.offset)
            .await
    }

    async fn count(&self, table: &str, criteria: Option<&FilterCriteria>) -> DbResult<u64> {
        self.count_matching(table, criteria).await
    }

    async fn sql(&self, _statement: &str, _params: &[Value]) -> DbResult<SqlResultSet> {
        Err(db_errors::not_implemented())
    }
}

#[async_trait]
impl DocSessionProvider for MemoryBackend {
    type Session = MemorySession;

    async fn connect(&self) -> DbResult<()> {
        Ok(())
    }

    async fn disconnect(&self) -> DbResult<()> {
        Ok(())
    }

    async fn healthcheck(&self) -> DbResult<()> {
        Ok(())
    }

    async fn session(&self) -> DbResult<Self::Session> {
        Ok(MemorySession::new(self.store.clone()))
    }

    async fn release(&self, _session: Self::Session) -> DbResult<()> {
        Ok(())
    }
}

#[async_trait]
impl SqlSessionProvider for MemoryBackend {
    type Session = MemorySession;

    async fn connect(&self) -> DbResult<()> {
        Ok(())
    }

    async fn disconnect(&self) -> DbResult<()> {
        Ok(())
    }

    async fn healthcheck(&self) -> DbResult<()> {
        Ok(())
    }

    async fn session(&self) -> DbResult<Self::Session> {
        Ok(MemorySession::new(self.store.clone()))
    }

    async fn release(&self, _session: Self::Session) -> DbResult<()> {
        Ok(())
    }
}
