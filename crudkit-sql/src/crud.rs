//! The relational-table CRUD orchestrator.

use std::marker::PhantomData;

use async_trait::async_trait;
use futures::future::try_join_all;
use serde_json::{Map, Value};

use crudkit_core::crud::CrudOperations;
use crudkit_core::document::{Document, SqlResultSet, merge};
use crudkit_core::error::{DbResult, db_errors};
use crudkit_core::filter::{FilterCriteria, GroupOperation};
use crudkit_core::group::Group;
use crudkit_core::ident::generate_var_name;
use crudkit_core::page::{OffsetPagination, PaginatedSet, calculate_limit, result_set};
use crudkit_core::schema::DocumentSchema;
use crudkit_core::sort::Sort;

use crate::client::SqlClient;
use crate::session::{SelectQuery, SqlSession, SqlSessionProvider};

/// CRUD over one relational table, bound to a [`DocumentSchema`].
///
/// Rows come back from the session boundary as ready-made documents; nested
/// arrays and objects are serialized to JSON strings on the way in, since a
/// relational column holds scalars.
#[derive(Debug)]
pub struct SqlCrud<S> {
    schema: DocumentSchema,
    ci_collation: String,
    _session: PhantomData<S>,
}

impl<S: SqlSession> SqlCrud<S> {
    /// Binds a schema to the client's connection settings.
    pub fn new<P>(client: &SqlClient<P>, schema: DocumentSchema) -> Self
    where
        P: SqlSessionProvider<Session = S> + 'static,
    {
        use crudkit_core::client::DatabaseClient;

        Self::with_collation(schema, client.ci_collation())
    }

    /// Binds a schema with an explicit case-insensitive collation.
    pub fn with_collation(schema: DocumentSchema, ci_collation: impl Into<String>) -> Self {
        Self {
            schema,
            ci_collation: ci_collation.into(),
            _session: PhantomData,
        }
    }

    fn quote(name: &str) -> String {
        format!("`{name}`")
    }

    /// Equality criteria over the given properties, bound by property name.
    fn where_criteria(&self, props: &Document, join: GroupOperation) -> FilterCriteria {
        let statement = props
            .keys()
            .map(|name| format!("{} = :{name}", Self::quote(name)))
            .collect::<Vec<_>>()
            .join(&format!(" {join} "));
        FilterCriteria::new(statement, props.clone())
    }

    fn id_criteria(&self, id: &str) -> FilterCriteria {
        let mut variables = Map::new();
        variables.insert("id".to_string(), Value::String(id.to_string()));
        FilterCriteria::new(
            format!("{} = :id", Self::quote(self.schema.id_field())),
            variables,
        )
    }

    fn sort_criteria(&self, sort: Option<&Sort>) -> Vec<String> {
        match sort {
            Some(sort) => sort
                .iter()
                .map(|condition| {
                    format!("{} {}", Self::quote(&condition.field), condition.order.keyword())
                })
                .collect(),
            None => vec![format!("{} asc", Self::quote(self.schema.id_field()))],
        }
    }

    fn sort_raw_statement(&self, sort: Option<&Sort>) -> String {
        self.sort_criteria(sort).join(", ")
    }

    /// Case-insensitive `LIKE` fragment for one property, bound by name.
    fn search_criteria(&self, prop: &str) -> String {
        format!(
            "{} COLLATE {} LIKE :{prop}",
            Self::quote(prop),
            self.ci_collation
        )
    }

    /// Converts a document to row values: nested arrays/objects become JSON
    /// strings, excluded fields are dropped.
    fn document_to_db(&self, values: &Document, exclude: &[&str]) -> DbResult<Document> {
        let mut row = Document::new();
        for (key, value) in values {
            if exclude.contains(&key.as_str()) {
                continue;
            }
            let value = match value {
                Value::Array(_) | Value::Object(_) => Value::String(serde_json::to_string(value)?),
                other => other.clone(),
            };
            row.insert(key.clone(), value);
        }
        Ok(row)
    }

    fn id_of(&self, document: &Document) -> DbResult<String> {
        match document.get(self.schema.id_field()) {
            Some(Value::String(id)) => Ok(id.clone()),
            Some(Value::Number(id)) => Ok(id.to_string()),
            _ => Err(db_errors::no_id_provided()),
        }
    }

    fn pick(document: &Document, fields: &[String]) -> Document {
        let mut props = Document::new();
        for field in fields {
            props.insert(
                field.clone(),
                document.get(field).cloned().unwrap_or(Value::Null),
            );
        }
        props
    }

    async fn insert_and_reread(&self, session: &S, new_doc: &Document) -> DbResult<Document> {
        let row = self.document_to_db(new_doc, &[])?;
        let result = session.insert(self.schema.name(), &row).await?;

        let id = if self.schema.generated_id() {
            result.generated_id.ok_or_else(db_errors::db_instruction)?
        } else {
            self.id_of(new_doc)?
        };
        self.get_document(session, Some(&id)).await
    }
}

#[async_trait]
impl<S: SqlSession> CrudOperations for SqlCrud<S> {
    type Session = S;

    fn schema(&self) -> &DocumentSchema {
        &self.schema
    }

    async fn init(&self, _session: &S) -> DbResult<()> {
        // Relational tables are provisioned out of band.
        Ok(())
    }

    async fn create_document(&self, session: &S, values: Document) -> DbResult<Document> {
        let new_doc = self.schema.get_document(values);

        let guards: Vec<Document> = self
            .schema
            .unique()
            .iter()
            .map(|index| Self::pick(&new_doc, index))
            .filter(|props| !props.is_empty())
            .collect();
        try_join_all(
            guards
                .iter()
                .map(|props| self.exists_document(session, props)),
        )
        .await?;

        self.insert_and_reread(session, &new_doc).await
    }

    async fn create_document_if_not_exists(
        &self,
        session: &S,
        values: Document,
    ) -> DbResult<Document> {
        let new_doc = self.schema.get_document(values);

        for index in self.schema.unique() {
            let props = Self::pick(&new_doc, index);
            if props.is_empty() {
                continue;
            }
            if let Some(existing) = self.find_document(session, &props).await? {
                return Ok(existing);
            }
        }

        self.insert_and_reread(session, &new_doc).await
    }

    async fn update_document(&self, session: &S, id: &str, values: Document) -> DbResult<Document> {
        let initial = self.get_document(session, Some(id)).await?;
        let new_doc = self.schema.get_document(merge(&initial, &values));
        let row = self.document_to_db(&new_doc, &[self.schema.id_field()])?;

        session
            .update(self.schema.name(), &self.id_criteria(id), &row)
            .await?;
        self.get_document(session, Some(id)).await
    }

    async fn delete_document(&self, session: &S, id: &str) -> DbResult<String> {
        let affected = session
            .delete(self.schema.name(), Some(&self.id_criteria(id)))
            .await?;
        if affected < 1 {
            return Err(db_errors::nothing_was_deleted());
        }
        Ok(id.to_string())
    }

    async fn delete_all(&self, session: &S, filter: Option<&FilterCriteria>) -> DbResult<u64> {
        session
            .delete(self.schema.name(), filter.filter(|f| !f.is_empty()))
            .await
    }

    async fn get_document(&self, session: &S, id: Option<&str>) -> DbResult<Document> {
        let Some(id) = id else {
            return Err(db_errors::no_id_provided());
        };
        let query = SelectQuery {
            criteria: Some(self.id_criteria(id)),
            limit: Some(1),
            ..SelectQuery::default()
        };
        session
            .select(self.schema.name(), &query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(db_errors::document_not_found)
    }

    async fn get_document_by_criteria(
        &self,
        session: &S,
        props: &Document,
        join: GroupOperation,
    ) -> DbResult<Document> {
        if props.is_empty() {
            return Err(db_errors::no_criteria_provided());
        }
        let query = SelectQuery {
            criteria: Some(self.where_criteria(props, join)),
            limit: Some(1),
            ..SelectQuery::default()
        };
        session
            .select(self.schema.name(), &query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(db_errors::document_not_found)
    }

    async fn find_document(&self, session: &S, props: &Document) -> DbResult<Option<Document>> {
        if props.is_empty() {
            return Err(db_errors::no_criteria_provided());
        }
        let query = SelectQuery {
            criteria: Some(self.where_criteria(props, GroupOperation::And)),
            limit: Some(1),
            ..SelectQuery::default()
        };
        Ok(session
            .select(self.schema.name(), &query)
            .await?
            .into_iter()
            .next())
    }

    async fn get_documents(
        &self,
        session: &S,
        pagination: Option<OffsetPagination>,
        sort: Option<&Sort>,
    ) -> DbResult<PaginatedSet<Document>> {
        let paginated = calculate_limit(pagination);
        let query = SelectQuery {
            criteria: None,
            order_by: Some(self.sort_raw_statement(sort)),
            limit: Some(paginated.limit),
            offset: paginated.offset,
        };
        let docs = session.select(self.schema.name(), &query).await?;
        let total = session.count(self.schema.name(), None).await?;
        Ok(result_set(docs, &paginated, total))
    }

    async fn filter_documents(
        &self,
        session: &S,
        props: &Document,
        join: GroupOperation,
        pagination: Option<OffsetPagination>,
        sort: Option<&Sort>,
    ) -> DbResult<PaginatedSet<Document>> {
        if props.is_empty() {
            return Err(db_errors::no_criteria_provided());
        }
        let criteria = self.where_criteria(props, join);
        self.filter_documents_by_criteria(session, &criteria, pagination, sort)
            .await
    }

    async fn filter_documents_by_criteria(
        &self,
        session: &S,
        filter: &FilterCriteria,
        pagination: Option<OffsetPagination>,
        sort: Option<&Sort>,
    ) -> DbResult<PaginatedSet<Document>> {
        let paginated = calculate_limit(pagination);
        let criteria = (!filter.is_empty()).then(|| filter.clone());
        let query = SelectQuery {
            criteria: criteria.clone(),
            order_by: Some(self.sort_raw_statement(sort)),
            limit: Some(paginated.limit),
            offset: paginated.offset,
        };
        let docs = session.select(self.schema.name(), &query).await?;
        let total = session
            .count(self.schema.name(), criteria.as_ref())
            .await?;
        Ok(result_set(docs, &paginated, total))
    }

    async fn filter_documents_by_ids(
        &self,
        session: &S,
        ids: &[String],
        pagination: Option<OffsetPagination>,
        sort: Option<&Sort>,
        filter: Option<&FilterCriteria>,
    ) -> DbResult<PaginatedSet<Document>> {
        if ids.is_empty() {
            let paginated = calculate_limit(pagination);
            return Ok(result_set(Vec::new(), &paginated, 0));
        }

        let id_field = self.schema.id_field();
        let mut variables = Map::new();
        let mut parts = Vec::with_capacity(ids.len());
        for (i, id) in ids.iter().enumerate() {
            let var = format!("{id_field}{i}");
            parts.push(format!("{} = :{var}", Self::quote(id_field)));
            variables.insert(var, Value::String(id.clone()));
        }
        let ids_statement = parts.join(" OR ");

        let combined = match filter {
            Some(extra) if !extra.is_empty() => {
                for (name, value) in &extra.variables {
                    variables.insert(name.clone(), value.clone());
                }
                FilterCriteria::new(
                    format!("({ids_statement}) AND {}", extra.statement),
                    variables,
                )
            }
            _ => FilterCriteria::new(ids_statement, variables),
        };
        self.filter_documents_by_criteria(session, &combined, pagination, sort)
            .await
    }

    async fn search_documents(
        &self,
        session: &S,
        props: &Document,
        join: GroupOperation,
        pagination: Option<OffsetPagination>,
    ) -> DbResult<PaginatedSet<Document>> {
        if props.is_empty() {
            return Err(db_errors::no_criteria_provided());
        }
        let criteria = props
            .keys()
            .map(|prop| self.search_criteria(prop))
            .collect::<Vec<_>>()
            .join(&format!(" {join} "));
        self.search_documents_by_criteria(session, &criteria, props, pagination, None)
            .await
    }

    async fn search_documents_by_criteria(
        &self,
        session: &S,
        criteria: &str,
        props: &Document,
        pagination: Option<OffsetPagination>,
        sort: Option<&Sort>,
    ) -> DbResult<PaginatedSet<Document>> {
        if props.is_empty() {
            return Err(db_errors::no_criteria_provided());
        }
        let paginated = calculate_limit(pagination);
        let filter = FilterCriteria::new(criteria, props.clone());
        let query = SelectQuery {
            criteria: Some(filter.clone()),
            order_by: sort.map(|sort| self.sort_raw_statement(Some(sort))),
            limit: Some(paginated.limit),
            offset: paginated.offset,
        };
        let docs = session.select(self.schema.name(), &query).await?;
        let total = session.count(self.schema.name(), Some(&filter)).await?;
        Ok(result_set(docs, &paginated, total))
    }

    async fn group_by_documents(&self, session: &S, group_by: &Group) -> DbResult<Vec<Document>> {
        if group_by.is_empty() {
            return Err(db_errors::no_criteria_provided());
        }
        let select_stmt = group_by
            .iter()
            .map(|condition| match &condition.aggregate {
                Some(aggregate) => format!(
                    "{}({}) as {}",
                    aggregate.keyword(),
                    Self::quote(&condition.field),
                    condition.alias
                ),
                None => format!("{} as {}", Self::quote(&condition.field), condition.alias),
            })
            .collect::<Vec<_>>()
            .join(", ");
        let group_stmt = group_by
            .iter()
            .filter(|condition| condition.aggregate.is_none())
            .map(|condition| Self::quote(&condition.field))
            .collect::<Vec<_>>()
            .join(", ");
        let cmd = format!(
            "SELECT {select_stmt} FROM {} GROUP BY {group_stmt}",
            self.schema.name()
        );

        let cursor = session.sql(&cmd, &[]).await?;
        let props: Vec<String> = group_by
            .iter()
            .map(|condition| condition.alias.clone())
            .collect();
        Ok(cursor.into_documents(&props))
    }

    async fn exists_document(&self, session: &S, props: &Document) -> DbResult<()> {
        if props.is_empty() {
            return Err(db_errors::no_criteria_provided());
        }
        let criteria = self.where_criteria(props, GroupOperation::And);
        let count = session.count(self.schema.name(), Some(&criteria)).await?;
        if count > 0 {
            return Err(db_errors::duplicated_document());
        }
        Ok(())
    }

    async fn get_count(
        &self,
        session: &S,
        props: &Document,
        join: GroupOperation,
    ) -> DbResult<u64> {
        if props.is_empty() {
            return Err(db_errors::no_criteria_provided());
        }
        let criteria = self.where_criteria(props, join);
        session.count(self.schema.name(), Some(&criteria)).await
    }

    async fn get_total(&self, session: &S) -> DbResult<u64> {
        session.count(self.schema.name(), None).await
    }

    async fn call_stored_procedure(
        &self,
        session: &S,
        procedure: &str,
        values: &[Value],
    ) -> DbResult<SqlResultSet> {
        let mut params: Vec<String> = Vec::with_capacity(values.len());
        let mut assignments: Vec<(String, Value)> = Vec::with_capacity(values.len());
        for value in values {
            let var = loop {
                let var = format!("@{}", generate_var_name(5));
                if !params.contains(&var) {
                    break var;
                }
            };
            assignments.push((format!("SET {var} = ?;"), value.clone()));
            params.push(var);
        }

        try_join_all(
            assignments
                .iter()
                .map(|(statement, value)| session.sql(statement, std::slice::from_ref(value))),
        )
        .await?;

        let cmd = if params.is_empty() {
            format!("CALL {procedure};")
        } else {
            format!("CALL {procedure}({});", params.join(", "))
        };
        session.sql(&cmd, &[]).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use super::*;
    use crate::session::InsertResult;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
        selects: Mutex<VecDeque<Vec<Document>>>,
        counts: Mutex<VecDeque<u64>>,
        deletes: Mutex<VecDeque<u64>>,
        cursors: Mutex<VecDeque<SqlResultSet>>,
    }

    #[derive(Clone, Default)]
    struct FakeSession(Arc<Recorder>);

    impl FakeSession {
        fn record(&self, call: String) {
            self.0.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.0.calls.lock().unwrap().clone()
        }

        fn queue_select(&self, docs: Vec<Document>) {
            self.0.selects.lock().unwrap().push_back(docs);
        }

        fn queue_count(&self, count: u64) {
            self.0.counts.lock().unwrap().push_back(count);
        }

        fn queue_delete(&self, affected: u64) {
            self.0.deletes.lock().unwrap().push_back(affected);
        }

        fn queue_cursor(&self, cursor: SqlResultSet) {
            self.0.cursors.lock().unwrap().push_back(cursor);
        }
    }

    #[async_trait]
    impl SqlSession for FakeSession {
        async fn begin(&self) -> DbResult<()> {
            self.record("begin".into());
            Ok(())
        }

        async fn commit(&self) -> DbResult<()> {
            self.record("commit".into());
            Ok(())
        }

        async fn rollback(&self) -> DbResult<()> {
            self.record("rollback".into());
            Ok(())
        }

        async fn insert(&self, table: &str, values: &Document) -> DbResult<InsertResult> {
            self.record(format!("insert {table} {}", Value::Object(values.clone())));
            Ok(InsertResult { affected: 1, generated_id: None })
        }

        async fn update(
            &self,
            table: &str,
            criteria: &FilterCriteria,
            _values: &Document,
        ) -> DbResult<u64> {
            self.record(format!("update {table} where {}", criteria.statement));
            Ok(1)
        }

        async fn delete(&self, table: &str, criteria: Option<&FilterCriteria>) -> DbResult<u64> {
            self.record(format!(
                "delete {table} where {:?}",
                criteria.map(|c| c.statement.clone())
            ));
            Ok(self.0.deletes.lock().unwrap().pop_front().unwrap_or(0))
        }

        async fn select(&self, table: &str, query: &SelectQuery) -> DbResult<Vec<Document>> {
            self.record(format!(
                "select {table} where {:?} order_by {:?} limit {:?} offset {}",
                query.criteria.as_ref().map(|c| c.statement.clone()),
                query.order_by,
                query.limit,
                query.offset
            ));
            Ok(self.0.selects.lock().unwrap().pop_front().unwrap_or_default())
        }

        async fn count(&self, table: &str, criteria: Option<&FilterCriteria>) -> DbResult<u64> {
            self.record(format!(
                "count {table} where {:?}",
                criteria.map(|c| c.statement.clone())
            ));
            Ok(self.0.counts.lock().unwrap().pop_front().unwrap_or(0))
        }

        async fn sql(&self, statement: &str, params: &[Value]) -> DbResult<SqlResultSet> {
            self.record(format!("sql {statement} params {params:?}"));
            Ok(self.0.cursors.lock().unwrap().pop_front().unwrap_or_default())
        }
    }

    fn employee_schema() -> DocumentSchema {
        DocumentSchema::builder("employee")
            .alias("emp")
            .unique(["email"])
            .build()
    }

    fn crud() -> SqlCrud<FakeSession> {
        SqlCrud::with_collation(employee_schema(), "utf8mb4_0900_ai_ci")
    }

    #[tokio::test]
    async fn create_document_guards_uniqueness_before_insert() {
        let session = FakeSession::default();
        session.queue_count(1);

        let err = crud()
            .create_document(&session, doc(json!({ "email": "a@b.c" })))
            .await
            .unwrap_err();
        assert_eq!(err.code, db_errors::duplicated_document().code);
        assert!(!session.calls().iter().any(|c| c.starts_with("insert")));
    }

    #[tokio::test]
    async fn create_document_inserts_then_rereads() {
        let session = FakeSession::default();
        session.queue_count(0);
        session.queue_select(vec![doc(json!({ "_id": "emp_1", "email": "a@b.c" }))]);

        let schema = DocumentSchema::builder("employee")
            .alias("emp")
            .unique(["email"])
            .build();
        let crud: SqlCrud<FakeSession> = SqlCrud::with_collation(schema, "utf8mb4_0900_ai_ci");
        let created = crud
            .create_document(&session, doc(json!({ "_id": "emp_1", "email": "a@b.c" })))
            .await
            .unwrap();
        assert_eq!(created["_id"], "emp_1");

        let calls = session.calls();
        assert!(calls[0].starts_with("count employee where Some(\"`email` = :email\")"));
        assert!(calls[1].starts_with("insert employee"));
        assert!(calls[2].contains("`_id` = :id"));
    }

    #[tokio::test]
    async fn nested_values_are_serialized_for_the_row() {
        let session = FakeSession::default();
        session.queue_select(vec![doc(json!({ "_id": "emp_1" }))]);

        let schema = DocumentSchema::builder("employee").alias("emp").build();
        let crud: SqlCrud<FakeSession> = SqlCrud::with_collation(schema, "utf8mb4_0900_ai_ci");
        crud.create_document(
            &session,
            doc(json!({ "_id": "emp_1", "address": { "city": "NYC" } })),
        )
        .await
        .unwrap();

        let insert = session
            .calls()
            .into_iter()
            .find(|c| c.starts_with("insert"))
            .unwrap();
        assert!(insert.contains("\"{\\\"city\\\":\\\"NYC\\\"}\""));
    }

    #[tokio::test]
    async fn get_documents_defaults_to_identity_ascending() {
        let session = FakeSession::default();
        crud().get_documents(&session, None, None).await.unwrap();

        let calls = session.calls();
        assert!(calls[0].contains("order_by Some(\"`_id` asc\")"));
        assert!(calls[0].contains("limit Some(50) offset 0"));
        assert_eq!(calls[1], "count employee where None");
    }

    #[tokio::test]
    async fn delete_document_requires_an_affected_row() {
        let session = FakeSession::default();
        session.queue_delete(0);
        let err = crud().delete_document(&session, "missing").await.unwrap_err();
        assert_eq!(err.code, db_errors::nothing_was_deleted().code);
    }

    #[tokio::test]
    async fn search_uses_the_configured_collation() {
        let session = FakeSession::default();
        crud()
            .search_documents(
                &session,
                &doc(json!({ "name": "%ali%" })),
                GroupOperation::Or,
                None,
            )
            .await
            .unwrap();

        let calls = session.calls();
        assert!(calls[0].contains("`name` COLLATE utf8mb4_0900_ai_ci LIKE :name"));
    }

    #[tokio::test]
    async fn group_by_builds_aggregate_select() {
        let session = FakeSession::default();
        session.queue_cursor(SqlResultSet::new(
            vec!["office".into(), "headcount".into()],
            vec![vec![json!("hq"), json!(12)]],
        ));

        let group = vec![
            crudkit_core::group::GroupCondition::key("officeCode", "office"),
            crudkit_core::group::GroupCondition::aggregate(
                "_id",
                "headcount",
                crudkit_core::group::Aggregate::Count,
            ),
        ];
        let rows = crud().group_by_documents(&session, &group).await.unwrap();
        assert_eq!(rows[0]["office"], "hq");
        assert_eq!(rows[0]["headcount"], 12);

        let calls = session.calls();
        assert!(calls[0].contains(
            "SELECT `officeCode` as office, COUNT(`_id`) as headcount FROM employee GROUP BY `officeCode`"
        ));
    }

    #[tokio::test]
    async fn stored_procedure_binds_session_variables() {
        let session = FakeSession::default();
        crud()
            .call_stored_procedure(&session, "rebuild_stats", &[json!(2024), json!("east")])
            .await
            .unwrap();

        let calls = session.calls();
        assert_eq!(calls.iter().filter(|c| c.contains("SET @")).count(), 2);
        let call = calls.last().unwrap();
        assert!(call.contains("CALL rebuild_stats(@"));
        assert!(call.ends_with("); params []"));
    }

    #[tokio::test]
    async fn filter_by_ids_short_circuits_on_empty_input() {
        let session = FakeSession::default();
        let set = crud()
            .filter_documents_by_ids(&session, &[], None, None, None)
            .await
            .unwrap();
        assert!(set.data.is_empty());
        assert_eq!(set.total, 0);
        assert!(session.calls().is_empty());
    }

    #[tokio::test]
    async fn filter_by_ids_builds_an_or_chain() {
        let session = FakeSession::default();
        crud()
            .filter_documents_by_ids(
                &session,
                &["a".to_string(), "b".to_string()],
                None,
                None,
                None,
            )
            .await
            .unwrap();

        let calls = session.calls();
        assert!(calls[0].contains("`_id` = :_id0 OR `_id` = :_id1"));
    }
}
