//! The document-collection CRUD orchestrator.

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

use crate::client::DocStoreClient;
use crate::session::{DocSession, DocSessionProvider, FindQuery};

/// CRUD over one document collection, bound to a [`DocumentSchema`].
///
/// Structured finds go through the collection API; the search, group-by, and
/// stored-procedure paths drop to raw statements over the JSON document
/// column, and their column-introspected results are translated back into
/// documents via the schema's validation descriptor.
#[derive(Debug)]
pub struct DocStoreCrud<S> {
    schema: DocumentSchema,
    ci_collation: String,
    _session: PhantomData<S>,
}

impl<S: DocSession> DocStoreCrud<S> {
    /// Binds a schema to the client's connection settings.
    pub fn new<P>(client: &DocStoreClient<P>, schema: DocumentSchema) -> Self
    where
        P: DocSessionProvider<Session = S> + 'static,
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

    /// Equality criteria over the given properties, bound by property name.
    fn where_criteria(&self, props: &Document, join: GroupOperation) -> FilterCriteria {
        let statement = props
            .keys()
            .map(|name| format!("{name} = :{name}"))
            .collect::<Vec<_>>()
            .join(&format!(" {join} "));
        FilterCriteria::new(statement, props.clone())
    }

    fn id_criteria(&self, id: &str) -> FilterCriteria {
        let mut variables = Map::new();
        variables.insert("id".to_string(), Value::String(id.to_string()));
        FilterCriteria::new(format!("{} = :id", self.schema.id_field()), variables)
    }

    fn sort_criteria(&self, sort: Option<&Sort>) -> Vec<String> {
        match sort {
            Some(sort) => sort
                .iter()
                .map(|condition| format!("{} {}", condition.field, condition.order.keyword()))
                .collect(),
            None => vec![format!("{} asc", self.schema.id_field())],
        }
    }

    fn sort_raw_statement(&self, sort: Option<&Sort>) -> String {
        self.sort_criteria(sort).join(", ")
    }

    /// Case-insensitive `LIKE` fragment over the JSON document column for one
    /// property, bound to a session-scoped variable.
    fn search_criteria(&self, prop: &str, variable: Option<&str>, ci: bool) -> String {
        let variable = variable.unwrap_or(prop);
        if ci {
            format!(
                "JSON_EXTRACT(doc, \"$.{prop}\") COLLATE {} LIKE @{variable}",
                self.ci_collation
            )
        } else {
            format!("JSON_EXTRACT(doc, \"$.{prop}\") LIKE @{variable}")
        }
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

    /// Translates a column-introspected result set into documents, keeping
    /// the columns declared by the validation descriptor (all columns when
    /// the schema carries none).
    fn get_result_set(&self, cursor: SqlResultSet) -> Vec<Document> {
        let declared = self.schema.declared_properties();
        let props = if declared.is_empty() {
            cursor.columns.clone()
        } else {
            cursor
                .columns
                .iter()
                .filter(|column| declared.contains(column))
                .cloned()
                .collect()
        };
        cursor.into_documents(&props)
    }

    fn scalar_count(cursor: &SqlResultSet) -> DbResult<u64> {
        match cursor.scalar() {
            Some(Value::Number(n)) => n.as_u64().ok_or_else(db_errors::db_instruction),
            Some(Value::String(s)) => s.parse().map_err(|_| db_errors::db_instruction()),
            _ => Err(db_errors::db_instruction()),
        }
    }

    /// Binds props as session-scoped `@` variables, fanning the SET
    /// statements out and awaiting them all.
    async fn bind_session_variables(&self, session: &S, props: &Document) -> DbResult<()> {
        let assignments: Vec<(String, Value)> = props
            .iter()
            .map(|(prop, value)| (format!("SET @{prop} = ?;"), value.clone()))
            .collect();
        try_join_all(
            assignments
                .iter()
                .map(|(statement, value)| session.sql(statement, std::slice::from_ref(value))),
        )
        .await?;
        Ok(())
    }

    async fn add_and_reread(&self, session: &S, new_doc: &Document) -> DbResult<Document> {
        let result = session.add(self.schema.name(), new_doc).await?;

        let id = if self.schema.generated_id() {
            result
                .generated_ids
                .first()
                .cloned()
                .ok_or_else(db_errors::db_instruction)?
        } else {
            self.id_of(new_doc)?
        };
        self.get_document(session, Some(&id)).await
    }
}

#[async_trait]
impl<S: DocSession> CrudOperations for DocStoreCrud<S> {
    type Session = S;

    fn schema(&self) -> &DocumentSchema {
        &self.schema
    }

    async fn init(&self, session: &S) -> DbResult<()> {
        session
            .create_collection(self.schema.name(), self.schema.validation())
            .await
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

        self.add_and_reread(session, &new_doc).await
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

        self.add_and_reread(session, &new_doc).await
    }

    async fn update_document(&self, session: &S, id: &str, values: Document) -> DbResult<Document> {
        let initial = self.get_document(session, Some(id)).await?;
        let new_doc = self.schema.get_document(merge(&initial, &values));

        session
            .modify(self.schema.name(), &self.id_criteria(id), &new_doc)
            .await?;
        self.get_document(session, Some(id)).await
    }

    async fn delete_document(&self, session: &S, id: &str) -> DbResult<String> {
        let affected = session
            .remove(self.schema.name(), &self.id_criteria(id))
            .await?;
        if affected < 1 {
            return Err(db_errors::nothing_was_deleted());
        }
        Ok(id.to_string())
    }

    async fn delete_all(&self, session: &S, filter: Option<&FilterCriteria>) -> DbResult<u64> {
        match filter {
            Some(criteria) if !criteria.is_empty() => {
                session.remove(self.schema.name(), criteria).await
            }
            _ => session.remove_all(self.schema.name()).await,
        }
    }

    async fn get_document(&self, session: &S, id: Option<&str>) -> DbResult<Document> {
        let Some(id) = id else {
            return Err(db_errors::no_id_provided());
        };
        let query = FindQuery {
            criteria: Some(self.id_criteria(id)),
            limit: Some(1),
            ..FindQuery::default()
        };
        session
            .find(self.schema.name(), &query)
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
        let query = FindQuery {
            criteria: Some(self.where_criteria(props, join)),
            limit: Some(1),
            ..FindQuery::default()
        };
        session
            .find(self.schema.name(), &query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(db_errors::document_not_found)
    }

    async fn find_document(&self, session: &S, props: &Document) -> DbResult<Option<Document>> {
        if props.is_empty() {
            return Err(db_errors::no_criteria_provided());
        }
        let query = FindQuery {
            criteria: Some(self.where_criteria(props, GroupOperation::And)),
            limit: Some(1),
            ..FindQuery::default()
        };
        Ok(session
            .find(self.schema.name(), &query)
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
        let query = FindQuery {
            criteria: None,
            sort: self.sort_criteria(sort),
            limit: Some(paginated.limit),
            offset: paginated.offset,
        };
        let docs = session.find(self.schema.name(), &query).await?;
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
        let query = FindQuery {
            criteria: criteria.clone(),
            sort: self.sort_criteria(sort),
            limit: Some(paginated.limit),
            offset: paginated.offset,
        };
        let docs = session.find(self.schema.name(), &query).await?;
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
            parts.push(format!("{id_field} = :{var}"));
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
            .map(|prop| self.search_criteria(prop, None, true))
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

        let declared = self.schema.declared_properties();
        let select_stmt = if declared.is_empty() {
            "*".to_string()
        } else {
            declared
                .iter()
                .map(|property| format!("JSON_EXTRACT(doc, \"$.{property}\") as {property}"))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let sort_stmt = match sort {
            Some(sort) => format!(" ORDER BY {}", self.sort_raw_statement(Some(sort))),
            None => String::new(),
        };
        let cmd_all = format!(
            "SELECT {select_stmt} FROM {} WHERE {criteria}{sort_stmt}",
            self.schema.name()
        );
        let cmd = format!(
            "{cmd_all} LIMIT {} OFFSET {}",
            paginated.limit, paginated.offset
        );

        self.bind_session_variables(session, props).await?;
        let cursor = session.sql(&cmd, &[]).await?;
        let docs = self.get_result_set(cursor);

        let count_cmd = format!(
            "SELECT COUNT(*) as total FROM {} WHERE {criteria}",
            self.schema.name()
        );
        let total = Self::scalar_count(&session.sql(&count_cmd, &[]).await?)?;

        Ok(result_set(docs, &paginated, total))
    }

    async fn group_by_documents(&self, session: &S, group_by: &Group) -> DbResult<Vec<Document>> {
        if group_by.is_empty() {
            return Err(db_errors::no_criteria_provided());
        }
        let select_stmt = group_by
            .iter()
            .map(|condition| {
                let extracted = format!("JSON_EXTRACT(doc, \"$.{}\")", condition.field);
                match &condition.aggregate {
                    Some(aggregate) => {
                        format!("{}({extracted}) as {}", aggregate.keyword(), condition.alias)
                    }
                    None => format!("{extracted} as {}", condition.alias),
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        let group_stmt = group_by
            .iter()
            .filter(|condition| condition.aggregate.is_none())
            .map(|condition| format!("JSON_EXTRACT(doc, \"$.{}\")", condition.field))
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
