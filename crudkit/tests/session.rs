//! Session/transaction wrapper behavior over the in-memory provider.

use std::sync::Arc;

use serde_json::{Value, json};

use crudkit::docstore::{DocStoreClient, DocStoreCrud};
use crudkit::memory::{MemoryBackend, MemorySession};
use crudkit::prelude::*;

fn doc(value: Value) -> Document {
    value.as_object().cloned().unwrap()
}

fn employee_schema() -> DocumentSchema {
    DocumentSchema::builder("employee")
        .alias("emp")
        .unique(["email"])
        .build()
}

fn client_for(backend: MemoryBackend) -> DocStoreClient<MemoryBackend> {
    let mut errors = ErrorsMapper::new();
    register_db_user_friendly_exceptions(&mut errors);
    DocStoreClient::new(backend, ClientSettings::default(), errors)
}

#[tokio::test]
async fn using_session_requires_an_open_connection() {
    let client = client_for(MemoryBackend::new());
    let err = client
        .using_session(|_session| async { Ok(()) }, false)
        .await
        .unwrap_err();
    assert_eq!(err.code, db_errors::connection_not_open().code);
}

#[tokio::test]
async fn connection_lifecycle_misuse_is_typed() {
    let mut client = client_for(MemoryBackend::new());

    let err = client.disconnect().await.unwrap_err();
    assert_eq!(err.code, db_errors::connection_not_open().code);
    let err = client.healthcheck().await.unwrap_err();
    assert_eq!(err.code, db_errors::connection_not_open().code);

    client.connect().await.unwrap();
    client.healthcheck().await.unwrap();

    let err = client.connect().await.unwrap_err();
    assert_eq!(err.code, db_errors::connection_already_open().code);

    client.disconnect().await.unwrap();
    client.connect().await.unwrap();
}

#[tokio::test]
async fn transacted_callback_success_commits() {
    let backend = MemoryBackend::new();
    let mut client = client_for(backend.clone());
    client.connect().await.unwrap();

    let crud: Arc<DocStoreCrud<MemorySession>> =
        Arc::new(DocStoreCrud::with_collation(employee_schema(), DEFAULT_CI_COLLATION));

    let controller = crud.clone();
    let created = client
        .using_session(
            move |session| async move {
                controller.init(&session).await?;
                controller
                    .create_document(&session, doc(json!({ "email": "a@b.c" })))
                    .await
            },
            true,
        )
        .await
        .unwrap();

    assert_eq!(created["email"], "a@b.c");
    assert_eq!(backend.collection_len("employee").await, 1);
}

#[tokio::test]
async fn transacted_callback_failure_rolls_back() {
    let backend = MemoryBackend::new();
    let mut client = client_for(backend.clone());
    client.connect().await.unwrap();

    let crud: Arc<DocStoreCrud<MemorySession>> =
        Arc::new(DocStoreCrud::with_collation(employee_schema(), DEFAULT_CI_COLLATION));

    let controller = crud.clone();
    let result: DbResult<Document> = client
        .using_session(
            move |session| async move {
                controller.init(&session).await?;
                controller
                    .create_document(&session, doc(json!({ "email": "a@b.c" })))
                    .await?;
                Err(db_errors::db_any_error())
            },
            true,
        )
        .await;

    assert_eq!(result.unwrap_err().code, db_errors::db_any_error().code);
    assert_eq!(backend.collection_len("employee").await, 0);
}

#[tokio::test]
async fn untransacted_failure_leaves_completed_writes() {
    let backend = MemoryBackend::new();
    let mut client = client_for(backend.clone());
    client.connect().await.unwrap();

    let crud: Arc<DocStoreCrud<MemorySession>> =
        Arc::new(DocStoreCrud::with_collation(employee_schema(), DEFAULT_CI_COLLATION));

    let controller = crud.clone();
    let result: DbResult<Document> = client
        .using_session(
            move |session| async move {
                controller.init(&session).await?;
                controller
                    .create_document(&session, doc(json!({ "email": "a@b.c" })))
                    .await?;
                Err(db_errors::db_any_error())
            },
            false,
        )
        .await;

    assert!(result.is_err());
    assert_eq!(backend.collection_len("employee").await, 1);
}

#[tokio::test]
async fn sequential_operations_share_one_session() {
    let backend = MemoryBackend::new();
    let mut client = client_for(backend.clone());
    client.connect().await.unwrap();

    let crud: Arc<DocStoreCrud<MemorySession>> =
        Arc::new(DocStoreCrud::with_collation(employee_schema(), DEFAULT_CI_COLLATION));

    let controller = crud.clone();
    let total = client
        .using_session(
            move |session| async move {
                controller.init(&session).await?;
                for i in 0..3 {
                    controller
                        .create_document(&session, doc(json!({ "email": format!("u{i}@b.c") })))
                        .await?;
                }
                controller.get_total(&session).await
            },
            true,
        )
        .await
        .unwrap();

    assert_eq!(total, 3);
}
