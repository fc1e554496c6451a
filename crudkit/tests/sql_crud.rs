//! End-to-end relational CRUD over the in-memory provider.

use serde_json::{Value, json};

use crudkit::memory::{MemoryBackend, MemorySession};
use crudkit::prelude::*;
use crudkit::sql::{SqlCrud, SqlSessionProvider};

fn doc(value: Value) -> Document {
    value.as_object().cloned().unwrap()
}

fn employee_schema() -> DocumentSchema {
    DocumentSchema::builder("employee")
        .alias("emp")
        .unique(["email"])
        .build()
}

async fn setup() -> (MemorySession, SqlCrud<MemorySession>) {
    let backend = MemoryBackend::new();
    let session = SqlSessionProvider::session(&backend).await.unwrap();
    let crud = SqlCrud::with_collation(employee_schema(), DEFAULT_CI_COLLATION);
    crud.init(&session).await.unwrap();
    (session, crud)
}

#[tokio::test]
async fn create_inserts_a_row_and_rereads_it() {
    let (session, crud) = setup().await;

    let created = crud
        .create_document(&session, doc(json!({ "email": "a@b.c", "age": 30 })))
        .await
        .unwrap();
    let id = created["_id"].as_str().unwrap().to_string();
    assert!(id.starts_with("emp_"));

    let fetched = crud.get_document(&session, Some(&id)).await.unwrap();
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn unique_index_is_enforced_before_insert() {
    let (session, crud) = setup().await;

    crud.create_document(&session, doc(json!({ "email": "a@b.c" })))
        .await
        .unwrap();
    let err = crud
        .create_document(&session, doc(json!({ "email": "a@b.c" })))
        .await
        .unwrap_err();
    assert_eq!(err.code, db_errors::duplicated_document().code);
    assert_eq!(crud.get_total(&session).await.unwrap(), 1);
}

#[tokio::test]
async fn nested_values_are_stored_as_json_strings() {
    let (session, crud) = setup().await;

    let created = crud
        .create_document(
            &session,
            doc(json!({
                "email": "a@b.c",
                "address": { "city": "NYC", "line1": "347 5th Ave" },
            })),
        )
        .await
        .unwrap();

    let address = created["address"].as_str().unwrap();
    let parsed: Value = serde_json::from_str(address).unwrap();
    assert_eq!(parsed["city"], "NYC");
}

#[tokio::test]
async fn listing_paginates_and_sorts_descending() {
    let (session, crud) = setup().await;

    for (email, age) in [("a@b.c", 30), ("b@b.c", 40), ("c@b.c", 35)] {
        crud.create_document(&session, doc(json!({ "email": email, "age": age })))
            .await
            .unwrap();
    }

    let sort = sort_by().desc(["age"]).unwrap().to_criteria();
    let set = crud
        .get_documents(&session, Some(offset_pagination(1, 2)), Some(&sort))
        .await
        .unwrap();

    assert_eq!(set.data.len(), 2);
    assert_eq!(set.data[0]["age"], 40);
    assert_eq!(set.data[1]["age"], 35);
    assert_eq!(set.total, 3);
    assert_eq!(set.total_pages, 2);
}

#[tokio::test]
async fn update_reads_merges_and_writes() {
    let (session, crud) = setup().await;

    let created = crud
        .create_document(&session, doc(json!({ "email": "a@b.c", "age": 30 })))
        .await
        .unwrap();
    let id = created["_id"].as_str().unwrap().to_string();

    let updated = crud
        .update_document(&session, &id, doc(json!({ "age": 31 })))
        .await
        .unwrap();
    assert_eq!(updated["age"], 31);
    assert_eq!(updated["email"], "a@b.c");
}

#[tokio::test]
async fn delete_requires_an_existing_row() {
    let (session, crud) = setup().await;

    let created = crud
        .create_document(&session, doc(json!({ "email": "a@b.c" })))
        .await
        .unwrap();
    let id = created["_id"].as_str().unwrap().to_string();

    assert_eq!(crud.delete_document(&session, &id).await.unwrap(), id);
    let err = crud.delete_document(&session, &id).await.unwrap_err();
    assert_eq!(err.code, db_errors::nothing_was_deleted().code);
}

#[tokio::test]
async fn property_filters_select_matching_rows() {
    let (session, crud) = setup().await;

    for (email, role) in [("a@b.c", "admin"), ("b@b.c", "member"), ("c@b.c", "admin")] {
        crud.create_document(&session, doc(json!({ "email": email, "role": role })))
            .await
            .unwrap();
    }

    let set = crud
        .filter_documents(
            &session,
            &doc(json!({ "role": "admin" })),
            GroupOperation::And,
            None,
            None,
        )
        .await
        .unwrap();
    assert_eq!(set.total, 2);
    assert!(set.data.iter().all(|d| d["role"] == "admin"));
}

#[tokio::test]
async fn get_document_by_criteria_misses_with_a_typed_error() {
    let (session, crud) = setup().await;

    let err = crud
        .get_document_by_criteria(
            &session,
            &doc(json!({ "email": "nobody@b.c" })),
            GroupOperation::And,
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, db_errors::document_not_found().code);
}
