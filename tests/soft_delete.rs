//! Soft-delete lifecycle: active -> trashed -> restored, plus the trashed
//! read targets.

mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::json;
use trellis::{build_router, Crud, Group};

fn project_router(store: trellis::Store) -> axum::Router {
    build_router(
        Group::new("api").mount(Crud::<Project>::soft_deletable("projects")),
        store,
    )
}

#[tokio::test]
async fn soft_delete_round_trip() {
    let store = store();
    let project = seed_project(&store, "keep", 1).await;
    let id = project.id.unwrap();
    let router = project_router(store);

    let (status, _) = send(
        &router,
        "DELETE",
        &format!("/api/projects/{}", id),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Gone from existing reads, present in trashed reads.
    let (status, _) = send(&router, "GET", &format!("/api/projects/{}", id), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, trashed) = send(
        &router,
        "GET",
        &format!("/api/projects/trash/{}", id),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body_of(&trashed)["title"], json!("keep"));
    assert!(!body_of(&trashed)["deleted_at"].is_null());

    let (status, _) = send(
        &router,
        "PATCH",
        &format!("/api/projects/{}/restore", id),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, restored) = send(&router, "GET", &format!("/api/projects/{}", id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    let restored = body_of(&restored);
    assert_eq!(restored["title"], json!("keep"));
    assert!(restored["deleted_at"].is_null());
}

#[tokio::test]
async fn trashed_and_existing_lists_partition_records() {
    let store = store();
    let berzan = seed_project(&store, "Berzan", 1).await;
    seed_project(&store, "Paul", 1).await;
    let router = project_router(store);

    let (status, _) = send(
        &router,
        "DELETE",
        &format!("/api/projects/{}", berzan.id.unwrap()),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, existing) = send(&router, "GET", "/api/projects", None, None).await;
    let titles: Vec<_> = body_of(&existing)
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["title"].clone())
        .collect();
    assert_eq!(titles, vec![json!("Paul")]);

    let (_, trashed) = send(&router, "GET", "/api/projects/trash", None, None).await;
    let titles: Vec<_> = body_of(&trashed)
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["title"].clone())
        .collect();
    assert_eq!(titles, vec![json!("Berzan")]);
}

#[tokio::test]
async fn restore_without_trashed_record_is_already_handled() {
    let store = store();
    let project = seed_project(&store, "active", 1).await;
    let router = project_router(store);

    let (status, body) = send(
        &router,
        "PATCH",
        &format!("/api/projects/{}/restore", project.id.unwrap()),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::ALREADY_REPORTED);
    assert_eq!(body["error"]["code"], json!("already_handled"));
}

#[test]
#[should_panic(expected = "tombstone")]
fn soft_deletable_crud_without_tombstone_panics() {
    let _ = Crud::<Task>::soft_deletable("tasks");
}

#[test]
#[should_panic(expected = "tombstone")]
fn trashed_read_without_tombstone_panics() {
    use trellis::{ReadAll, ReadTarget};
    let _ = ReadAll::<Task>::new().target(ReadTarget::Trashed);
}
