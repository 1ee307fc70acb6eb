//! Authorization boundaries and ownership modifiers end to end.

mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::json;
use trellis::{
    build_router, BasicAuthGroup, BearerAuthGroup, Create, Crud, Group, JwtAuthGroup, ReadOne,
    RestEndpointExt, TokenClaims, TokenGenerator, Update, UuidTokenGenerator,
};

#[tokio::test]
async fn basic_boundary_gates_and_accepts() {
    let store = store();
    seed_user(&store, "alice", "s3cret").await;
    seed_task(&store, "one", 1).await;
    let router = build_router(
        Group::new("api")
            .mount(BasicAuthGroup::<User>::new(plain_verifier()).mount(Crud::<Task>::new("tasks"))),
        store,
    );

    let (status, body) = send(&router, "GET", "/api/tasks", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], json!("unauthorized"));

    let (status, _) = send(
        &router,
        "GET",
        "/api/tasks",
        None,
        Some(&basic_header("alice", "wrong")),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &router,
        "GET",
        "/api/tasks",
        None,
        Some(&basic_header("alice", "s3cret")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["count"], json!(1));
}

#[tokio::test]
async fn owned_by_isolates_records_between_principals() {
    let store = store();
    let alice = seed_user(&store, "alice", "pw").await;
    let bob = seed_user(&store, "bob", "pw").await;
    let mine = seed_project(&store, "mine", alice.id.unwrap()).await;
    let theirs = seed_project(&store, "theirs", bob.id.unwrap()).await;
    let router = build_router(
        Group::new("projects").mount(
            BasicAuthGroup::<User>::new(plain_verifier())
                .mount(ReadOne::<Project>::new().owned_by(PROJECT_OWNER)),
        ),
        store,
    );
    let as_alice = basic_header("alice", "pw");

    let (status, body) = send(
        &router,
        "GET",
        &format!("/projects/{}", mine.id.unwrap()),
        None,
        Some(&as_alice),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body_of(&body)["title"], json!("mine"));

    let (status, body) = send(
        &router,
        "GET",
        &format!("/projects/{}", theirs.id.unwrap()),
        None,
        Some(&as_alice),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], json!("unauthorized"));
}

#[tokio::test]
async fn owned_by_create_checks_the_declared_owner() {
    let store = store();
    let alice = seed_user(&store, "alice", "pw").await;
    let bob = seed_user(&store, "bob", "pw").await;
    let router = build_router(
        Group::new("projects").mount(
            BasicAuthGroup::<User>::new(plain_verifier())
                .mount(Create::<Project>::new().owned_by(PROJECT_OWNER)),
        ),
        store,
    );
    let as_alice = basic_header("alice", "pw");

    let (status, _) = send(
        &router,
        "POST",
        "/projects",
        Some(json!({
            "id": null, "title": "ok", "visibility": "private",
            "user_id": alice.id, "deleted_at": null
        })),
        Some(&as_alice),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // Declaring someone else as owner is rejected before anything persists.
    let (status, _) = send(
        &router,
        "POST",
        "/projects",
        Some(json!({
            "id": null, "title": "sneaky", "visibility": "private",
            "user_id": bob.id, "deleted_at": null
        })),
        Some(&as_alice),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &router,
        "POST",
        "/projects",
        Some(json!({"id": null, "title": "orphan", "visibility": "private"})),
        Some(&as_alice),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn owned_by_update_rejects_reassigning_to_another_principal() {
    let store = store();
    let alice = seed_user(&store, "alice", "pw").await;
    let bob = seed_user(&store, "bob", "pw").await;
    let mine = seed_project(&store, "mine", alice.id.unwrap()).await;
    let router = build_router(
        Group::new("projects").mount(
            BasicAuthGroup::<User>::new(plain_verifier())
                .mount(Update::<Project>::new().owned_by(PROJECT_OWNER)),
        ),
        store,
    );
    let as_alice = basic_header("alice", "pw");

    // The stored owner passes, but the payload declares a new one.
    let (status, _) = send(
        &router,
        "PATCH",
        &format!("/projects/{}", mine.id.unwrap()),
        Some(json!({
            "id": null, "title": "stolen", "visibility": "private",
            "user_id": bob.id, "deleted_at": null
        })),
        Some(&as_alice),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, updated) = send(
        &router,
        "PATCH",
        &format!("/projects/{}", mine.id.unwrap()),
        Some(json!({
            "id": null, "title": "renamed", "visibility": "private",
            "user_id": alice.id, "deleted_at": null
        })),
        Some(&as_alice),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body_of(&updated)["title"], json!("renamed"));
}

#[tokio::test]
async fn owned_through_walks_the_intermediate() {
    let store = store();
    let alice = seed_user(&store, "alice", "pw").await;
    let bob = seed_user(&store, "bob", "pw").await;
    let mine = seed_project(&store, "mine", alice.id.unwrap()).await;
    let theirs = seed_project(&store, "theirs", bob.id.unwrap()).await;
    let my_task = seed_task(&store, "a", mine.id.unwrap()).await;
    let their_task = seed_task(&store, "b", theirs.id.unwrap()).await;
    let orphan = seed_task(&store, "c", 999).await;
    let router = build_router(
        Group::new("tasks").mount(
            BasicAuthGroup::<User>::new(plain_verifier())
                .mount(ReadOne::<Task>::new().owned_through(TASK_PROJECT, PROJECT_OWNER)),
        ),
        store,
    );
    let as_alice = basic_header("alice", "pw");

    let (status, _) = send(
        &router,
        "GET",
        &format!("/tasks/{}", my_task.id.unwrap()),
        None,
        Some(&as_alice),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &router,
        "GET",
        &format!("/tasks/{}", their_task.id.unwrap()),
        None,
        Some(&as_alice),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Dangling intermediate is a missing record, not a permission failure.
    let (status, body) = send(
        &router,
        "GET",
        &format!("/tasks/{}", orphan.id.unwrap()),
        None,
        Some(&as_alice),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], json!("not_found"));
}

#[tokio::test]
async fn owned_through_create_resolves_the_payload_intermediate() {
    let store = store();
    let alice = seed_user(&store, "alice", "pw").await;
    let bob = seed_user(&store, "bob", "pw").await;
    let mine = seed_project(&store, "mine", alice.id.unwrap()).await;
    let theirs = seed_project(&store, "theirs", bob.id.unwrap()).await;
    let router = build_router(
        Group::new("tasks").mount(
            BasicAuthGroup::<User>::new(plain_verifier())
                .mount(Create::<Task>::new().owned_through(TASK_PROJECT, PROJECT_OWNER)),
        ),
        store,
    );
    let as_alice = basic_header("alice", "pw");

    let (status, _) = send(
        &router,
        "POST",
        "/tasks",
        Some(json!({"id": null, "label": "ok", "project_id": mine.id})),
        Some(&as_alice),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // Nothing is persisted yet, so the chain resolves from the payload id.
    let (status, _) = send(
        &router,
        "POST",
        "/tasks",
        Some(json!({"id": null, "label": "sneaky", "project_id": theirs.id})),
        Some(&as_alice),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &router,
        "POST",
        "/tasks",
        Some(json!({"id": null, "label": "dangling", "project_id": 999})),
        Some(&as_alice),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], json!("not_found"));

    let (status, _) = send(
        &router,
        "POST",
        "/tasks",
        Some(json!({"id": null, "label": "orphan"})),
        Some(&as_alice),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn own_self_only_exposes_the_principal_record() {
    let store = store();
    let alice = seed_user(&store, "alice", "pw").await;
    let bob = seed_user(&store, "bob", "pw").await;
    let router = build_router(
        Group::new("users").mount(
            BasicAuthGroup::<User>::new(plain_verifier())
                .mount(ReadOne::<User>::new().own_self()),
        ),
        store,
    );
    let as_alice = basic_header("alice", "pw");

    let (status, body) = send(
        &router,
        "GET",
        &format!("/users/{}", alice.id.unwrap()),
        None,
        Some(&as_alice),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body_of(&body)["name"], json!("alice"));

    let (status, _) = send(
        &router,
        "GET",
        &format!("/users/{}", bob.id.unwrap()),
        None,
        Some(&as_alice),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn bearer_tokens_resolve_their_principal() {
    let store = store();
    let alice = seed_user(&store, "alice", "pw").await;
    let minted = UuidTokenGenerator.generate();
    store
        .create(ApiToken {
            id: None,
            value: minted.clone(),
            user_id: alice.id.unwrap(),
        })
        .await
        .unwrap();
    seed_task(&store, "one", 1).await;
    let router = build_router(
        Group::new("api")
            .mount(BearerAuthGroup::<ApiToken>::new().mount(Crud::<Task>::new("tasks"))),
        store,
    );

    let (status, _) = send(
        &router,
        "GET",
        "/api/tasks",
        None,
        Some(&format!("Bearer {}", minted)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&router, "GET", "/api/tasks", None, Some("Bearer nope")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&router, "GET", "/api/tasks", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn signed_tokens_carry_the_principal_id() {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let store = store();
    let alice = seed_user(&store, "alice", "pw").await;
    seed_task(&store, "one", 1).await;
    let router = build_router(
        Group::new("api")
            .mount(JwtAuthGroup::<User>::new(b"top-secret").mount(Crud::<Task>::new("tasks"))),
        store,
    );

    let claims = TokenClaims {
        sub: alice.id.unwrap().to_string(),
        exp: 4_102_444_800, // 2100-01-01
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"top-secret"),
    )
    .unwrap();

    let (status, _) = send(
        &router,
        "GET",
        "/api/tasks",
        None,
        Some(&format!("Bearer {}", token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let forged = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"other-key"),
    )
    .unwrap();
    let (status, _) = send(
        &router,
        "GET",
        "/api/tasks",
        None,
        Some(&format!("Bearer {}", forged)),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
