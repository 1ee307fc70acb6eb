//! Shared fixtures: a small users/projects/tasks domain over the in-memory
//! backend.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::str::FromStr;
use trellis::auth::{BasicAuthenticatable, TokenAuthenticatable};
use trellis::dto::{Bind, BindChildren, BindEnum, BindParent, Dto};
use trellis::entity::Entity;
use trellis::relation::{BelongsTo, HasMany};
use trellis::store::{MemoryBackend, Store};
use trellis::bindings;

pub fn store() -> Store {
    Store::new(MemoryBackend::new())
}

#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Debug)]
pub struct User {
    pub id: Option<i64>,
    pub name: String,
    pub secret_hash: String,
}

impl Entity for User {
    type Id = i64;
    const NAME: &'static str = "users";

    fn id(&self) -> Option<i64> {
        self.id
    }
    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }
}

impl BasicAuthenticatable for User {
    const USERNAME_FIELD: &'static str = "name";

    fn secret_hash(&self) -> &str {
        &self.secret_hash
    }
}

#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Debug)]
pub struct ApiToken {
    pub id: Option<i64>,
    pub value: String,
    pub user_id: i64,
}

impl Entity for ApiToken {
    type Id = i64;
    const NAME: &'static str = "api_tokens";

    fn id(&self) -> Option<i64> {
        self.id
    }
    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }
}

impl TokenAuthenticatable for ApiToken {
    type Principal = User;
    const VALUE_FIELD: &'static str = "value";

    fn principal_id(&self) -> i64 {
        self.user_id
    }
}

#[derive(Clone, Copy, Default, Serialize, Deserialize, PartialEq, Debug)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Private,
    Public,
}

impl FromStr for Visibility {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(Visibility::Private),
            "public" => Ok(Visibility::Public),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Debug)]
pub struct Project {
    pub id: Option<i64>,
    pub title: String,
    pub visibility: Visibility,
    pub user_id: i64,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Entity for Project {
    type Id = i64;
    const NAME: &'static str = "projects";
    const TOMBSTONE_FIELD: Option<&'static str> = Some("deleted_at");

    fn id(&self) -> Option<i64> {
        self.id
    }
    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }
    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }
    fn set_deleted_at(&mut self, at: Option<DateTime<Utc>>) {
        self.deleted_at = at;
    }
}

#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Debug)]
pub struct Task {
    pub id: Option<i64>,
    pub label: String,
    pub project_id: i64,
}

impl Entity for Task {
    type Id = i64;
    const NAME: &'static str = "tasks";

    fn id(&self) -> Option<i64> {
        self.id
    }
    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }
}

pub const PROJECT_OWNER: BelongsTo<Project, User> = BelongsTo::new("owner", "user_id");
pub const PROJECT_TASKS: HasMany<Project, Task> = HasMany::new("tasks", "project_id");
pub const TASK_PROJECT: BelongsTo<Task, Project> = BelongsTo::new("project", "project_id");

pub struct TaskDto {
    pub label: Bind<Task, String>,
}

impl Default for TaskDto {
    fn default() -> Self {
        TaskDto {
            label: Bind::required("label", |t, v| t.label = v),
        }
    }
}

impl Dto for TaskDto {
    type Entity = Task;
    bindings!(Task { label });
}

pub struct ProjectDto {
    pub title: Bind<Project, String>,
    pub visibility: BindEnum<Project, Visibility>,
    pub owner: BindParent<Project, User>,
    pub tasks: BindChildren<Project, TaskDto>,
}

impl Default for ProjectDto {
    fn default() -> Self {
        ProjectDto {
            title: Bind::required("title", |p: &mut Project, v| p.title = v)
                .transformed(|v: String| v.trim().to_string()),
            visibility: BindEnum::optional("visibility", |p, v| p.visibility = v),
            owner: BindParent::required("user_id", |p, v| p.user_id = v),
            tasks: BindChildren::new("tasks", |t: &mut Task, owner| t.project_id = owner),
        }
    }
}

impl Dto for ProjectDto {
    type Entity = Project;
    bindings!(Project {
        title,
        visibility,
        owner,
        tasks
    });
}

pub async fn seed_user(store: &Store, name: &str, secret_hash: &str) -> User {
    store
        .create(User {
            id: None,
            name: name.into(),
            secret_hash: secret_hash.into(),
        })
        .await
        .unwrap()
}

pub async fn seed_project(store: &Store, title: &str, user_id: i64) -> Project {
    store
        .create(Project {
            id: None,
            title: title.into(),
            visibility: Visibility::Private,
            user_id,
            deleted_at: None,
        })
        .await
        .unwrap()
}

pub async fn seed_task(store: &Store, label: &str, project_id: i64) -> Task {
    store
        .create(Task {
            id: None,
            label: label.into(),
            project_id,
        })
        .await
        .unwrap()
}

/// Plaintext comparison stands in for the external hash primitive.
pub fn plain_verifier() -> impl trellis::auth::SecretVerifier {
    |candidate: &str, stored: &str| candidate == stored
}

pub fn basic_header(user: &str, secret: &str) -> String {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    format!("Basic {}", STANDARD.encode(format!("{}:{}", user, secret)))
}

pub fn body_of(value: &serde_json::Value) -> serde_json::Value {
    value.get("data").cloned().unwrap_or(json!(null))
}

/// One in-memory HTTP round-trip against a built router.
pub async fn send(
    router: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
    auth: Option<&str>,
) -> (axum::http::StatusCode, serde_json::Value) {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header("authorization", auth);
    }
    let request = match body {
        Some(v) => builder
            .header("content-type", "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        json!(null)
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}
