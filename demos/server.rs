//! Demo server: an articles API behind basic credentials, with soft delete,
//! a self-only user endpoint, and a header-guarded admin listing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use trellis::auth::BasicAuthenticatable;
use trellis::dto::{Bind, BindParent, Dto};
use trellis::relation::BelongsTo;
use trellis::{
    bindings, build_router, ApiError, BasicAuthGroup, Create, Crud, Entity, Group, Guard,
    GuardGroup, MemoryBackend, ReadAll, ReadOne, RestEndpointExt, Store,
};

#[derive(Clone, Default, Serialize, Deserialize)]
struct User {
    id: Option<i64>,
    name: String,
    secret_hash: String,
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

#[derive(Clone, Default, Serialize, Deserialize)]
struct Article {
    id: Option<i64>,
    title: String,
    body: String,
    user_id: i64,
    deleted_at: Option<DateTime<Utc>>,
}

impl Entity for Article {
    type Id = i64;
    const NAME: &'static str = "articles";
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

const ARTICLE_AUTHOR: BelongsTo<Article, User> = BelongsTo::new("author", "user_id");

struct ArticleDto {
    title: Bind<Article, String>,
    body: Bind<Article, String>,
    author: BindParent<Article, User>,
}

impl Default for ArticleDto {
    fn default() -> Self {
        ArticleDto {
            title: Bind::required("title", |a: &mut Article, v| a.title = v)
                .transformed(|v: String| v.trim().to_string()),
            body: Bind::optional("body", |a, v| a.body = v),
            author: BindParent::required("user_id", |a, v| a.user_id = v),
        }
    }
}

impl Dto for ArticleDto {
    type Entity = Article;
    bindings!(Article { title, body, author });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("trellis=debug".parse()?))
        .init();

    let store = Store::new(MemoryBackend::new());
    seed(&store).await?;

    // Plaintext comparison keeps the demo self-contained; deployments plug
    // their hash primitive in here.
    let verifier = |candidate: &str, stored: &str| candidate == stored;

    let tree = Group::new("api")
        .mount(
            BasicAuthGroup::<User>::new(verifier)
                .mount(Crud::<Article>::soft_deletable("articles"))
                // Authorization wraps outside the DTO mediation so it can
                // inspect the payload-declared author before binding runs.
                .mount(Group::new("drafts").mount(
                    Create::<Article>::new()
                        .created_via::<ArticleDto>()
                        .owned_by(ARTICLE_AUTHOR),
                ))
                .mount(Group::new("users").mount(ReadOne::<User>::new().own_self())),
        )
        .mount(
            GuardGroup::new(vec![Guard::new(|ctx| {
                ctx.headers().contains_key("x-admin-key")
            })
            .or_error(ApiError::Unauthorized("admin key required".into()))])
            .mount(Group::new("admin").mount(Group::new("users").mount(ReadAll::<User>::new()))),
        );

    let app = build_router(tree, store);

    let listener = TcpListener::bind("0.0.0.0:3000").await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn seed(store: &Store) -> Result<(), Box<dyn std::error::Error>> {
    let alice = store
        .create(User {
            id: None,
            name: "alice".into(),
            secret_hash: "wonderland".into(),
        })
        .await?;
    store
        .create(Article {
            id: None,
            title: "hello".into(),
            body: "first post".into(),
            user_id: alice.id.unwrap_or_default(),
            deleted_at: None,
        })
        .await?;
    Ok(())
}
