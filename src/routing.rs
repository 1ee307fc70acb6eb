//! Route accumulation and the axum adapter.
//!
//! Registration walks the endpoint tree depth-first, extending a prefix and
//! middleware stack on the way down; each leaf snapshots both into a
//! `RouteEntry`. `into_router` then materializes the concrete axum routes:
//! at request time the accumulated middleware chain runs in order before the
//! leaf handler.

use crate::entity::Entity;
use crate::error::ApiError;
use crate::request::RequestContext;
use crate::response::Reply;
use crate::store::Store;
use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::Path;
use axum::http::HeaderMap;
use axum::routing::MethodFilter;
use axum::Router;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Literal(String),
    Parameter(String),
}

impl PathSegment {
    pub fn literal(s: &str) -> Self {
        PathSegment::Literal(s.to_string())
    }

    fn to_axum(&self) -> String {
        match self {
            PathSegment::Literal(s) => s.clone(),
            PathSegment::Parameter(name) => format!(":{}", name),
        }
    }
}

/// Split a literal path like `"api/users"` into segments.
pub fn literal_segments(path: &str) -> Vec<PathSegment> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(PathSegment::literal)
        .collect()
}

static PARAMETER_SEQ: AtomicU64 = AtomicU64::new(0);

/// Generate a route parameter name unique to this node, scoped to the entity
/// type so the same entity at two tree depths never produces colliding
/// parameter names.
pub fn parameter_name<E: Entity>() -> String {
    let n = PARAMETER_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{}_id_{}", E::NAME, n)
}

/// Operation kind of a leaf node. Determines the HTTP method at
/// registration; modifiers preserve their inner node's kind.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    Custom(MethodFilter),
}

impl Operation {
    fn method(self) -> MethodFilter {
        match self {
            Operation::Create => MethodFilter::POST,
            Operation::Read => MethodFilter::GET,
            Operation::Update => MethodFilter::PATCH,
            Operation::Delete => MethodFilter::DELETE,
            Operation::Custom(m) => m,
        }
    }
}

/// Pre-route check that may mutate the context (typically logging a
/// principal in) or short-circuit the request with an error.
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    async fn handle(&self, ctx: &mut RequestContext) -> Result<(), ApiError>;
}

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Reply, ApiError>> + Send>>;
pub type RouteHandler = Arc<dyn Fn(RequestContext) -> HandlerFuture + Send + Sync>;

pub struct RouteEntry {
    pub method: Operation,
    pub path: String,
    pub handler: RouteHandler,
    pub middleware: Vec<Arc<dyn Middleware>>,
}

/// Mutable state of one registration walk.
#[derive(Default)]
pub struct RouteAccumulator {
    prefix: Vec<PathSegment>,
    middleware: Vec<Arc<dyn Middleware>>,
    routes: Vec<RouteEntry>,
}

impl RouteAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_prefix(&mut self, segments: Vec<PathSegment>) -> usize {
        let n = segments.len();
        self.prefix.extend(segments);
        n
    }

    pub fn pop_prefix(&mut self, n: usize) {
        for _ in 0..n {
            self.prefix.pop();
        }
    }

    pub fn push_middleware(&mut self, mw: Arc<dyn Middleware>) {
        self.middleware.push(mw);
    }

    pub fn pop_middleware(&mut self, n: usize) {
        for _ in 0..n {
            self.middleware.pop();
        }
    }

    /// Attach a leaf handler at the current prefix plus `subpath`.
    pub fn add(&mut self, op: Operation, subpath: Vec<PathSegment>, handler: RouteHandler) {
        let mut segments = self.prefix.clone();
        segments.extend(subpath);
        let path = if segments.is_empty() {
            "/".to_string()
        } else {
            let joined: Vec<String> = segments.iter().map(|s| s.to_axum()).collect();
            format!("/{}", joined.join("/"))
        };
        tracing::debug!(?op, path = %path, middleware = self.middleware.len(), "route");
        self.routes.push(RouteEntry {
            method: op,
            path,
            handler,
            middleware: self.middleware.clone(),
        });
    }

    pub fn routes(&self) -> &[RouteEntry] {
        &self.routes
    }

    /// Materialize the accumulated routes into an axum router bound to a
    /// store handle.
    pub fn into_router(self, store: Store) -> Router {
        let mut router = Router::new();
        for entry in self.routes {
            let RouteEntry {
                method,
                path,
                handler,
                middleware,
            } = entry;
            let store = store.clone();
            let route = move |Path(params): Path<HashMap<String, String>>,
                              headers: HeaderMap,
                              body: Bytes| {
                let store = store.clone();
                let handler = handler.clone();
                let middleware = middleware.clone();
                async move {
                    let body = if body.is_empty() {
                        None
                    } else {
                        Some(serde_json::from_slice(&body).map_err(|e| {
                            ApiError::BadRequest(format!("malformed payload: {}", e))
                        })?)
                    };
                    let mut ctx = RequestContext::from_parts(store, params, headers, body);
                    for mw in &middleware {
                        mw.handle(&mut ctx).await?;
                    }
                    handler(ctx).await
                }
            };
            router = router.route(&path, axum::routing::on(method.method(), route));
        }
        router
    }
}
