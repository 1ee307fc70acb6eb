//! Eager-load modifiers: `With` pre-fetches a relation alongside the
//! matched records; `Children` replies with the loaded collection itself.

use crate::endpoint::{impl_endpoint_via_rest, RestEndpoint};
use crate::entity::Entity;
use crate::error::ApiError;
use crate::query::Query;
use crate::relation::EagerLoad;
use crate::request::RequestContext;
use crate::response::Reply;
use crate::routing::{Operation, PathSegment};
use async_trait::async_trait;
use serde_json::Value;

/// Appends a relation pre-fetch; the inner handler sees records with the
/// relation embedded.
pub struct With<E: Entity> {
    inner: Box<dyn RestEndpoint<Entity = E>>,
    load: EagerLoad,
}

impl<E: Entity> With<E> {
    pub fn new(inner: impl RestEndpoint<Entity = E>, load: EagerLoad) -> Self {
        With {
            inner: Box::new(inner),
            load,
        }
    }
}

#[async_trait]
impl<E: Entity> RestEndpoint for With<E> {
    type Entity = E;

    fn operation(&self) -> Operation {
        self.inner.operation()
    }

    fn subpath(&self) -> Vec<PathSegment> {
        self.inner.subpath()
    }

    fn query(&self, ctx: &RequestContext) -> Result<Query<E>, ApiError> {
        Ok(self.inner.query(ctx)?.with(self.load.clone()))
    }

    async fn handle(&self, query: Query<E>, ctx: &RequestContext) -> Result<Reply, ApiError> {
        self.inner.handle(query, ctx).await
    }
}

/// Replies with the flattened eager-loaded collection instead of the matched
/// records; no match at all is NotFound.
pub struct Children<E: Entity> {
    inner: Box<dyn RestEndpoint<Entity = E>>,
    load: EagerLoad,
}

impl<E: Entity> Children<E> {
    pub fn new(inner: impl RestEndpoint<Entity = E>, load: EagerLoad) -> Self {
        Children {
            inner: Box::new(inner),
            load,
        }
    }
}

#[async_trait]
impl<E: Entity> RestEndpoint for Children<E> {
    type Entity = E;

    fn operation(&self) -> Operation {
        self.inner.operation()
    }

    fn subpath(&self) -> Vec<PathSegment> {
        self.inner.subpath()
    }

    fn query(&self, ctx: &RequestContext) -> Result<Query<E>, ApiError> {
        Ok(self.inner.query(ctx)?.with(self.load.clone()))
    }

    async fn handle(&self, query: Query<E>, ctx: &RequestContext) -> Result<Reply, ApiError> {
        let rows = query.all(ctx.store()).await?;
        if rows.is_empty() {
            return Err(ApiError::NotFound(E::NAME.to_string()));
        }
        let mut out = Vec::new();
        for row in rows {
            match row.related.get(self.load.name) {
                Some(Value::Array(items)) => out.extend(items.iter().cloned()),
                Some(Value::Null) | None => {}
                Some(v) => out.push(v.clone()),
            }
        }
        Ok(Reply::ok(Value::Array(out)))
    }
}

impl_endpoint_via_rest!(With<E: Entity>);
impl_endpoint_via_rest!(Children<E: Entity>);
