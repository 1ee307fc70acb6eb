//! Declarative value-comparison modifier. Pure query augmentation; always
//! delegates.

use crate::endpoint::{impl_endpoint_via_rest, RestEndpoint};
use crate::entity::Entity;
use crate::error::ApiError;
use crate::query::Query;
use crate::request::RequestContext;
use crate::response::Reply;
use crate::routing::{Operation, PathSegment};
use crate::store::FilterOp;
use async_trait::async_trait;
use serde_json::Value;

pub struct Filtered<E: Entity> {
    inner: Box<dyn RestEndpoint<Entity = E>>,
    field: &'static str,
    value: Value,
}

impl<E: Entity> Filtered<E> {
    pub fn new(
        inner: impl RestEndpoint<Entity = E>,
        field: &'static str,
        value: Value,
    ) -> Self {
        Filtered {
            inner: Box::new(inner),
            field,
            value,
        }
    }
}

#[async_trait]
impl<E: Entity> RestEndpoint for Filtered<E> {
    type Entity = E;

    fn operation(&self) -> Operation {
        self.inner.operation()
    }

    fn subpath(&self) -> Vec<PathSegment> {
        self.inner.subpath()
    }

    fn query(&self, ctx: &RequestContext) -> Result<Query<E>, ApiError> {
        Ok(self
            .inner
            .query(ctx)?
            .filter(self.field, FilterOp::Eq, self.value.clone()))
    }

    async fn handle(&self, query: Query<E>, ctx: &RequestContext) -> Result<Reply, ApiError> {
        self.inner.handle(query, ctx).await
    }
}

impl_endpoint_via_rest!(Filtered<E: Entity>);
