//! Response-shape modifier: re-maps the inner reply through a constructor
//! for a different external representation, preserving collection-ness.

use crate::endpoint::{Endpoint, RestEndpoint};
use crate::entity::Entity;
use crate::error::ApiError;
use crate::query::Query;
use crate::request::RequestContext;
use crate::response::Reply;
use crate::routing::{Operation, PathSegment, RouteAccumulator};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

pub struct Shaped<E: Entity, R: Serialize + Send + Sync + 'static> {
    inner: Box<dyn RestEndpoint<Entity = E>>,
    map: fn(E) -> R,
}

impl<E: Entity, R: Serialize + Send + Sync + 'static> Shaped<E, R> {
    pub fn new(inner: impl RestEndpoint<Entity = E>, map: fn(E) -> R) -> Self {
        Shaped {
            inner: Box::new(inner),
            map,
        }
    }

    fn reshape(&self, v: Value) -> Result<Value, ApiError> {
        let entity: E = serde_json::from_value(v)
            .map_err(|e| ApiError::Store(format!("reshape {}: {}", E::NAME, e)))?;
        serde_json::to_value((self.map)(entity))
            .map_err(|e| ApiError::Store(format!("reshape {}: {}", E::NAME, e)))
    }
}

#[async_trait]
impl<E: Entity, R: Serialize + Send + Sync + 'static> RestEndpoint for Shaped<E, R> {
    type Entity = E;

    fn operation(&self) -> Operation {
        self.inner.operation()
    }

    fn subpath(&self) -> Vec<PathSegment> {
        self.inner.subpath()
    }

    fn query(&self, ctx: &RequestContext) -> Result<Query<E>, ApiError> {
        self.inner.query(ctx)
    }

    async fn handle(&self, query: Query<E>, ctx: &RequestContext) -> Result<Reply, ApiError> {
        let reply = self.inner.handle(query, ctx).await?;
        let body = match reply.body {
            Some(Value::Array(items)) => Some(Value::Array(
                items
                    .into_iter()
                    .map(|v| self.reshape(v))
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            Some(v) => Some(self.reshape(v)?),
            None => None,
        };
        Ok(Reply {
            status: reply.status,
            body,
        })
    }
}

impl<E: Entity, R: Serialize + Send + Sync + 'static> Endpoint for Shaped<E, R> {
    fn register(self: Box<Self>, routes: &mut RouteAccumulator) {
        crate::endpoint::register_rest(self, routes);
    }
}
