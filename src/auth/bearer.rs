//! Opaque bearer-token boundary: the presented token is looked up as a
//! stored record which references its principal.

use super::{authorization_value, RequireAuth, TokenAuthenticatable};
use crate::endpoint::Endpoint;
use crate::entity::Entity;
use crate::error::ApiError;
use crate::query::Query;
use crate::request::RequestContext;
use crate::routing::{Middleware, RouteAccumulator};
use crate::store::FilterOp;
use async_trait::async_trait;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;

pub struct BearerAuthGroup<T: TokenAuthenticatable> {
    content: Vec<Box<dyn Endpoint>>,
    _token: PhantomData<fn() -> T>,
}

impl<T: TokenAuthenticatable> BearerAuthGroup<T> {
    pub fn new() -> Self {
        BearerAuthGroup {
            content: Vec::new(),
            _token: PhantomData,
        }
    }

    pub fn mount(mut self, node: impl Endpoint) -> Self {
        self.content.push(Box::new(node));
        self
    }
}

impl<T: TokenAuthenticatable> Default for BearerAuthGroup<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TokenAuthenticatable> Endpoint for BearerAuthGroup<T> {
    fn register(self: Box<Self>, routes: &mut RouteAccumulator) {
        routes.push_middleware(Arc::new(BearerVerifier::<T> {
            _token: PhantomData,
        }));
        routes.push_middleware(Arc::new(RequireAuth::<T::Principal>::new()));
        for child in self.content {
            child.register(routes);
        }
        routes.pop_middleware(2);
    }
}

struct BearerVerifier<T: TokenAuthenticatable> {
    _token: PhantomData<fn() -> T>,
}

fn invalid() -> ApiError {
    ApiError::Unauthorized("invalid token".into())
}

#[async_trait]
impl<T: TokenAuthenticatable> Middleware for BearerVerifier<T> {
    async fn handle(&self, ctx: &mut RequestContext) -> Result<(), ApiError> {
        let Some(value) = authorization_value(ctx, "Bearer")? else {
            return Ok(());
        };
        let token = Query::<T>::new()
            .filter(T::VALUE_FIELD, FilterOp::Eq, Value::String(value.into()))
            .first(ctx.store())
            .await?
            .ok_or_else(invalid)?
            .entity;
        let principal = Query::<T::Principal>::new()
            .by_id(&token.principal_id())?
            .first(ctx.store())
            .await?
            .ok_or_else(invalid)?
            .entity;
        tracing::debug!(principal = T::Principal::NAME, "bearer token accepted");
        ctx.auth.login(principal);
        Ok(())
    }
}
