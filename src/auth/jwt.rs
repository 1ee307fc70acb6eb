//! Signed-token boundary: HS256 JWTs whose `sub` claim carries the
//! principal id.

use super::{authorization_value, RequireAuth};
use crate::endpoint::Endpoint;
use crate::entity::Entity;
use crate::error::ApiError;
use crate::query::Query;
use crate::request::RequestContext;
use crate::routing::{Middleware, RouteAccumulator};
use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::sync::Arc;

/// Claims this boundary issues and accepts.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Principal id, stringified.
    pub sub: String,
    /// Expiry, seconds since the epoch.
    pub exp: u64,
}

pub struct JwtAuthGroup<U: Entity> {
    key: Arc<DecodingKey>,
    content: Vec<Box<dyn Endpoint>>,
    _principal: PhantomData<fn() -> U>,
}

impl<U: Entity> JwtAuthGroup<U> {
    pub fn new(secret: &[u8]) -> Self {
        JwtAuthGroup {
            key: Arc::new(DecodingKey::from_secret(secret)),
            content: Vec::new(),
            _principal: PhantomData,
        }
    }

    pub fn mount(mut self, node: impl Endpoint) -> Self {
        self.content.push(Box::new(node));
        self
    }
}

impl<U: Entity> Endpoint for JwtAuthGroup<U> {
    fn register(self: Box<Self>, routes: &mut RouteAccumulator) {
        routes.push_middleware(Arc::new(JwtVerifier::<U> {
            key: self.key,
            _principal: PhantomData,
        }));
        routes.push_middleware(Arc::new(RequireAuth::<U>::new()));
        for child in self.content {
            child.register(routes);
        }
        routes.pop_middleware(2);
    }
}

struct JwtVerifier<U: Entity> {
    key: Arc<DecodingKey>,
    _principal: PhantomData<fn() -> U>,
}

fn invalid() -> ApiError {
    ApiError::Unauthorized("invalid token".into())
}

#[async_trait]
impl<U: Entity> Middleware for JwtVerifier<U> {
    async fn handle(&self, ctx: &mut RequestContext) -> Result<(), ApiError> {
        let Some(token) = authorization_value(ctx, "Bearer")? else {
            return Ok(());
        };
        let claims = decode::<TokenClaims>(token, &self.key, &Validation::new(Algorithm::HS256))
            .map_err(|_| invalid())?
            .claims;
        let id = claims.sub.parse::<U::Id>().map_err(|_| invalid())?;
        let principal = Query::<U>::new()
            .by_id(&id)?
            .first(ctx.store())
            .await?
            .ok_or_else(invalid)?
            .entity;
        tracing::debug!(principal = U::NAME, "signed token accepted");
        ctx.auth.login(principal);
        Ok(())
    }
}
