//! Basic-credential boundary: username/secret pairs from the standard
//! `Authorization: Basic` header, verified against the stored hash.

use super::{authorization_value, BasicAuthenticatable, RequireAuth, SecretVerifier};
use crate::endpoint::Endpoint;
use crate::error::ApiError;
use crate::query::Query;
use crate::request::RequestContext;
use crate::routing::{Middleware, RouteAccumulator};
use crate::store::FilterOp;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;

/// Group whose content only registers behind basic-credential verification.
pub struct BasicAuthGroup<U: BasicAuthenticatable> {
    verifier: Arc<dyn SecretVerifier>,
    content: Vec<Box<dyn Endpoint>>,
    _principal: PhantomData<fn() -> U>,
}

impl<U: BasicAuthenticatable> BasicAuthGroup<U> {
    pub fn new(verifier: impl SecretVerifier) -> Self {
        BasicAuthGroup {
            verifier: Arc::new(verifier),
            content: Vec::new(),
            _principal: PhantomData,
        }
    }

    pub fn mount(mut self, node: impl Endpoint) -> Self {
        self.content.push(Box::new(node));
        self
    }
}

impl<U: BasicAuthenticatable> Endpoint for BasicAuthGroup<U> {
    fn register(self: Box<Self>, routes: &mut RouteAccumulator) {
        routes.push_middleware(Arc::new(BasicVerifier::<U> {
            verifier: self.verifier,
            _principal: PhantomData,
        }));
        routes.push_middleware(Arc::new(RequireAuth::<U>::new()));
        for child in self.content {
            child.register(routes);
        }
        routes.pop_middleware(2);
    }
}

struct BasicVerifier<U: BasicAuthenticatable> {
    verifier: Arc<dyn SecretVerifier>,
    _principal: PhantomData<fn() -> U>,
}

fn invalid() -> ApiError {
    ApiError::Unauthorized("invalid credentials".into())
}

#[async_trait]
impl<U: BasicAuthenticatable> Middleware for BasicVerifier<U> {
    async fn handle(&self, ctx: &mut RequestContext) -> Result<(), ApiError> {
        // Absent header: leave unauthenticated; the gate rejects it.
        let Some(encoded) = authorization_value(ctx, "Basic")? else {
            return Ok(());
        };
        let decoded = STANDARD.decode(encoded).map_err(|_| invalid())?;
        let decoded = String::from_utf8(decoded).map_err(|_| invalid())?;
        let (username, secret) = decoded.split_once(':').ok_or_else(invalid)?;

        let user = Query::<U>::new()
            .filter(U::USERNAME_FIELD, FilterOp::Eq, Value::String(username.into()))
            .first(ctx.store())
            .await?
            .ok_or_else(invalid)?
            .entity;
        if !self.verifier.verify(secret, user.secret_hash()) {
            return Err(invalid());
        }
        tracing::debug!(principal = U::NAME, "basic credential accepted");
        ctx.auth.login(user);
        Ok(())
    }
}
