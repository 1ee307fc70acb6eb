//! Authorization boundary groups and the credential contracts they consume.
//!
//! Each group wraps its content with two pieces of middleware: a credential
//! verifier that logs the matched principal into the request's auth context,
//! and a gate that rejects the request when no principal was logged in.
//! Hashing and token generation stay external behind narrow traits.

mod basic;
mod bearer;
mod jwt;

pub use basic::BasicAuthGroup;
pub use bearer::BearerAuthGroup;
pub use jwt::{JwtAuthGroup, TokenClaims};

use crate::entity::Entity;
use crate::error::ApiError;
use crate::request::RequestContext;
use crate::routing::Middleware;
use async_trait::async_trait;
use axum::http::header::AUTHORIZATION;
use std::marker::PhantomData;

/// Principal looked up by a unique username field and verified against a
/// stored secret hash.
pub trait BasicAuthenticatable: Entity {
    /// JSON field used as the unique lookup key.
    const USERNAME_FIELD: &'static str;

    fn secret_hash(&self) -> &str;
}

/// An opaque token record referencing the principal it authenticates.
pub trait TokenAuthenticatable: Entity {
    type Principal: Entity;

    /// JSON field holding the token value.
    const VALUE_FIELD: &'static str;

    fn principal_id(&self) -> <Self::Principal as Entity>::Id;
}

/// One-way secret verification. Hashing itself is an external collaborator;
/// the core only ever asks "does this candidate match this stored hash".
pub trait SecretVerifier: Send + Sync + 'static {
    fn verify(&self, candidate: &str, stored_hash: &str) -> bool;
}

impl<F> SecretVerifier for F
where
    F: Fn(&str, &str) -> bool + Send + Sync + 'static,
{
    fn verify(&self, candidate: &str, stored_hash: &str) -> bool {
        self(candidate, stored_hash)
    }
}

/// Random opaque-token source.
pub trait TokenGenerator: Send + Sync + 'static {
    fn generate(&self) -> String;
}

/// Stock generator: hyphenless v4 UUIDs.
pub struct UuidTokenGenerator;

impl TokenGenerator for UuidTokenGenerator {
    fn generate(&self) -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }
}

/// Extract the value of an `Authorization: <scheme> <value>` header, if the
/// header is present and uses the expected scheme.
pub(crate) fn authorization_value<'a>(
    ctx: &'a RequestContext,
    scheme: &str,
) -> Result<Option<&'a str>, ApiError> {
    let Some(header) = ctx.headers().get(AUTHORIZATION) else {
        return Ok(None);
    };
    let header = header
        .to_str()
        .map_err(|_| ApiError::Unauthorized("malformed authorization header".into()))?;
    match header.split_once(' ') {
        Some((s, value)) if s.eq_ignore_ascii_case(scheme) => Ok(Some(value.trim())),
        _ => Ok(None),
    }
}

/// The "require authenticated" gate: a `P` principal must have been logged
/// in by an earlier middleware.
pub(crate) struct RequireAuth<P: Entity> {
    _principal: PhantomData<fn() -> P>,
}

impl<P: Entity> RequireAuth<P> {
    pub(crate) fn new() -> Self {
        RequireAuth {
            _principal: PhantomData,
        }
    }
}

#[async_trait]
impl<P: Entity> Middleware for RequireAuth<P> {
    async fn handle(&self, ctx: &mut RequestContext) -> Result<(), ApiError> {
        ctx.auth.require::<P>().map(|_| ())
    }
}
