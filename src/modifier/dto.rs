//! DTO-mediation modifiers for create and update, plus the free-form patch
//! variant. Nothing is persisted until validation and binding have both
//! succeeded; nested child relations attach only after the parent id exists.

use crate::dto::{attach_children, build_entity, decode_dto, decode_dto_partial, patch_entity, Dto};
use crate::endpoint::RestEndpoint;
use crate::entity::Entity;
use crate::error::ApiError;
use crate::query::Query;
use crate::request::RequestContext;
use crate::response::Reply;
use crate::routing::{Operation, PathSegment, RouteAccumulator};
use crate::store::{id_value, to_record};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

pub type Validator = Arc<dyn Fn(&Value) -> Result<(), ApiError> + Send + Sync>;

/// Decode a DTO instead of the raw entity, construct the entity from its
/// bindings, persist, then attach declared child collections.
pub struct CreateVia<D: Dto> {
    inner: Box<dyn RestEndpoint<Entity = D::Entity>>,
    validate: Option<Validator>,
}

impl<D: Dto> CreateVia<D> {
    pub fn new(inner: impl RestEndpoint<Entity = D::Entity>) -> Self {
        CreateVia {
            inner: Box::new(inner),
            validate: None,
        }
    }

    /// Run a validation step against the raw payload before any binding.
    pub fn validated<F>(mut self, validate: F) -> Self
    where
        F: Fn(&Value) -> Result<(), ApiError> + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(validate));
        self
    }
}

#[async_trait]
impl<D: Dto> RestEndpoint for CreateVia<D> {
    type Entity = D::Entity;

    fn operation(&self) -> Operation {
        self.inner.operation()
    }

    fn subpath(&self) -> Vec<PathSegment> {
        self.inner.subpath()
    }

    fn query(&self, ctx: &RequestContext) -> Result<Query<D::Entity>, ApiError> {
        self.inner.query(ctx)
    }

    async fn handle(
        &self,
        _query: Query<D::Entity>,
        ctx: &RequestContext,
    ) -> Result<Reply, ApiError> {
        let payload = ctx.body()?;
        if let Some(validate) = &self.validate {
            validate(payload)?;
        }
        let dto: D = decode_dto(payload)?;
        let entity = build_entity(&dto);
        let stored = ctx.store().create(entity).await?;
        let id = stored.id().ok_or_else(|| {
            ApiError::Store(format!("stored {} without id", D::Entity::NAME))
        })?;
        attach_children(&dto, &id_value(&id)?, ctx.store()).await?;
        Ok(Reply::created(to_record(&stored)?))
    }
}

/// Decode a DTO and apply its patch semantics to the record located by the
/// inner node's query.
pub struct UpdateVia<D: Dto> {
    inner: Box<dyn RestEndpoint<Entity = D::Entity>>,
}

impl<D: Dto> UpdateVia<D> {
    pub fn new(inner: impl RestEndpoint<Entity = D::Entity>) -> Self {
        UpdateVia {
            inner: Box::new(inner),
        }
    }
}

#[async_trait]
impl<D: Dto> RestEndpoint for UpdateVia<D> {
    type Entity = D::Entity;

    fn operation(&self) -> Operation {
        self.inner.operation()
    }

    fn subpath(&self) -> Vec<PathSegment> {
        self.inner.subpath()
    }

    fn query(&self, ctx: &RequestContext) -> Result<Query<D::Entity>, ApiError> {
        self.inner.query(ctx)
    }

    async fn handle(
        &self,
        query: Query<D::Entity>,
        ctx: &RequestContext,
    ) -> Result<Reply, ApiError> {
        let existing = query
            .first(ctx.store())
            .await?
            .ok_or_else(|| ApiError::NotFound(D::Entity::NAME.to_string()))?;
        let dto: D = decode_dto_partial(ctx.body()?)?;
        let mut entity = existing.entity;
        patch_entity(&dto, &mut entity);
        let stored = ctx.store().save(&entity).await?;
        Ok(Reply::ok(to_record(&stored)?))
    }
}

type PatchFn<E> = Arc<dyn Fn(&mut E, &Value) -> Result<(), ApiError> + Send + Sync>;

/// Update mediation through a free-form patch closure instead of a DTO.
pub struct PatchWith<E: Entity> {
    inner: Box<dyn RestEndpoint<Entity = E>>,
    patch: PatchFn<E>,
}

impl<E: Entity> PatchWith<E> {
    pub fn new<F>(inner: impl RestEndpoint<Entity = E>, patch: F) -> Self
    where
        F: Fn(&mut E, &Value) -> Result<(), ApiError> + Send + Sync + 'static,
    {
        PatchWith {
            inner: Box::new(inner),
            patch: Arc::new(patch),
        }
    }
}

#[async_trait]
impl<E: Entity> RestEndpoint for PatchWith<E> {
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
        let existing = query
            .first(ctx.store())
            .await?
            .ok_or_else(|| ApiError::NotFound(E::NAME.to_string()))?;
        let mut entity = existing.entity;
        (self.patch)(&mut entity, ctx.body()?)?;
        let stored = ctx.store().save(&entity).await?;
        Ok(Reply::ok(to_record(&stored)?))
    }
}

impl<D: Dto> crate::endpoint::Endpoint for CreateVia<D> {
    fn register(self: Box<Self>, routes: &mut RouteAccumulator) {
        crate::endpoint::register_rest(self, routes);
    }
}

impl<D: Dto> crate::endpoint::Endpoint for UpdateVia<D> {
    fn register(self: Box<Self>, routes: &mut RouteAccumulator) {
        crate::endpoint::register_rest(self, routes);
    }
}

crate::endpoint::impl_endpoint_via_rest!(PatchWith<E: Entity>);
