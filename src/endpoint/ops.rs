//! Leaf operation nodes: Create, ReadOne, ReadAll, Update, Delete, Restore,
//! and the explicit-method Custom node.

use super::{impl_endpoint_via_rest, RestEndpoint};
use crate::entity::Entity;
use crate::error::ApiError;
use crate::query::Query;
use crate::request::RequestContext;
use crate::response::Reply;
use crate::routing::{parameter_name, HandlerFuture, Operation, PathSegment};
use crate::store::to_record;
use async_trait::async_trait;
use axum::routing::MethodFilter;
use chrono::Utc;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

/// Which records a read node targets with respect to the soft-delete
/// lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadTarget {
    /// Exclude tombstoned records (default).
    Existing,
    /// Include tombstoned records.
    All,
    /// Tombstoned records only.
    Trashed,
}

fn assert_tombstone<E: Entity>(context: &str) {
    assert!(
        E::TOMBSTONE_FIELD.is_some(),
        "precondition violated: {} requires a tombstone field on '{}'",
        context,
        E::NAME
    );
}

fn apply_target<E: Entity>(query: Query<E>, target: ReadTarget) -> Query<E> {
    match target {
        ReadTarget::Existing => query,
        ReadTarget::All => query.with_deleted(),
        ReadTarget::Trashed => query.only_trashed(),
    }
}

/// `POST` — decode the entity payload, persist, return the stored value.
pub struct Create<E: Entity> {
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Create<E> {
    pub fn new() -> Self {
        Create {
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> Default for Create<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E: Entity> RestEndpoint for Create<E> {
    type Entity = E;

    fn operation(&self) -> Operation {
        Operation::Create
    }

    async fn handle(&self, _query: Query<E>, ctx: &RequestContext) -> Result<Reply, ApiError> {
        let entity: E = ctx.decode()?;
        let stored = ctx.store().create(entity).await?;
        Ok(Reply::created(to_record(&stored)?))
    }
}

/// `GET :id` — fetch one record by the path-parameter id.
pub struct ReadOne<E: Entity> {
    parameter: String,
    target: ReadTarget,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> ReadOne<E> {
    pub fn new() -> Self {
        Self::with_parameter(parameter_name::<E>())
    }

    pub(crate) fn with_parameter(parameter: String) -> Self {
        ReadOne {
            parameter,
            target: ReadTarget::Existing,
            _entity: PhantomData,
        }
    }

    pub fn target(mut self, target: ReadTarget) -> Self {
        if target == ReadTarget::Trashed {
            assert_tombstone::<E>("a trashed read");
        }
        self.target = target;
        self
    }
}

impl<E: Entity> Default for ReadOne<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E: Entity> RestEndpoint for ReadOne<E> {
    type Entity = E;

    fn operation(&self) -> Operation {
        Operation::Read
    }

    fn subpath(&self) -> Vec<PathSegment> {
        vec![PathSegment::Parameter(self.parameter.clone())]
    }

    fn query(&self, ctx: &RequestContext) -> Result<Query<E>, ApiError> {
        let id = ctx.parameter::<E>(&self.parameter)?;
        Ok(apply_target(Query::new().by_id(&id)?, self.target))
    }

    async fn handle(&self, query: Query<E>, ctx: &RequestContext) -> Result<Reply, ApiError> {
        let loaded = query
            .first(ctx.store())
            .await?
            .ok_or_else(|| ApiError::NotFound(E::NAME.to_string()))?;
        Ok(Reply::ok(loaded.into_value()?))
    }
}

/// `GET` — all records, in insertion order.
pub struct ReadAll<E: Entity> {
    target: ReadTarget,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> ReadAll<E> {
    pub fn new() -> Self {
        ReadAll {
            target: ReadTarget::Existing,
            _entity: PhantomData,
        }
    }

    pub fn target(mut self, target: ReadTarget) -> Self {
        if target == ReadTarget::Trashed {
            assert_tombstone::<E>("a trashed read");
        }
        self.target = target;
        self
    }
}

impl<E: Entity> Default for ReadAll<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E: Entity> RestEndpoint for ReadAll<E> {
    type Entity = E;

    fn operation(&self) -> Operation {
        Operation::Read
    }

    fn query(&self, _ctx: &RequestContext) -> Result<Query<E>, ApiError> {
        Ok(apply_target(Query::new(), self.target))
    }

    async fn handle(&self, query: Query<E>, ctx: &RequestContext) -> Result<Reply, ApiError> {
        let rows = query.all(ctx.store()).await?;
        let values = rows
            .into_iter()
            .map(|l| l.into_value())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Reply::ok(serde_json::Value::Array(values)))
    }
}

/// `PATCH :id` — decode a replacement payload, overwrite the stored record's
/// fields, persist.
pub struct Update<E: Entity> {
    parameter: String,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Update<E> {
    pub fn new() -> Self {
        Self::with_parameter(parameter_name::<E>())
    }

    pub(crate) fn with_parameter(parameter: String) -> Self {
        Update {
            parameter,
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> Default for Update<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E: Entity> RestEndpoint for Update<E> {
    type Entity = E;

    fn operation(&self) -> Operation {
        Operation::Update
    }

    fn subpath(&self) -> Vec<PathSegment> {
        vec![PathSegment::Parameter(self.parameter.clone())]
    }

    fn query(&self, ctx: &RequestContext) -> Result<Query<E>, ApiError> {
        let id = ctx.parameter::<E>(&self.parameter)?;
        Query::new().by_id(&id)
    }

    async fn handle(&self, query: Query<E>, ctx: &RequestContext) -> Result<Reply, ApiError> {
        let existing = query
            .first(ctx.store())
            .await?
            .ok_or_else(|| ApiError::NotFound(E::NAME.to_string()))?;
        let mut replacement: E = ctx.decode()?;
        let id = existing
            .entity
            .id()
            .ok_or_else(|| ApiError::Store(format!("stored {} without id", E::NAME)))?;
        replacement.set_id(id);
        let stored = ctx.store().save(&replacement).await?;
        Ok(Reply::ok(to_record(&stored)?))
    }
}

/// `DELETE :id` — remove the record, or set its tombstone in soft mode.
pub struct Delete<E: Entity> {
    parameter: String,
    soft: bool,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Delete<E> {
    pub fn new() -> Self {
        Self::with_parameter(parameter_name::<E>(), false)
    }

    /// Soft-delete variant: sets the tombstone timestamp instead of removing
    /// the record.
    pub fn soft() -> Self {
        Self::with_parameter(parameter_name::<E>(), true)
    }

    pub(crate) fn with_parameter(parameter: String, soft: bool) -> Self {
        if soft {
            assert_tombstone::<E>("soft delete");
        }
        Delete {
            parameter,
            soft,
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> Default for Delete<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E: Entity> RestEndpoint for Delete<E> {
    type Entity = E;

    fn operation(&self) -> Operation {
        Operation::Delete
    }

    fn subpath(&self) -> Vec<PathSegment> {
        vec![PathSegment::Parameter(self.parameter.clone())]
    }

    fn query(&self, ctx: &RequestContext) -> Result<Query<E>, ApiError> {
        let id = ctx.parameter::<E>(&self.parameter)?;
        // Hard delete also applies to already-tombstoned records.
        let query = Query::new().by_id(&id)?;
        Ok(if self.soft { query } else { query.with_deleted() })
    }

    async fn handle(&self, query: Query<E>, ctx: &RequestContext) -> Result<Reply, ApiError> {
        let existing = query
            .first(ctx.store())
            .await?
            .ok_or_else(|| ApiError::NotFound(E::NAME.to_string()))?;
        if self.soft {
            let mut entity = existing.entity;
            entity.set_deleted_at(Some(Utc::now()));
            ctx.store().save(&entity).await?;
        } else {
            let id = existing
                .entity
                .id()
                .ok_or_else(|| ApiError::Store(format!("stored {} without id", E::NAME)))?;
            ctx.store().remove::<E>(&id).await?;
        }
        Ok(Reply::no_content())
    }
}

/// `PATCH :id/restore` — clear the tombstone of a trashed record. A missing
/// trashed record is the distinct already-handled outcome, not a plain
/// not-found.
pub struct Restore<E: Entity> {
    parameter: String,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Restore<E> {
    pub fn new() -> Self {
        Self::with_parameter(parameter_name::<E>())
    }

    pub(crate) fn with_parameter(parameter: String) -> Self {
        assert_tombstone::<E>("restore");
        Restore {
            parameter,
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> Default for Restore<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E: Entity> RestEndpoint for Restore<E> {
    type Entity = E;

    fn operation(&self) -> Operation {
        Operation::Custom(MethodFilter::PATCH)
    }

    fn subpath(&self) -> Vec<PathSegment> {
        vec![
            PathSegment::Parameter(self.parameter.clone()),
            PathSegment::literal("restore"),
        ]
    }

    fn query(&self, ctx: &RequestContext) -> Result<Query<E>, ApiError> {
        let id = ctx.parameter::<E>(&self.parameter)?;
        Ok(Query::new().by_id(&id)?.only_trashed())
    }

    async fn handle(&self, query: Query<E>, ctx: &RequestContext) -> Result<Reply, ApiError> {
        let existing = query
            .first(ctx.store())
            .await?
            .ok_or(ApiError::AlreadyHandled)?;
        let mut entity = existing.entity;
        entity.set_deleted_at(None);
        ctx.store().save(&entity).await?;
        Ok(Reply::no_content())
    }
}

type CustomHandler<E> = Arc<dyn Fn(Query<E>, RequestContext) -> HandlerFuture + Send + Sync>;

/// Leaf with an explicit method and a free-form handler.
pub struct Custom<E: Entity> {
    method: MethodFilter,
    subpath: Vec<PathSegment>,
    run: CustomHandler<E>,
}

impl<E: Entity> Custom<E> {
    pub fn new<F, Fut>(method: MethodFilter, path: &str, run: F) -> Self
    where
        F: Fn(Query<E>, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply, ApiError>> + Send + 'static,
    {
        Custom {
            method,
            subpath: crate::routing::literal_segments(path),
            run: Arc::new(move |q, ctx| Box::pin(run(q, ctx))),
        }
    }
}

#[async_trait]
impl<E: Entity> RestEndpoint for Custom<E> {
    type Entity = E;

    fn operation(&self) -> Operation {
        Operation::Custom(self.method)
    }

    fn subpath(&self) -> Vec<PathSegment> {
        self.subpath.clone()
    }

    async fn handle(&self, query: Query<E>, ctx: &RequestContext) -> Result<Reply, ApiError> {
        (self.run)(query, ctx.clone()).await
    }
}

impl_endpoint_via_rest!(Create<E: Entity>);
impl_endpoint_via_rest!(ReadOne<E: Entity>);
impl_endpoint_via_rest!(ReadAll<E: Entity>);
impl_endpoint_via_rest!(Update<E: Entity>);
impl_endpoint_via_rest!(Delete<E: Entity>);
impl_endpoint_via_rest!(Restore<E: Entity>);
impl_endpoint_via_rest!(Custom<E: Entity>);
