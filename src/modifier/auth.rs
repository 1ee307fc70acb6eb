//! Ownership-authorization modifiers. Each check runs per request against
//! every candidate record; only a fully-passed chain delegates to the inner
//! handler. A missing owner or intermediate record is NotFound; an identity
//! mismatch is Unauthorized.

use crate::endpoint::RestEndpoint;
use crate::entity::Entity;
use crate::error::ApiError;
use crate::query::Query;
use crate::relation::BelongsTo;
use crate::request::RequestContext;
use crate::response::Reply;
use crate::routing::{Operation, PathSegment};
use crate::store::{id_value, FilterOp, RawFilter, RawQuery, Store};
use async_trait::async_trait;
use serde_json::Value;

/// Fetch one raw record of `T` by an erased id value.
async fn fetch_by_id<T: Entity>(store: &Store, id: &Value) -> Result<Option<Value>, ApiError> {
    let raw = RawQuery {
        filters: vec![RawFilter {
            field: T::ID_FIELD.to_string(),
            op: FilterOp::Eq,
            value: id.clone(),
        }],
    };
    Ok(store.backend().select(T::NAME, &raw).await?.into_iter().next())
}

fn principal_id<O: Entity>(ctx: &RequestContext) -> Result<Value, ApiError> {
    let principal = ctx.auth.require::<O>()?;
    let id = principal
        .id()
        .ok_or_else(|| ApiError::Unauthorized("principal has no identity".into()))?;
    id_value(&id)
}

fn field_of<'a>(record: &'a Value, name: &str) -> &'a Value {
    record.get(name).unwrap_or(&Value::Null)
}

/// Requires the authenticated `O` to own every candidate `E` directly
/// through a foreign-key relation.
pub struct OwnedBy<E: Entity, O: Entity> {
    inner: Box<dyn RestEndpoint<Entity = E>>,
    relation: BelongsTo<E, O>,
}

impl<E: Entity, O: Entity> OwnedBy<E, O> {
    pub fn new(inner: impl RestEndpoint<Entity = E>, relation: BelongsTo<E, O>) -> Self {
        OwnedBy {
            inner: Box::new(inner),
            relation,
        }
    }

    /// Resolve the payload-declared owner and compare against the
    /// authenticated principal. Used for create (nothing persisted yet) and
    /// for the new owner on update.
    async fn check_payload_owner(
        &self,
        pid: &Value,
        ctx: &RequestContext,
        required: bool,
    ) -> Result<(), ApiError> {
        let declared = ctx
            .body()
            .ok()
            .map(|b| field_of(b, self.relation.fk_field).clone())
            .unwrap_or(Value::Null);
        if declared.is_null() {
            if required {
                return Err(ApiError::BadRequest(format!(
                    "missing field '{}'",
                    self.relation.fk_field
                )));
            }
            return Ok(());
        }
        let owner = fetch_by_id::<O>(ctx.store(), &declared)
            .await?
            .ok_or_else(|| ApiError::NotFound(O::NAME.to_string()))?;
        if field_of(&owner, O::ID_FIELD) != pid {
            return Err(ApiError::Unauthorized("not the owner".into()));
        }
        Ok(())
    }

    /// Eager-load the owner for every candidate and require identity
    /// equality for all of them.
    async fn check_candidates(
        &self,
        query: &Query<E>,
        pid: &Value,
        ctx: &RequestContext,
    ) -> Result<(), ApiError> {
        let check = query.clone().with(self.relation.eager());
        for row in check.all(ctx.store()).await? {
            let owner = row
                .related
                .get(self.relation.name)
                .cloned()
                .unwrap_or(Value::Null);
            if owner.is_null() {
                return Err(ApiError::NotFound(O::NAME.to_string()));
            }
            if field_of(&owner, O::ID_FIELD) != pid {
                return Err(ApiError::Unauthorized("not the owner".into()));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<E: Entity, O: Entity> RestEndpoint for OwnedBy<E, O> {
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
        let pid = principal_id::<O>(ctx)?;
        match self.inner.operation() {
            // Nothing is persisted yet; the owning id comes off the payload.
            Operation::Create => self.check_payload_owner(&pid, ctx, true).await?,
            Operation::Update => {
                self.check_candidates(&query, &pid, ctx).await?;
                self.check_payload_owner(&pid, ctx, false).await?;
            }
            _ => self.check_candidates(&query, &pid, ctx).await?,
        }
        self.inner.handle(query, ctx).await
    }
}

/// Ownership through one intermediate: `E -> I -> O`.
pub struct OwnedThrough<E: Entity, I: Entity, O: Entity> {
    inner: Box<dyn RestEndpoint<Entity = E>>,
    relation: BelongsTo<E, I>,
    owner: BelongsTo<I, O>,
}

impl<E: Entity, I: Entity, O: Entity> OwnedThrough<E, I, O> {
    pub fn new(
        inner: impl RestEndpoint<Entity = E>,
        relation: BelongsTo<E, I>,
        owner: BelongsTo<I, O>,
    ) -> Self {
        OwnedThrough {
            inner: Box::new(inner),
            relation,
            owner,
        }
    }

    /// Resolve payload intermediate -> owner and compare with the principal.
    async fn check_payload_chain(
        &self,
        pid: &Value,
        ctx: &RequestContext,
        required: bool,
    ) -> Result<(), ApiError> {
        let declared = ctx
            .body()
            .ok()
            .map(|b| field_of(b, self.relation.fk_field).clone())
            .unwrap_or(Value::Null);
        if declared.is_null() {
            if required {
                return Err(ApiError::BadRequest(format!(
                    "missing field '{}'",
                    self.relation.fk_field
                )));
            }
            return Ok(());
        }
        let intermediate = fetch_by_id::<I>(ctx.store(), &declared)
            .await?
            .ok_or_else(|| ApiError::NotFound(I::NAME.to_string()))?;
        let owner_id = field_of(&intermediate, self.owner.fk_field).clone();
        if owner_id.is_null() {
            return Err(ApiError::NotFound(O::NAME.to_string()));
        }
        let owner = fetch_by_id::<O>(ctx.store(), &owner_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(O::NAME.to_string()))?;
        if field_of(&owner, O::ID_FIELD) != pid {
            return Err(ApiError::Unauthorized("not the owner".into()));
        }
        Ok(())
    }

    async fn check_candidates(
        &self,
        query: &Query<E>,
        pid: &Value,
        ctx: &RequestContext,
    ) -> Result<(), ApiError> {
        let check = query
            .clone()
            .with(self.relation.eager_with(self.owner.eager()));
        for row in check.all(ctx.store()).await? {
            let intermediate = row
                .related
                .get(self.relation.name)
                .cloned()
                .unwrap_or(Value::Null);
            if intermediate.is_null() {
                return Err(ApiError::NotFound(I::NAME.to_string()));
            }
            let owner = field_of(&intermediate, self.owner.name);
            if owner.is_null() {
                return Err(ApiError::NotFound(O::NAME.to_string()));
            }
            if field_of(owner, O::ID_FIELD) != pid {
                return Err(ApiError::Unauthorized("not the owner".into()));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<E: Entity, I: Entity, O: Entity> RestEndpoint for OwnedThrough<E, I, O> {
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
        let pid = principal_id::<O>(ctx)?;
        match self.inner.operation() {
            // The to-be-created record has no persisted relation yet, so the
            // intermediate is re-fetched from the payload-declared id.
            Operation::Create => self.check_payload_chain(&pid, ctx, true).await?,
            Operation::Update => {
                self.check_candidates(&query, &pid, ctx).await?;
                self.check_payload_chain(&pid, ctx, false).await?;
            }
            _ => self.check_candidates(&query, &pid, ctx).await?,
        }
        self.inner.handle(query, ctx).await
    }
}

/// The entity-is-the-principal case: every candidate record must be the
/// authenticated principal itself.
pub struct OwnSelf<E: Entity> {
    inner: Box<dyn RestEndpoint<Entity = E>>,
}

impl<E: Entity> OwnSelf<E> {
    pub fn new(inner: impl RestEndpoint<Entity = E>) -> Self {
        OwnSelf {
            inner: Box::new(inner),
        }
    }
}

#[async_trait]
impl<E: Entity> RestEndpoint for OwnSelf<E> {
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
        let pid = principal_id::<E>(ctx)?;
        for row in query.clone().all(ctx.store()).await? {
            let candidate = row
                .entity
                .id()
                .map(|id| id_value(&id))
                .transpose()?
                .unwrap_or(Value::Null);
            if candidate != pid {
                return Err(ApiError::Unauthorized("not the owner".into()));
            }
        }
        self.inner.handle(query, ctx).await
    }
}

crate::endpoint::impl_endpoint_via_rest!(OwnSelf<E: Entity>);
crate::endpoint::impl_endpoint_via_rest!(OwnedBy<E: Entity, O: Entity>);
crate::endpoint::impl_endpoint_via_rest!(OwnedThrough<E: Entity, I: Entity, O: Entity>);
