//! Decorator nodes. Every modifier wraps exactly one inner node behind a
//! boxed `RestEndpoint` (keeping modifier chains flat in the type system),
//! preserves the inner operation kind and subpath, and intercepts either the
//! query step or the handler step.

mod auth;
mod dto;
mod filter;
mod load;
mod shape;

pub use auth::{OwnSelf, OwnedBy, OwnedThrough};
pub use dto::{CreateVia, PatchWith, UpdateVia, Validator};
pub use filter::Filtered;
pub use load::{Children, With};
pub use shape::Shaped;

use crate::dto::Dto;
use crate::endpoint::RestEndpoint;
use crate::entity::Entity;
use crate::error::ApiError;
use crate::relation::{BelongsTo, EagerLoad, HasMany};
use serde::Serialize;
use serde_json::Value;

/// Builder sugar for wrapping nodes in modifiers.
pub trait RestEndpointExt: RestEndpoint + Sized {
    /// Append a declarative equality filter to the query.
    fn filtered(self, field: &'static str, value: Value) -> Filtered<Self::Entity> {
        Filtered::new(self, field, value)
    }

    /// Append an eager load to the query.
    fn loading(self, load: EagerLoad) -> With<Self::Entity> {
        With::new(self, load)
    }

    /// Reply with the eager-loaded child collection instead of the matched
    /// records.
    fn children_of<C: Entity>(self, relation: HasMany<Self::Entity, C>) -> Children<Self::Entity> {
        Children::new(self, relation.eager())
    }

    /// Require the authenticated `O` principal to own every candidate
    /// record through `relation`.
    fn owned_by<O: Entity>(self, relation: BelongsTo<Self::Entity, O>) -> OwnedBy<Self::Entity, O> {
        OwnedBy::new(self, relation)
    }

    /// Ownership through one intermediate: entity -> intermediate -> owner.
    fn owned_through<I: Entity, O: Entity>(
        self,
        relation: BelongsTo<Self::Entity, I>,
        owner: BelongsTo<I, O>,
    ) -> OwnedThrough<Self::Entity, I, O> {
        OwnedThrough::new(self, relation, owner)
    }

    /// Require every candidate record to be the authenticated principal
    /// itself.
    fn own_self(self) -> OwnSelf<Self::Entity> {
        OwnSelf::new(self)
    }

    /// Re-shape the reply through a constructor for a different external
    /// representation.
    fn shaped<R: Serialize + Send + Sync + 'static>(
        self,
        map: fn(Self::Entity) -> R,
    ) -> Shaped<Self::Entity, R> {
        Shaped::new(self, map)
    }

    /// Mediate creation through a DTO's binding descriptors.
    fn created_via<D: Dto<Entity = Self::Entity>>(self) -> CreateVia<D> {
        CreateVia::new(self)
    }

    /// Mediate update through a DTO's patch semantics.
    fn updated_via<D: Dto<Entity = Self::Entity>>(self) -> UpdateVia<D> {
        UpdateVia::new(self)
    }

    /// Mediate update through a free-form patch closure.
    fn patched_with<F>(self, patch: F) -> PatchWith<Self::Entity>
    where
        F: Fn(&mut Self::Entity, &Value) -> Result<(), ApiError> + Send + Sync + 'static,
    {
        PatchWith::new(self, patch)
    }
}

impl<N: RestEndpoint> RestEndpointExt for N {}
