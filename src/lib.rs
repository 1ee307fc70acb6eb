//! Trellis: a composable endpoint tree for REST APIs.
//!
//! An API is a tree of nodes — CRUD leaves, groups, authorization and guard
//! boundaries, and modifiers that wrap a node to alter its query or handler.
//! Registration walks the tree once, accumulating path segments and
//! middleware, and materializes an axum router; request flow runs the
//! accumulated middleware chain, builds the leaf's query descriptor, and
//! executes it against the entity store.

pub mod auth;
pub mod dto;
pub mod endpoint;
pub mod entity;
pub mod error;
pub mod guard;
pub mod modifier;
pub mod query;
pub mod relation;
pub mod request;
pub mod response;
pub mod routing;
pub mod store;

pub use auth::{
    BasicAuthGroup, BasicAuthenticatable, BearerAuthGroup, JwtAuthGroup, SecretVerifier,
    TokenAuthenticatable, TokenClaims, TokenGenerator, UuidTokenGenerator,
};
pub use dto::{Bind, BindChildren, BindEnum, BindParent, Binding, Dto};
pub use endpoint::{
    Create, Crud, Custom, Delete, Endpoint, Group, ReadAll, ReadOne, ReadTarget, Restore,
    RestEndpoint, Update,
};
pub use entity::Entity;
pub use error::ApiError;
pub use guard::{Guard, GuardGroup};
pub use modifier::RestEndpointExt;
pub use query::Query;
pub use relation::{BelongsTo, EagerLoad, HasMany};
pub use request::RequestContext;
pub use response::Reply;
pub use routing::{Operation, RouteAccumulator};
pub use store::{Backend, MemoryBackend, Store};

/// Register a tree and materialize the axum router in one step.
pub fn build_router(root: impl Endpoint, store: Store) -> axum::Router {
    let mut routes = RouteAccumulator::new();
    Box::new(root).register(&mut routes);
    routes.into_router(store)
}
