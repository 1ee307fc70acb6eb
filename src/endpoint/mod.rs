//! The endpoint tree: leaf operations, composites, and the contracts they
//! share.
//!
//! An `Endpoint` knows only how to register itself; `RestEndpoint` is the
//! richer contract for query-backed leaves, split into a query-construction
//! step and a handler step so modifiers can intercept either.

mod crud;
mod group;
mod ops;

pub use crud::Crud;
pub use group::Group;
pub use ops::{Create, Custom, Delete, ReadAll, ReadOne, ReadTarget, Restore, Update};

use crate::entity::Entity;
use crate::error::ApiError;
use crate::query::Query;
use crate::request::RequestContext;
use crate::response::Reply;
use crate::routing::{Operation, PathSegment, RouteAccumulator, RouteHandler};
use async_trait::async_trait;
use std::sync::Arc;

/// A composable unit of the tree. Registration consumes the node — the tree
/// is built once, registered once, and immutable throughout.
pub trait Endpoint: Send + Sync + 'static {
    fn register(self: Box<Self>, routes: &mut RouteAccumulator);
}

/// An array of nodes is itself a node; the empty array registers nothing.
impl Endpoint for Vec<Box<dyn Endpoint>> {
    fn register(self: Box<Self>, routes: &mut RouteAccumulator) {
        for child in *self {
            child.register(routes);
        }
    }
}

/// A query-backed leaf. `query` builds the request-scoped descriptor (the
/// outermost node in a modifier chain builds it for the whole chain);
/// `handle` receives that descriptor and produces the reply.
#[async_trait]
pub trait RestEndpoint: Send + Sync + 'static {
    type Entity: Entity;

    fn operation(&self) -> Operation;

    /// Segments appended after the accumulated prefix (id parameters and
    /// trailing literals). Empty for collection-level nodes.
    fn subpath(&self) -> Vec<PathSegment> {
        Vec::new()
    }

    fn query(&self, _ctx: &RequestContext) -> Result<Query<Self::Entity>, ApiError> {
        Ok(Query::new())
    }

    async fn handle(
        &self,
        query: Query<Self::Entity>,
        ctx: &RequestContext,
    ) -> Result<Reply, ApiError>;
}

/// Register a rest node as a concrete route: build the query, then hand it
/// to the handler. Called from each leaf's `Endpoint` impl.
pub(crate) fn register_rest<N>(node: Box<N>, routes: &mut RouteAccumulator)
where
    N: RestEndpoint,
{
    let op = node.operation();
    let subpath = node.subpath();
    let node: Arc<N> = Arc::from(node);
    let handler: RouteHandler = Arc::new(move |ctx: RequestContext| {
        let node = node.clone();
        Box::pin(async move {
            let query = node.query(&ctx)?;
            node.handle(query, &ctx).await
        })
    });
    routes.add(op, subpath, handler);
}

/// Connects each concrete rest node to the `Endpoint` contract. A blanket
/// impl would collide with composite nodes, so leaves opt in explicitly.
macro_rules! impl_endpoint_via_rest {
    ($ty:ident < $($param:ident : $bound:path),+ >) => {
        impl<$($param: $bound),+> $crate::endpoint::Endpoint for $ty<$($param),+> {
            fn register(
                self: Box<Self>,
                routes: &mut $crate::routing::RouteAccumulator,
            ) {
                $crate::endpoint::register_rest(self, routes);
            }
        }
    };
}
pub(crate) use impl_endpoint_via_rest;
