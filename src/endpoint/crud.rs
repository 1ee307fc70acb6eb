//! Standard CRUD bundle under one path prefix.

use super::{Create, Delete, Endpoint, ReadAll, ReadOne, ReadTarget, Restore, Update};
use crate::entity::Entity;
use crate::routing::{literal_segments, parameter_name, PathSegment, RouteAccumulator};
use std::marker::PhantomData;

/// Create, ReadAll, ReadOne, Update, and Delete under `path`, sharing one
/// generated id parameter. The soft-deletable variant swaps in a tombstone
/// delete and adds restore plus trashed reads under a `trash` segment.
pub struct Crud<E: Entity> {
    prefix: Vec<PathSegment>,
    soft_delete: bool,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Crud<E> {
    pub fn new(path: &str) -> Self {
        Crud {
            prefix: literal_segments(path),
            soft_delete: false,
            _entity: PhantomData,
        }
    }

    /// # Panics
    /// If `E` declares no tombstone field.
    pub fn soft_deletable(path: &str) -> Self {
        assert!(
            E::TOMBSTONE_FIELD.is_some(),
            "precondition violated: soft-deletable CRUD requires a tombstone field on '{}'",
            E::NAME
        );
        Crud {
            prefix: literal_segments(path),
            soft_delete: true,
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> Endpoint for Crud<E> {
    fn register(self: Box<Self>, routes: &mut RouteAccumulator) {
        let parameter = parameter_name::<E>();
        let n = routes.push_prefix(self.prefix);

        Box::new(Create::<E>::new()).register(routes);
        Box::new(ReadAll::<E>::new()).register(routes);
        Box::new(ReadOne::<E>::with_parameter(parameter.clone())).register(routes);
        Box::new(Update::<E>::with_parameter(parameter.clone())).register(routes);
        Box::new(Delete::<E>::with_parameter(parameter.clone(), self.soft_delete))
            .register(routes);

        if self.soft_delete {
            Box::new(Restore::<E>::with_parameter(parameter)).register(routes);
            let t = routes.push_prefix(vec![PathSegment::literal("trash")]);
            Box::new(ReadAll::<E>::new().target(ReadTarget::Trashed)).register(routes);
            Box::new(ReadOne::<E>::new().target(ReadTarget::Trashed)).register(routes);
            routes.pop_prefix(t);
        }

        routes.pop_prefix(n);
    }
}
