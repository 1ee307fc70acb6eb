//! Typed relation descriptors and their erased eager-load form.
//!
//! A relation is declared once per domain pair as a const and handed to
//! query nodes and modifiers; no field reflection is involved — the foreign
//! key is named explicitly.

use crate::entity::Entity;
use std::marker::PhantomData;

/// Which side of the relation holds the foreign key.
#[derive(Debug, Clone)]
pub enum LoadDirection {
    /// The base record stores the related record's id in `fk_field`.
    Parent { fk_field: &'static str },
    /// Related records store the base record's id in `fk_field`.
    Children { fk_field: &'static str },
}

/// Erased pre-fetch instruction attached to a query descriptor. Resolved in
/// a batch per request, after the base rows are selected; `nested` loads are
/// applied to the fetched related rows in turn.
#[derive(Debug, Clone)]
pub struct EagerLoad {
    /// Key under which related data embeds into the result.
    pub name: &'static str,
    pub collection: &'static str,
    pub direction: LoadDirection,
    /// Id field of the related collection.
    pub id_field: &'static str,
    pub nested: Vec<EagerLoad>,
}

/// `E` references one `O` through a foreign-key field on `E`.
pub struct BelongsTo<E: Entity, O: Entity> {
    pub name: &'static str,
    pub fk_field: &'static str,
    _marker: PhantomData<fn() -> (E, O)>,
}

// Manual impls: derives would put bounds on E and O.
impl<E: Entity, O: Entity> Clone for BelongsTo<E, O> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<E: Entity, O: Entity> Copy for BelongsTo<E, O> {}

impl<E: Entity, O: Entity> BelongsTo<E, O> {
    pub const fn new(name: &'static str, fk_field: &'static str) -> Self {
        BelongsTo {
            name,
            fk_field,
            _marker: PhantomData,
        }
    }

    pub fn eager(&self) -> EagerLoad {
        EagerLoad {
            name: self.name,
            collection: O::NAME,
            direction: LoadDirection::Parent {
                fk_field: self.fk_field,
            },
            id_field: O::ID_FIELD,
            nested: Vec::new(),
        }
    }

    /// Eager load with a further load applied to the fetched `O` rows
    /// (entity -> intermediate -> owner chains).
    pub fn eager_with(&self, nested: EagerLoad) -> EagerLoad {
        let mut load = self.eager();
        load.nested.push(nested);
        load
    }
}

/// Many `C` records reference one `E` through a foreign-key field on `C`.
pub struct HasMany<E: Entity, C: Entity> {
    pub name: &'static str,
    pub fk_field: &'static str,
    _marker: PhantomData<fn() -> (E, C)>,
}

impl<E: Entity, C: Entity> Clone for HasMany<E, C> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<E: Entity, C: Entity> Copy for HasMany<E, C> {}

impl<E: Entity, C: Entity> HasMany<E, C> {
    pub const fn new(name: &'static str, fk_field: &'static str) -> Self {
        HasMany {
            name,
            fk_field,
            _marker: PhantomData,
        }
    }

    pub fn eager(&self) -> EagerLoad {
        EagerLoad {
            name: self.name,
            collection: C::NAME,
            direction: LoadDirection::Children {
                fk_field: self.fk_field,
            },
            id_field: C::ID_FIELD,
            nested: Vec::new(),
        }
    }
}
