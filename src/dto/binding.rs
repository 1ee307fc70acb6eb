//! Binding descriptors: typed pairings of an external field name with an
//! entity setter. A descriptor holds its decoded value between the decode
//! step and the construction/patch step; nested-collection descriptors defer
//! persistence until the owning id exists.

use super::{build_entity, decode_dto, Dto};
use crate::entity::Entity;
use crate::error::ApiError;
use crate::store::{id_value, Store};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::str::FromStr;

/// How a descriptor applies to an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindMode {
    /// Building a fresh entity: a required-but-unpopulated descriptor is a
    /// caller bug and panics.
    Construct,
    /// Patching an existing entity: unpopulated descriptors are skipped.
    Patch,
}

/// Object-safe descriptor contract. Descriptors are generic over the target
/// entity, so applying one to the wrong entity type fails to compile.
#[async_trait]
pub trait Binding<E: Entity>: Send + Sync {
    fn field_name(&self) -> &'static str;

    fn required(&self) -> bool {
        false
    }

    /// Whether decode stored a value.
    fn populated(&self) -> bool;

    /// Pull this descriptor's field out of the payload, if present. Absent
    /// and null fields leave the descriptor unpopulated.
    fn decode_from(&mut self, payload: &Value) -> Result<(), ApiError>;

    fn apply_to(&self, entity: &mut E, mode: BindMode);

    /// Deferred relation attachment, run after the owning entity has been
    /// persisted. No-op for plain descriptors.
    async fn attach(&self, _owner_id: &Value, _store: &Store) -> Result<(), ApiError> {
        Ok(())
    }
}

fn present<'a>(payload: &'a Value, name: &str) -> Option<&'a Value> {
    payload.get(name).filter(|v| !v.is_null())
}

fn decode_field<T: DeserializeOwned>(value: &Value, name: &str) -> Result<T, ApiError> {
    serde_json::from_value(value.clone())
        .map_err(|e| ApiError::BadRequest(format!("field '{}': {}", name, e)))
}

fn panic_unpopulated(name: &str) -> ! {
    panic!(
        "precondition violated: required binding '{}' was never populated",
        name
    )
}

/// Scalar field descriptor with an optional value transform.
pub struct Bind<E: Entity, T> {
    name: &'static str,
    set: fn(&mut E, T),
    transform: Option<fn(T) -> T>,
    required: bool,
    value: Option<T>,
}

impl<E: Entity, T> Bind<E, T> {
    pub fn required(name: &'static str, set: fn(&mut E, T)) -> Self {
        Bind {
            name,
            set,
            transform: None,
            required: true,
            value: None,
        }
    }

    pub fn optional(name: &'static str, set: fn(&mut E, T)) -> Self {
        Bind {
            name,
            set,
            transform: None,
            required: false,
            value: None,
        }
    }

    pub fn transformed(mut self, f: fn(T) -> T) -> Self {
        self.transform = Some(f);
        self
    }

    /// Decoded value.
    ///
    /// # Panics
    /// If the descriptor was never populated.
    pub fn value(&self) -> &T {
        match &self.value {
            Some(v) => v,
            None => panic_unpopulated(self.name),
        }
    }
}

#[async_trait]
impl<E, T> Binding<E> for Bind<E, T>
where
    E: Entity,
    T: Clone + DeserializeOwned + Send + Sync + 'static,
{
    fn field_name(&self) -> &'static str {
        self.name
    }

    fn required(&self) -> bool {
        self.required
    }

    fn populated(&self) -> bool {
        self.value.is_some()
    }

    fn decode_from(&mut self, payload: &Value) -> Result<(), ApiError> {
        if let Some(raw) = present(payload, self.name) {
            let v: T = decode_field(raw, self.name)?;
            self.value = Some(match self.transform {
                Some(f) => f(v),
                None => v,
            });
        }
        Ok(())
    }

    fn apply_to(&self, entity: &mut E, mode: BindMode) {
        match (&self.value, mode) {
            (Some(v), _) => (self.set)(entity, v.clone()),
            (None, BindMode::Construct) if self.required => panic_unpopulated(self.name),
            (None, _) => {}
        }
    }
}

/// Parent-reference descriptor: decodes the referenced entity's id and sets
/// it as a foreign key.
pub struct BindParent<E: Entity, P: Entity> {
    name: &'static str,
    set: fn(&mut E, P::Id),
    required: bool,
    value: Option<P::Id>,
}

impl<E: Entity, P: Entity> BindParent<E, P> {
    pub fn required(name: &'static str, set: fn(&mut E, P::Id)) -> Self {
        BindParent {
            name,
            set,
            required: true,
            value: None,
        }
    }

    pub fn optional(name: &'static str, set: fn(&mut E, P::Id)) -> Self {
        BindParent {
            name,
            set,
            required: false,
            value: None,
        }
    }
}

#[async_trait]
impl<E: Entity, P: Entity> Binding<E> for BindParent<E, P> {
    fn field_name(&self) -> &'static str {
        self.name
    }

    fn required(&self) -> bool {
        self.required
    }

    fn populated(&self) -> bool {
        self.value.is_some()
    }

    fn decode_from(&mut self, payload: &Value) -> Result<(), ApiError> {
        if let Some(raw) = present(payload, self.name) {
            self.value = Some(decode_field(raw, self.name)?);
        }
        Ok(())
    }

    fn apply_to(&self, entity: &mut E, mode: BindMode) {
        match (&self.value, mode) {
            (Some(v), _) => (self.set)(entity, v.clone()),
            (None, BindMode::Construct) if self.required => panic_unpopulated(self.name),
            (None, _) => {}
        }
    }
}

/// Enum field descriptor: decodes a string payload field through `FromStr`.
pub struct BindEnum<E: Entity, T> {
    name: &'static str,
    set: fn(&mut E, T),
    required: bool,
    value: Option<T>,
}

impl<E: Entity, T> BindEnum<E, T> {
    pub fn required(name: &'static str, set: fn(&mut E, T)) -> Self {
        BindEnum {
            name,
            set,
            required: true,
            value: None,
        }
    }

    pub fn optional(name: &'static str, set: fn(&mut E, T)) -> Self {
        BindEnum {
            name,
            set,
            required: false,
            value: None,
        }
    }
}

#[async_trait]
impl<E, T> Binding<E> for BindEnum<E, T>
where
    E: Entity,
    T: Clone + FromStr + Send + Sync + 'static,
{
    fn field_name(&self) -> &'static str {
        self.name
    }

    fn required(&self) -> bool {
        self.required
    }

    fn populated(&self) -> bool {
        self.value.is_some()
    }

    fn decode_from(&mut self, payload: &Value) -> Result<(), ApiError> {
        if let Some(raw) = present(payload, self.name) {
            let s = raw.as_str().ok_or_else(|| {
                ApiError::BadRequest(format!("field '{}': expected a string", self.name))
            })?;
            let v = s.parse::<T>().map_err(|_| {
                ApiError::BadRequest(format!("field '{}': unknown variant '{}'", self.name, s))
            })?;
            self.value = Some(v);
        }
        Ok(())
    }

    fn apply_to(&self, entity: &mut E, mode: BindMode) {
        match (&self.value, mode) {
            (Some(v), _) => (self.set)(entity, v.clone()),
            (None, BindMode::Construct) if self.required => panic_unpopulated(self.name),
            (None, _) => {}
        }
    }
}

/// Nested-collection descriptor: decodes an array of child DTOs and persists
/// the children once the owner id exists. Children may declare their own
/// nested collections; attachment recurses.
pub struct BindChildren<E: Entity, D: Dto> {
    name: &'static str,
    set_owner: fn(&mut D::Entity, E::Id),
    items: Vec<D>,
    populated: bool,
}

impl<E: Entity, D: Dto> BindChildren<E, D> {
    pub fn new(name: &'static str, set_owner: fn(&mut D::Entity, E::Id)) -> Self {
        BindChildren {
            name,
            set_owner,
            items: Vec::new(),
            populated: false,
        }
    }
}

#[async_trait]
impl<E: Entity, D: Dto> Binding<E> for BindChildren<E, D> {
    fn field_name(&self) -> &'static str {
        self.name
    }

    fn populated(&self) -> bool {
        self.populated
    }

    fn decode_from(&mut self, payload: &Value) -> Result<(), ApiError> {
        if let Some(raw) = present(payload, self.name) {
            let items = raw.as_array().ok_or_else(|| {
                ApiError::BadRequest(format!("field '{}': expected an array", self.name))
            })?;
            self.items = items
                .iter()
                .map(|item| decode_dto::<D>(item))
                .collect::<Result<Vec<_>, _>>()?;
            self.populated = true;
        }
        Ok(())
    }

    fn apply_to(&self, _entity: &mut E, _mode: BindMode) {
        // Children never map onto the parent record itself.
    }

    async fn attach(&self, owner_id: &Value, store: &Store) -> Result<(), ApiError> {
        let owner: E::Id = serde_json::from_value(owner_id.clone())
            .map_err(|e| ApiError::Store(format!("owner id for '{}': {}", self.name, e)))?;
        for dto in &self.items {
            let mut child = build_entity(dto);
            (self.set_owner)(&mut child, owner.clone());
            let stored = store.create(child).await?;
            let child_id = stored.id().ok_or_else(|| {
                ApiError::Store(format!("stored {} without id", D::Entity::NAME))
            })?;
            super::attach_children(dto, &id_value(&child_id)?, store).await?;
        }
        Ok(())
    }
}
