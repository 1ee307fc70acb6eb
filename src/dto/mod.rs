//! Transfer objects and the field-binding protocol.
//!
//! A DTO is decode-only: its declared binding descriptors are the sole
//! source of truth for which external fields are accepted and how they map
//! onto the target entity. Enumeration is explicit (the `bindings!` macro
//! removes the boilerplate) — no runtime reflection.

mod binding;

pub use binding::{Bind, BindChildren, BindEnum, BindMode, BindParent, Binding};

use crate::entity::Entity;
use crate::error::ApiError;
use crate::store::Store;
use serde_json::Value;

/// A decode-only shape populating one entity type through declared bindings.
pub trait Dto: Default + Send + Sync + 'static {
    type Entity: Entity;

    /// Declared descriptors, in declaration order.
    fn bindings(&self) -> Vec<&dyn Binding<Self::Entity>>;
    fn bindings_mut(&mut self) -> Vec<&mut dyn Binding<Self::Entity>>;
}

/// Generates both binding enumerators from a field list. Use inside an
/// `impl Dto for ...` block:
///
/// ```ignore
/// impl Dto for CreateProject {
///     type Entity = Project;
///     trellis::bindings!(Project { title, owner, tasks });
/// }
/// ```
#[macro_export]
macro_rules! bindings {
    ($entity:ty { $($field:ident),+ $(,)? }) => {
        fn bindings(&self) -> Vec<&dyn $crate::dto::Binding<$entity>> {
            vec![$(&self.$field),+]
        }
        fn bindings_mut(&mut self) -> Vec<&mut dyn $crate::dto::Binding<$entity>> {
            vec![$(&mut self.$field),+]
        }
    };
}

fn require_object(payload: &Value) -> Result<(), ApiError> {
    if payload.is_object() {
        Ok(())
    } else {
        Err(ApiError::BadRequest("payload must be a JSON object".into()))
    }
}

/// Decode every declared descriptor from the payload. Strict: absent
/// required fields are rejected before anything is persisted.
pub fn decode_dto<D: Dto>(payload: &Value) -> Result<D, ApiError> {
    let dto = decode_dto_partial::<D>(payload)?;
    let missing: Vec<&str> = dto
        .bindings()
        .into_iter()
        .filter(|b| b.required() && !b.populated())
        .map(|b| b.field_name())
        .collect();
    if !missing.is_empty() {
        return Err(ApiError::BadRequest(format!(
            "missing required fields: {}",
            missing.join(", ")
        )));
    }
    Ok(dto)
}

/// Decode without the required-field check; absent fields stay unpopulated.
/// Used for patch payloads.
pub fn decode_dto_partial<D: Dto>(payload: &Value) -> Result<D, ApiError> {
    require_object(payload)?;
    let mut dto = D::default();
    for binding in dto.bindings_mut() {
        binding.decode_from(payload)?;
    }
    Ok(dto)
}

/// Construct a blank entity and apply every populated descriptor.
///
/// # Panics
/// If a required descriptor was never populated — callers must decode
/// through [`decode_dto`] first, so reaching that state is a caller bug.
pub fn build_entity<D: Dto>(dto: &D) -> D::Entity {
    let mut entity = D::Entity::default();
    for binding in dto.bindings() {
        binding.apply_to(&mut entity, BindMode::Construct);
    }
    entity
}

/// Apply populated descriptors onto an existing entity, leaving absent
/// fields untouched.
pub fn patch_entity<D: Dto>(dto: &D, entity: &mut D::Entity) {
    for binding in dto.bindings() {
        binding.apply_to(entity, BindMode::Patch);
    }
}

/// Run every descriptor's deferred relation attachment against the now-known
/// owner id. Called only after the parent entity has been persisted.
pub async fn attach_children<D: Dto>(
    dto: &D,
    owner_id: &Value,
    store: &Store,
) -> Result<(), ApiError> {
    for binding in dto.bindings() {
        binding.attach(owner_id, store).await?;
    }
    Ok(())
}
