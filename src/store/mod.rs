//! Entity store boundary: an object-safe backend contract plus the typed
//! handle the endpoint tree works through. Records cross the boundary as
//! JSON objects; the typed layer owns (de)serialization.

mod memory;

pub use memory::MemoryBackend;

use crate::entity::Entity;
use crate::error::ApiError;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("backend: {0}")]
    Backend(String),
    #[error("corrupt record in '{collection}': {reason}")]
    Corrupt { collection: String, reason: String },
}

/// Erased comparison operators a backend must support.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    Eq,
    Ne,
    In(Vec<Value>),
    IsNull,
    NotNull,
}

#[derive(Debug, Clone)]
pub struct RawFilter {
    pub field: String,
    pub op: FilterOp,
    /// Comparison operand; unused for `In`/`IsNull`/`NotNull`.
    pub value: Value,
}

/// Erased, backend-facing form of a query descriptor. Filters apply
/// conjunctively in declared order.
#[derive(Debug, Clone, Default)]
pub struct RawQuery {
    pub filters: Vec<RawFilter>,
}

/// The persistence collaborator. Implementations must preserve insertion
/// order in `select` results and assign an identifier on `insert` when the
/// record's id field is null.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    async fn select(&self, collection: &str, query: &RawQuery) -> Result<Vec<Value>, StoreError>;

    async fn insert(
        &self,
        collection: &str,
        record: Value,
        id_field: &str,
    ) -> Result<Value, StoreError>;

    /// Replace the record whose id field equals `id`. Returns the stored
    /// record, or `None` when no such record exists.
    async fn update(
        &self,
        collection: &str,
        id_field: &str,
        id: &Value,
        record: Value,
    ) -> Result<Option<Value>, StoreError>;

    /// Remove by id. Returns whether a record was removed.
    async fn delete(&self, collection: &str, id_field: &str, id: &Value)
        -> Result<bool, StoreError>;
}

/// Cheaply clonable typed handle over a shared backend.
#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn Backend>,
}

impl Store {
    pub fn new(backend: impl Backend) -> Self {
        Store {
            backend: Arc::new(backend),
        }
    }

    pub fn backend(&self) -> &dyn Backend {
        &*self.backend
    }

    /// Persist a new entity; the backend assigns the id. Returns the stored
    /// value, id populated.
    pub async fn create<E: Entity>(&self, entity: E) -> Result<E, ApiError> {
        let record = to_record(&entity)?;
        tracing::debug!(collection = E::NAME, "insert");
        let stored = self.backend.insert(E::NAME, record, E::ID_FIELD).await?;
        from_record(stored)
    }

    /// Persist changes to an already-persisted entity.
    pub async fn save<E: Entity>(&self, entity: &E) -> Result<E, ApiError> {
        let id = entity
            .id()
            .ok_or_else(|| ApiError::Store(format!("cannot save unpersisted {}", E::NAME)))?;
        let id = id_value(&id)?;
        let record = to_record(entity)?;
        tracing::debug!(collection = E::NAME, "update");
        let stored = self
            .backend
            .update(E::NAME, E::ID_FIELD, &id, record)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("{} disappeared during save", E::NAME)))?;
        from_record(stored)
    }

    /// Hard-delete by id. Returns whether a record was removed.
    pub async fn remove<E: Entity>(&self, id: &E::Id) -> Result<bool, ApiError> {
        let id = id_value(id)?;
        tracing::debug!(collection = E::NAME, "delete");
        Ok(self.backend.delete(E::NAME, E::ID_FIELD, &id).await?)
    }
}

pub(crate) fn to_record<E: Entity>(entity: &E) -> Result<Value, ApiError> {
    serde_json::to_value(entity).map_err(|e| {
        ApiError::Store(format!("serialize {}: {}", E::NAME, e))
    })
}

pub(crate) fn from_record<E: Entity>(record: Value) -> Result<E, ApiError> {
    serde_json::from_value(record).map_err(|e| {
        StoreError::Corrupt {
            collection: E::NAME.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

pub(crate) fn id_value<T: serde::Serialize>(id: &T) -> Result<Value, ApiError> {
    serde_json::to_value(id).map_err(|e| ApiError::Store(format!("serialize id: {}", e)))
}
