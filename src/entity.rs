//! The capability contract a persisted type must satisfy to appear in the
//! endpoint tree.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// Identifier capability: parseable from a path segment, serializable into a
/// store record, comparable for ownership checks.
pub trait EntityId:
    Clone + PartialEq + Serialize + DeserializeOwned + FromStr + Display + Send + Sync + 'static
{
}

impl<T> EntityId for T where
    T: Clone + PartialEq + Serialize + DeserializeOwned + FromStr + Display + Send + Sync + 'static
{
}

/// A persisted domain object. The id is `None` until the backend assigns one
/// on first insert; soft-deletable types additionally declare a tombstone
/// field and its accessors.
///
/// The serialized form must carry `ID_FIELD` (null before persist) and, when
/// declared, `TOMBSTONE_FIELD` as a nullable timestamp — plain `Option`
/// fields serialize correctly.
pub trait Entity: Clone + Default + Serialize + DeserializeOwned + Send + Sync + 'static {
    type Id: EntityId;

    /// Store collection name; also seeds generated route parameter names.
    const NAME: &'static str;
    /// JSON field holding the identifier.
    const ID_FIELD: &'static str = "id";
    /// Nullable timestamp field marking soft deletion, if supported.
    const TOMBSTONE_FIELD: Option<&'static str> = None;

    fn id(&self) -> Option<Self::Id>;
    fn set_id(&mut self, id: Self::Id);

    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        None
    }
    fn set_deleted_at(&mut self, _at: Option<DateTime<Utc>>) {}
}
