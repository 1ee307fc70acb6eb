//! Per-request query descriptors: filters and eager loads accumulate on the
//! descriptor, then the descriptor executes exactly once against the store.

use crate::entity::Entity;
use crate::error::ApiError;
use crate::relation::{EagerLoad, LoadDirection};
use crate::store::{from_record, id_value, FilterOp, RawFilter, RawQuery, Store};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

/// A lazily-built query for one entity type. Constructed fresh per request;
/// modifiers append clauses before execution. Tombstoned records are
/// excluded by default for soft-deletable entities.
pub struct Query<E: Entity> {
    filters: Vec<RawFilter>,
    eager: Vec<EagerLoad>,
    with_deleted: bool,
    trashed_only: bool,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Clone for Query<E> {
    fn clone(&self) -> Self {
        Query {
            filters: self.filters.clone(),
            eager: self.eager.clone(),
            with_deleted: self.with_deleted,
            trashed_only: self.trashed_only,
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> Default for Query<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// One selected record plus any eager-loaded relations.
pub struct Loaded<E> {
    pub entity: E,
    /// Relation name -> related object (parent) or array (children).
    pub related: Map<String, Value>,
}

impl<E: Entity> Loaded<E> {
    /// Entity fields merged with the eager-loaded keys.
    pub fn into_value(self) -> Result<Value, ApiError> {
        let mut v = crate::store::to_record(&self.entity)?;
        if let Some(obj) = v.as_object_mut() {
            for (k, rel) in self.related {
                obj.insert(k, rel);
            }
        }
        Ok(v)
    }
}

impl<E: Entity> Query<E> {
    /// Match all records of `E`.
    pub fn new() -> Self {
        Query {
            filters: Vec::new(),
            eager: Vec::new(),
            with_deleted: false,
            trashed_only: false,
            _entity: PhantomData,
        }
    }

    pub fn filter(mut self, field: &str, op: FilterOp, value: Value) -> Self {
        self.filters.push(RawFilter {
            field: field.to_string(),
            op,
            value,
        });
        self
    }

    pub fn by_id(self, id: &E::Id) -> Result<Self, ApiError> {
        let id = id_value(id)?;
        Ok(self.filter(E::ID_FIELD, FilterOp::Eq, id))
    }

    pub fn with(mut self, load: EagerLoad) -> Self {
        self.eager.push(load);
        self
    }

    /// Include tombstoned records.
    pub fn with_deleted(mut self) -> Self {
        self.with_deleted = true;
        self
    }

    /// Restrict to tombstoned records only.
    ///
    /// # Panics
    /// If `E` declares no tombstone field — misuse of the composition API,
    /// caught when the tree is built rather than at request time.
    pub fn only_trashed(mut self) -> Self {
        assert!(
            E::TOMBSTONE_FIELD.is_some(),
            "precondition violated: '{}' declares no tombstone field",
            E::NAME
        );
        self.trashed_only = true;
        self
    }

    fn raw(&self) -> RawQuery {
        let mut filters = self.filters.clone();
        if let Some(tombstone) = E::TOMBSTONE_FIELD {
            if self.trashed_only {
                filters.push(RawFilter {
                    field: tombstone.to_string(),
                    op: FilterOp::NotNull,
                    value: Value::Null,
                });
            } else if !self.with_deleted {
                filters.push(RawFilter {
                    field: tombstone.to_string(),
                    op: FilterOp::IsNull,
                    value: Value::Null,
                });
            }
        }
        RawQuery { filters }
    }

    /// Execute, returning all matches in insertion order.
    pub async fn all(&self, store: &Store) -> Result<Vec<Loaded<E>>, ApiError> {
        let rows = store.backend().select(E::NAME, &self.raw()).await?;
        let mut related: Vec<Map<String, Value>> = vec![Map::new(); rows.len()];
        for load in &self.eager {
            let values = load_related(store, &rows, load).await?;
            for (map, v) in related.iter_mut().zip(values) {
                map.insert(load.name.to_string(), v);
            }
        }
        rows.into_iter()
            .zip(related)
            .map(|(row, related)| {
                Ok(Loaded {
                    entity: from_record(row)?,
                    related,
                })
            })
            .collect()
    }

    /// Execute, returning the first match.
    pub async fn first(&self, store: &Store) -> Result<Option<Loaded<E>>, ApiError> {
        Ok(self.all(store).await?.into_iter().next())
    }
}

/// Resolve one eager load for a batch of base rows: one related value per
/// row (object or null for parent loads, array for children loads), nested
/// loads already embedded inside the related objects.
fn load_related<'a>(
    store: &'a Store,
    rows: &'a [Value],
    load: &'a EagerLoad,
) -> Pin<Box<dyn Future<Output = Result<Vec<Value>, ApiError>> + Send + 'a>> {
    Box::pin(async move {
        let mut out = match &load.direction {
            LoadDirection::Parent { fk_field } => {
                let keys: Vec<Value> = rows
                    .iter()
                    .map(|r| r.get(*fk_field).cloned().unwrap_or(Value::Null))
                    .filter(|v| !v.is_null())
                    .collect();
                let related = fetch_in(store, load.collection, load.id_field, keys).await?;
                let by_id: HashMap<String, &Value> = related
                    .iter()
                    .map(|r| (key_of(r, load.id_field), r))
                    .collect();
                rows.iter()
                    .map(|r| {
                        let fk = r.get(&**fk_field).cloned().unwrap_or(Value::Null);
                        if fk.is_null() {
                            Value::Null
                        } else {
                            by_id
                                .get(&fk.to_string())
                                .map(|v| (*v).clone())
                                .unwrap_or(Value::Null)
                        }
                    })
                    .collect::<Vec<_>>()
            }
            LoadDirection::Children { fk_field } => {
                let keys: Vec<Value> = rows
                    .iter()
                    .map(|r| r.get(load.id_field).cloned().unwrap_or(Value::Null))
                    .filter(|v| !v.is_null())
                    .collect();
                let related = fetch_in(store, load.collection, fk_field, keys).await?;
                rows.iter()
                    .map(|r| {
                        let id = r.get(load.id_field).cloned().unwrap_or(Value::Null);
                        let children: Vec<Value> = related
                            .iter()
                            .filter(|c| c.get(&**fk_field).unwrap_or(&Value::Null) == &id)
                            .cloned()
                            .collect();
                        Value::Array(children)
                    })
                    .collect::<Vec<_>>()
            }
        };

        for nested in &load.nested {
            embed_nested(store, &mut out, nested).await?;
        }
        Ok(out)
    })
}

/// Apply a nested load to every related object in `values` (flattening
/// through arrays), embedding the result under the nested load's name.
async fn embed_nested(
    store: &Store,
    values: &mut [Value],
    nested: &EagerLoad,
) -> Result<(), ApiError> {
    let mut flat: Vec<Value> = Vec::new();
    // Remember where each flattened object came from.
    let mut origins: Vec<(usize, Option<usize>)> = Vec::new();
    for (i, v) in values.iter().enumerate() {
        match v {
            Value::Object(_) => {
                flat.push(v.clone());
                origins.push((i, None));
            }
            Value::Array(items) => {
                for (j, item) in items.iter().enumerate() {
                    if item.is_object() {
                        flat.push(item.clone());
                        origins.push((i, Some(j)));
                    }
                }
            }
            _ => {}
        }
    }
    if flat.is_empty() {
        return Ok(());
    }
    let related = load_related(store, &flat, nested).await?;
    for ((i, j), rel) in origins.into_iter().zip(related) {
        let target = match j {
            None => &mut values[i],
            Some(j) => &mut values[i][j],
        };
        if let Some(obj) = target.as_object_mut() {
            obj.insert(nested.name.to_string(), rel);
        }
    }
    Ok(())
}

/// Batch fetch: records of `collection` whose `field` is in `keys`.
async fn fetch_in(
    store: &Store,
    collection: &str,
    field: &str,
    mut keys: Vec<Value>,
) -> Result<Vec<Value>, ApiError> {
    if keys.is_empty() {
        return Ok(Vec::new());
    }
    keys.dedup();
    let raw = RawQuery {
        filters: vec![RawFilter {
            field: field.to_string(),
            op: FilterOp::In(keys),
            value: Value::Null,
        }],
    };
    Ok(store.backend().select(collection, &raw).await?)
}

fn key_of(record: &Value, field: &str) -> String {
    record.get(field).unwrap_or(&Value::Null).to_string()
}
