//! In-memory backend: insertion-ordered collections, sequential integer ids.
//! Reference implementation for tests and demos.

use super::{Backend, FilterOp, RawQuery, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Collection {
    rows: Vec<Value>,
    next_id: i64,
}

/// Thread-safe in-memory store. Ids are assigned from a per-collection
/// integer sequence when the incoming record's id field is null, so entity
/// id types used against this backend should deserialize from JSON numbers.
#[derive(Default)]
pub struct MemoryBackend {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

fn field<'a>(record: &'a Value, name: &str) -> &'a Value {
    record.get(name).unwrap_or(&Value::Null)
}

fn matches(record: &Value, query: &RawQuery) -> bool {
    query.filters.iter().all(|f| {
        let v = field(record, &f.field);
        match &f.op {
            FilterOp::Eq => v == &f.value,
            FilterOp::Ne => v != &f.value,
            FilterOp::In(set) => set.contains(v),
            FilterOp::IsNull => v.is_null(),
            FilterOp::NotNull => !v.is_null(),
        }
    })
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn select(&self, collection: &str, query: &RawQuery) -> Result<Vec<Value>, StoreError> {
        let collections = self.collections.read().await;
        let rows = match collections.get(collection) {
            Some(c) => c.rows.iter().filter(|r| matches(r, query)).cloned().collect(),
            None => Vec::new(),
        };
        tracing::debug!(collection, filters = query.filters.len(), "select");
        Ok(rows)
    }

    async fn insert(
        &self,
        collection: &str,
        mut record: Value,
        id_field: &str,
    ) -> Result<Value, StoreError> {
        let obj = record
            .as_object_mut()
            .ok_or_else(|| StoreError::Backend("insert requires a JSON object".into()))?;
        let mut collections = self.collections.write().await;
        let c = collections.entry(collection.to_string()).or_default();
        if obj.get(id_field).map(Value::is_null).unwrap_or(true) {
            c.next_id += 1;
            obj.insert(id_field.to_string(), Value::Number(c.next_id.into()));
        } else {
            let id = obj[id_field].clone();
            if c.rows.iter().any(|r| field(r, id_field) == &id) {
                return Err(StoreError::Backend(format!(
                    "duplicate id {} in '{}'",
                    id, collection
                )));
            }
            // Keep the sequence ahead of caller-supplied ids.
            if let Some(n) = id.as_i64() {
                c.next_id = c.next_id.max(n);
            }
        }
        c.rows.push(record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        collection: &str,
        id_field: &str,
        id: &Value,
        record: Value,
    ) -> Result<Option<Value>, StoreError> {
        if !record.is_object() {
            return Err(StoreError::Backend("update requires a JSON object".into()));
        }
        let mut collections = self.collections.write().await;
        let Some(c) = collections.get_mut(collection) else {
            return Ok(None);
        };
        for row in c.rows.iter_mut() {
            if field(row, id_field) == id {
                *row = record.clone();
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    async fn delete(
        &self,
        collection: &str,
        id_field: &str,
        id: &Value,
    ) -> Result<bool, StoreError> {
        let mut collections = self.collections.write().await;
        let Some(c) = collections.get_mut(collection) else {
            return Ok(false);
        };
        let before = c.rows.len();
        c.rows.retain(|r| field(r, id_field) != id);
        Ok(c.rows.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RawFilter;
    use serde_json::json;

    fn eq(field: &str, value: Value) -> RawQuery {
        RawQuery {
            filters: vec![RawFilter {
                field: field.into(),
                op: FilterOp::Eq,
                value,
            }],
        }
    }

    #[tokio::test]
    async fn insert_assigns_sequential_ids() {
        let backend = MemoryBackend::new();
        let a = backend
            .insert("things", json!({"id": null, "name": "a"}), "id")
            .await
            .unwrap();
        let b = backend
            .insert("things", json!({"id": null, "name": "b"}), "id")
            .await
            .unwrap();
        assert_eq!(a["id"], json!(1));
        assert_eq!(b["id"], json!(2));
    }

    #[tokio::test]
    async fn duplicate_supplied_id_is_rejected() {
        let backend = MemoryBackend::new();
        backend
            .insert("things", json!({"id": 5, "name": "a"}), "id")
            .await
            .unwrap();
        let duplicate = backend
            .insert("things", json!({"id": 5, "name": "b"}), "id")
            .await;
        assert!(duplicate.is_err());
        // The sequence resumes past the supplied id.
        let next = backend
            .insert("things", json!({"id": null, "name": "c"}), "id")
            .await
            .unwrap();
        assert_eq!(next["id"], json!(6));
    }

    #[tokio::test]
    async fn select_preserves_insertion_order() {
        let backend = MemoryBackend::new();
        for name in ["x", "y", "z"] {
            backend
                .insert("things", json!({"id": null, "name": name}), "id")
                .await
                .unwrap();
        }
        let rows = backend.select("things", &RawQuery::default()).await.unwrap();
        let names: Vec<_> = rows.iter().map(|r| r["name"].clone()).collect();
        assert_eq!(names, vec![json!("x"), json!("y"), json!("z")]);
    }

    #[tokio::test]
    async fn filters_apply_conjunctively() {
        let backend = MemoryBackend::new();
        backend
            .insert("things", json!({"id": null, "name": "a", "kind": "t"}), "id")
            .await
            .unwrap();
        backend
            .insert("things", json!({"id": null, "name": "b", "kind": "t"}), "id")
            .await
            .unwrap();
        let mut q = eq("kind", json!("t"));
        q.filters.push(RawFilter {
            field: "name".into(),
            op: FilterOp::Eq,
            value: json!("b"),
        });
        let rows = backend.select("things", &q).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], json!("b"));
    }

    #[tokio::test]
    async fn update_and_delete_by_id() {
        let backend = MemoryBackend::new();
        let a = backend
            .insert("things", json!({"id": null, "name": "a"}), "id")
            .await
            .unwrap();
        let id = a["id"].clone();
        let updated = backend
            .update("things", "id", &id, json!({"id": id.clone(), "name": "a2"}))
            .await
            .unwrap();
        assert_eq!(updated.unwrap()["name"], json!("a2"));
        assert!(backend.delete("things", "id", &id).await.unwrap());
        assert!(!backend.delete("things", "id", &id).await.unwrap());
    }
}
