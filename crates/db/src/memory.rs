//! In-memory document store for tests and local development.

use async_trait::async_trait;
use comunimapp_common::{AppError, AppResult};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::store::{DocumentStore, Filter, MAX_BATCH_SIZE, QueryOptions, SortDirection, WriteOp};

/// A [`DocumentStore`] backed by process memory.
///
/// Semantics mirror the Firestore store closely enough for service tests:
/// merge updates, equality queries and batch commits chunked at
/// [`MAX_BATCH_SIZE`]. The size of every committed chunk is recorded so
/// tests can assert on the batching behaviour of bulk operations.
#[derive(Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<HashMap<String, BTreeMap<String, Value>>>>,
    commit_batches: Arc<RwLock<Vec<usize>>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently held in a collection.
    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    /// Whether a collection holds no documents.
    pub async fn is_empty(&self, collection: &str) -> bool {
        self.len(collection).await == 0
    }

    /// Sizes of the chunks applied by [`DocumentStore::commit`], in order.
    pub async fn commit_batch_sizes(&self) -> Vec<usize> {
        self.commit_batches.read().await.clone()
    }
}

fn matches(doc: &Value, filters: &[Filter]) -> bool {
    filters
        .iter()
        .all(|f| doc.get(&f.field).unwrap_or(&Value::Null) == &f.value)
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

fn merge(target: &mut Value, patch: &Value) {
    if let (Some(target_obj), Some(patch_obj)) = (target.as_object_mut(), patch.as_object()) {
        for (key, value) in patch_obj {
            target_obj.insert(key.clone(), value.clone());
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> AppResult<Option<Value>> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn set(&self, collection: &str, id: &str, doc: Value) -> AppResult<()> {
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), doc);
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> AppResult<()> {
        let mut collections = self.collections.write().await;
        let doc = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| AppError::NotFound(format!("{collection}/{id}")))?;
        merge(doc, &patch);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> AppResult<()> {
        if let Some(docs) = self.collections.write().await.get_mut(collection) {
            docs.remove(id);
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
        options: QueryOptions,
    ) -> AppResult<Vec<Value>> {
        let collections = self.collections.read().await;
        let mut results: Vec<Value> = collections
            .get(collection)
            .map(|docs| {
                docs.values()
                    .filter(|doc| matches(doc, filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some((field, direction)) = &options.order_by {
            results.sort_by(|a, b| {
                let ord = compare_values(
                    a.get(field).unwrap_or(&Value::Null),
                    b.get(field).unwrap_or(&Value::Null),
                );
                match direction {
                    SortDirection::Ascending => ord,
                    SortDirection::Descending => ord.reverse(),
                }
            });
        }

        if let Some(offset) = options.offset {
            results = results.into_iter().skip(offset).collect();
        }
        if let Some(limit) = options.limit {
            results.truncate(limit);
        }

        Ok(results)
    }

    async fn commit(&self, ops: Vec<WriteOp>) -> AppResult<u64> {
        let mut applied = 0u64;
        for chunk in ops.chunks(MAX_BATCH_SIZE) {
            self.commit_batches.write().await.push(chunk.len());
            for op in chunk {
                match op {
                    WriteOp::Update {
                        collection,
                        id,
                        patch,
                    } => self.update(collection, id, patch.clone()).await?,
                    WriteOp::Delete { collection, id } => self.delete(collection, id).await?,
                }
                applied += 1;
            }
        }
        Ok(applied)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemoryStore::new();
        store
            .set("users", "u1", json!({"id": "u1", "username": "ana"}))
            .await
            .unwrap();

        let doc = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(doc["username"], json!("ana"));

        store.delete("users", "u1").await.unwrap();
        assert!(store.get("users", "u1").await.unwrap().is_none());
        // Deleting again is a no-op.
        store.delete("users", "u1").await.unwrap();
    }

    #[tokio::test]
    async fn test_update_merges() {
        let store = MemoryStore::new();
        store
            .set("reports", "r1", json!({"id": "r1", "status": "pendiente", "priority": "media"}))
            .await
            .unwrap();
        store
            .update("reports", "r1", json!({"status": "asignado"}))
            .await
            .unwrap();

        let doc = store.get("reports", "r1").await.unwrap().unwrap();
        assert_eq!(doc["status"], json!("asignado"));
        assert_eq!(doc["priority"], json!("media"));
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .update("reports", "nope", json!({"status": "asignado"}))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_query_filters_and_order() {
        let store = MemoryStore::new();
        for (id, user, read, at) in [
            ("n1", "u1", false, "2024-01-01T00:00:00Z"),
            ("n2", "u1", true, "2024-01-03T00:00:00Z"),
            ("n3", "u2", false, "2024-01-02T00:00:00Z"),
            ("n4", "u1", false, "2024-01-04T00:00:00Z"),
        ] {
            store
                .set(
                    "notifications",
                    id,
                    json!({"id": id, "user_id": user, "is_read": read, "created_at": at}),
                )
                .await
                .unwrap();
        }

        let unread = store
            .query(
                "notifications",
                &[Filter::eq("user_id", "u1"), Filter::eq("is_read", false)],
                QueryOptions::desc("created_at"),
            )
            .await
            .unwrap();
        let ids: Vec<&str> = unread.iter().map(|d| d["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["n4", "n1"]);

        let limited = store
            .query(
                "notifications",
                &[Filter::eq("user_id", "u1")],
                QueryOptions::desc("created_at").with_limit(1).with_offset(1),
            )
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0]["id"], json!("n2"));
    }

    #[tokio::test]
    async fn test_commit_applies_all_ops() {
        let store = MemoryStore::new();
        for i in 0..3 {
            store
                .set("notifications", &format!("n{i}"), json!({"is_read": false}))
                .await
                .unwrap();
        }

        let ops = (0..3)
            .map(|i| WriteOp::Update {
                collection: "notifications".to_string(),
                id: format!("n{i}"),
                patch: json!({"is_read": true}),
            })
            .collect();
        let applied = store.commit(ops).await.unwrap();
        assert_eq!(applied, 3);
        assert_eq!(store.commit_batch_sizes().await, vec![3]);

        for i in 0..3 {
            let doc = store
                .get("notifications", &format!("n{i}"))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(doc["is_read"], json!(true));
        }
    }

    #[tokio::test]
    async fn test_commit_chunks_large_batches() {
        let store = MemoryStore::new();
        for i in 0..1200 {
            store
                .set("notifications", &format!("n{i}"), json!({"is_read": false}))
                .await
                .unwrap();
        }

        let ops = (0..1200)
            .map(|i| WriteOp::Update {
                collection: "notifications".to_string(),
                id: format!("n{i}"),
                patch: json!({"is_read": true}),
            })
            .collect();
        let applied = store.commit(ops).await.unwrap();
        assert_eq!(applied, 1200);
        assert_eq!(store.commit_batch_sizes().await, vec![500, 500, 200]);
    }
}
