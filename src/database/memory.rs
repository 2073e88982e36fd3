use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use super::store::{DatabaseError, DocumentStore, FindOptions, Index, Query, ID_FIELD};

/// Process-local document store, used when no `DATABASE_URL` is configured
/// and by the test suites.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Value>>>,
    indexes: RwLock<HashMap<String, Vec<Index>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn document_id(document: &Value) -> Option<&str> {
    document.get(ID_FIELD).and_then(Value::as_str)
}

/// First unique index `candidate` would collide on among `others`
fn unique_violation<'a>(
    indexes: &'a [Index],
    candidate: &Value,
    others: impl Iterator<Item = &'a Value> + Clone,
) -> Option<&'a Index> {
    indexes.iter().filter(|index| index.unique).find(|index| {
        let Some(key) = index.key(candidate) else {
            return false;
        };
        others.clone().any(|other| index.key(other).as_ref() == Some(&key))
    })
}

fn duplicate(index: &Index, collection: &str) -> DatabaseError {
    DatabaseError::Duplicate(format!("Duplicate key `{}` in `{}`", index.name(), collection))
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, collection: &str, document: Value) -> Result<(), DatabaseError> {
        let Some(id) = document_id(&document).map(str::to_string) else {
            return Err(DatabaseError::QueryError(format!(
                "document inserted into `{}` has no string `{}`",
                collection, ID_FIELD
            )));
        };

        let indexes = self.indexes.read().await;
        let mut collections = self.collections.write().await;
        let documents = collections.entry(collection.to_string()).or_default();
        if documents.iter().any(|d| document_id(d) == Some(id.as_str())) {
            return Err(DatabaseError::Duplicate(format!(
                "Duplicate key `{}` in `{}`",
                id, collection
            )));
        }
        let collection_indexes = indexes.get(collection).map(Vec::as_slice).unwrap_or_default();
        if let Some(index) = unique_violation(collection_indexes, &document, documents.iter()) {
            return Err(duplicate(index, collection));
        }
        documents.push(document);
        Ok(())
    }

    async fn find_one(&self, collection: &str, query: &Query) -> Result<Option<Value>, DatabaseError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| query.matches(d)).cloned()))
    }

    async fn find_all(
        &self,
        collection: &str,
        query: &Query,
        options: &FindOptions,
    ) -> Result<Vec<Value>, DatabaseError> {
        let collections = self.collections.read().await;
        let matching = collections
            .get(collection)
            .map(|docs| docs.iter().filter(|d| query.matches(d)).cloned().collect())
            .unwrap_or_default();
        Ok(options.apply(matching))
    }

    async fn update(
        &self,
        collection: &str,
        query: &Query,
        changes: Map<String, Value>,
    ) -> Result<Option<Value>, DatabaseError> {
        let indexes = self.indexes.read().await;
        let mut collections = self.collections.write().await;
        let Some(documents) = collections.get_mut(collection) else {
            return Ok(None);
        };
        let Some(position) = documents.iter().position(|d| query.matches(d)) else {
            return Ok(None);
        };

        let mut updated = documents[position].clone();
        if let Value::Object(fields) = &mut updated {
            for (key, value) in changes {
                if key != ID_FIELD {
                    fields.insert(key, value);
                }
            }
        }

        let collection_indexes = indexes.get(collection).map(Vec::as_slice).unwrap_or_default();
        let others = documents
            .iter()
            .enumerate()
            .filter(move |(i, _)| *i != position)
            .map(|(_, d)| d);
        if let Some(index) = unique_violation(collection_indexes, &updated, others) {
            return Err(duplicate(index, collection));
        }

        documents[position] = updated.clone();
        Ok(Some(updated))
    }

    async fn remove(&self, collection: &str, query: &Query) -> Result<u64, DatabaseError> {
        let mut collections = self.collections.write().await;
        let Some(documents) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = documents.len();
        documents.retain(|d| !query.matches(d));
        Ok((before - documents.len()) as u64)
    }

    async fn count(&self, collection: &str, query: &Query) -> Result<u64, DatabaseError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| docs.iter().filter(|d| query.matches(d)).count() as u64)
            .unwrap_or(0))
    }

    async fn drop_collection(&self, collection: &str) -> Result<(), DatabaseError> {
        self.collections.write().await.remove(collection);
        Ok(())
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn ensure_index(&self, collection: &str, index: &Index) -> Result<(), DatabaseError> {
        let mut indexes = self.indexes.write().await;
        let existing = indexes.entry(collection.to_string()).or_default();
        if existing.contains(index) {
            return Ok(());
        }

        if index.unique {
            let collections = self.collections.read().await;
            let documents = collections.get(collection).map(Vec::as_slice).unwrap_or_default();
            let mut seen = Vec::new();
            for key in documents.iter().filter_map(|d| index.key(d)) {
                if seen.contains(&key) {
                    return Err(duplicate(index, collection));
                }
                seen.push(key);
            }
        }
        existing.push(index.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn insert_find_update_remove() {
        let store = MemoryStore::new();
        store
            .insert("users", json!({ "_id": "1", "username": "alice" }))
            .await
            .unwrap();
        store
            .insert("users", json!({ "_id": "2", "username": "bob" }))
            .await
            .unwrap();

        let found = store
            .find_one("users", &Query::new().eq("username", "bob"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found["_id"], "2");

        let mut changes = Map::new();
        changes.insert("username".into(), json!("robert"));
        let updated = store
            .update("users", &Query::by_id("2"), changes)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated["username"], "robert");

        assert_eq!(store.count("users", &Query::new()).await.unwrap(), 2);
        assert_eq!(store.remove("users", &Query::by_id("1")).await.unwrap(), 1);
        assert!(!store.exists("users", &Query::by_id("1")).await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let store = MemoryStore::new();
        store.insert("c", json!({ "_id": "x" })).await.unwrap();
        let err = store.insert("c", json!({ "_id": "x" })).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Duplicate(_)));
    }

    #[tokio::test]
    async fn unique_index_guards_inserts_and_updates() {
        let store = MemoryStore::new();
        store
            .ensure_index("users", &Index::new(["username"]).unique())
            .await
            .unwrap();
        store
            .insert("users", json!({ "_id": "1", "username": "alice" }))
            .await
            .unwrap();
        store
            .insert("users", json!({ "_id": "2", "username": "bob" }))
            .await
            .unwrap();

        let err = store
            .insert("users", json!({ "_id": "3", "username": "alice" }))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Duplicate key `username` in `users`");

        let mut changes = Map::new();
        changes.insert("username".into(), json!("alice"));
        let err = store
            .update("users", &Query::by_id("2"), changes)
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Duplicate(_)));
        let bob = store.find_one("users", &Query::by_id("2")).await.unwrap().unwrap();
        assert_eq!(bob["username"], "bob");

        // Rewriting a document's own key is not a collision
        let mut changes = Map::new();
        changes.insert("username".into(), json!("alice"));
        assert!(store
            .update("users", &Query::by_id("1"), changes)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn unique_index_rejects_existing_duplicates() {
        let store = MemoryStore::new();
        store.insert("c", json!({ "_id": "1", "email": "a@x" })).await.unwrap();
        store.insert("c", json!({ "_id": "2", "email": "a@x" })).await.unwrap();
        assert!(store.ensure_index("c", &Index::new(["email"])).await.is_ok());
        assert!(store
            .ensure_index("c", &Index::new(["name"]).unique())
            .await
            .is_ok());
        assert!(matches!(
            store.ensure_index("c", &Index::new(["email"]).unique()).await,
            Err(DatabaseError::Duplicate(_))
        ));
    }

    #[tokio::test]
    async fn text_search_matches_substrings() {
        let store = MemoryStore::new();
        for (id, name) in [("1", "Ada Lovelace"), ("2", "Grace Hopper"), ("3", "Adele")] {
            store
                .insert("people", json!({ "_id": id, "name": name }))
                .await
                .unwrap();
        }
        let found = store
            .find_all("people", &Query::new().text("name", "ad"), &FindOptions::default())
            .await
            .unwrap();
        let ids: Vec<_> = found.iter().map(|d| d["_id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[tokio::test]
    async fn missing_collection_is_empty_not_an_error() {
        let store = MemoryStore::new();
        assert!(store.find_one("nope", &Query::new()).await.unwrap().is_none());
        assert!(store
            .update("nope", &Query::new(), Map::new())
            .await
            .unwrap()
            .is_none());
        assert_eq!(store.remove("nope", &Query::new()).await.unwrap(), 0);
    }
}
