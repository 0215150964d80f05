//! In-process fallback store. Collections are plain maps keyed by model name;
//! they outlive handle turnover so data stays reachable across schema updates.

use crate::schema::EntityDescriptor;
use crate::store::query::{filter_sort_page, ListQuery};
use crate::store::{RecordStore, StoreError, StoredRecord};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, BTreeMap<String, StoredRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self, model: &str) -> Vec<StoredRecord> {
        let collections = self.collections.read().expect("memory store poisoned");
        collections
            .get(model)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn list(
        &self,
        model: &str,
        descriptor: &EntityDescriptor,
        query: &ListQuery,
    ) -> Result<(Vec<StoredRecord>, u64), StoreError> {
        Ok(filter_sort_page(self.snapshot(model), descriptor, query))
    }

    async fn get(&self, model: &str, id: &str) -> Result<Option<StoredRecord>, StoreError> {
        let collections = self.collections.read().expect("memory store poisoned");
        Ok(collections.get(model).and_then(|c| c.get(id)).cloned())
    }

    async fn insert(&self, model: &str, record: &StoredRecord) -> Result<(), StoreError> {
        let mut collections = self.collections.write().expect("memory store poisoned");
        collections
            .entry(model.to_string())
            .or_default()
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn replace(&self, model: &str, record: &StoredRecord) -> Result<bool, StoreError> {
        let mut collections = self.collections.write().expect("memory store poisoned");
        match collections.get_mut(model) {
            Some(c) if c.contains_key(&record.id) => {
                c.insert(record.id.clone(), record.clone());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn remove(&self, model: &str, id: &str) -> Result<bool, StoreError> {
        let mut collections = self.collections.write().expect("memory store poisoned");
        Ok(collections
            .get_mut(model)
            .map(|c| c.remove(id).is_some())
            .unwrap_or(false))
    }

    async fn value_taken(
        &self,
        model: &str,
        field: &str,
        value: &Value,
        exclude_id: Option<&str>,
    ) -> Result<bool, StoreError> {
        let collections = self.collections.read().expect("memory store poisoned");
        Ok(collections
            .get(model)
            .map(|c| {
                c.values().any(|r| {
                    exclude_id != Some(r.id.as_str()) && r.fields.get(field) == Some(value)
                })
            })
            .unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::Map;

    fn record(id: &str, name: &str) -> StoredRecord {
        let mut fields = Map::new();
        fields.insert("name".into(), Value::String(name.into()));
        let now = Utc::now();
        StoredRecord {
            id: id.into(),
            fields,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn insert_get_remove_round_trip() {
        let store = MemoryStore::new();
        store.insert("Items", &record("1", "widget")).await.unwrap();
        let got = store.get("Items", "1").await.unwrap().unwrap();
        assert_eq!(got.fields["name"], "widget");
        assert!(store.remove("Items", "1").await.unwrap());
        assert!(!store.remove("Items", "1").await.unwrap());
        assert!(store.get("Items", "1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn replace_requires_existing_id() {
        let store = MemoryStore::new();
        assert!(!store.replace("Items", &record("1", "x")).await.unwrap());
        store.insert("Items", &record("1", "x")).await.unwrap();
        assert!(store.replace("Items", &record("1", "y")).await.unwrap());
        let got = store.get("Items", "1").await.unwrap().unwrap();
        assert_eq!(got.fields["name"], "y");
    }

    #[tokio::test]
    async fn value_taken_excludes_the_given_id() {
        let store = MemoryStore::new();
        store.insert("Items", &record("1", "widget")).await.unwrap();
        let v = Value::String("widget".into());
        assert!(store.value_taken("Items", "name", &v, None).await.unwrap());
        assert!(!store.value_taken("Items", "name", &v, Some("1")).await.unwrap());
        assert!(!store.value_taken("Orders", "name", &v, None).await.unwrap());
    }

    #[tokio::test]
    async fn collections_are_isolated_by_model() {
        let store = MemoryStore::new();
        store.insert("Items", &record("1", "widget")).await.unwrap();
        assert!(store.get("Orders", "1").await.unwrap().is_none());
    }
}
