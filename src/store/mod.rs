//! Dual-backend data access: PostgreSQL document store with an in-process
//! fallback, behind one query/mutate contract.

pub mod access;
pub mod memory;
pub mod postgres;
pub mod query;

pub use access::DataAccess;
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use query::{ListQuery, SortKey, SortOrder};

use crate::schema::EntityDescriptor;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("backend timed out")]
    Timeout,
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
}

/// One stored record. Declared fields live in `fields`; id and timestamps are
/// server-assigned and kept outside the payload.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredRecord {
    pub id: String,
    pub fields: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredRecord {
    /// Wire shape: `{ id, ...fields, createdAt, updatedAt }`.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert("id".into(), Value::String(self.id.clone()));
        for (k, v) in &self.fields {
            map.insert(k.clone(), v.clone());
        }
        map.insert(
            "createdAt".into(),
            Value::String(self.created_at.to_rfc3339_opts(SecondsFormat::Micros, true)),
        );
        map.insert(
            "updatedAt".into(),
            Value::String(self.updated_at.to_rfc3339_opts(SecondsFormat::Micros, true)),
        );
        Value::Object(map)
    }
}

/// Backend contract. Both implementations honor the same pagination, search,
/// and sort semantics (see [`query`]); collections are keyed by canonical
/// model name.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn list(
        &self,
        model: &str,
        descriptor: &EntityDescriptor,
        query: &ListQuery,
    ) -> Result<(Vec<StoredRecord>, u64), StoreError>;

    async fn get(&self, model: &str, id: &str) -> Result<Option<StoredRecord>, StoreError>;

    async fn insert(&self, model: &str, record: &StoredRecord) -> Result<(), StoreError>;

    /// Replace an existing record. Returns false when the id does not exist.
    async fn replace(&self, model: &str, record: &StoredRecord) -> Result<bool, StoreError>;

    /// Returns false when the id did not exist.
    async fn remove(&self, model: &str, id: &str) -> Result<bool, StoreError>;

    /// Whether another record already holds `value` in `field`.
    async fn value_taken(
        &self,
        model: &str,
        field: &str,
        value: &Value,
        exclude_id: Option<&str>,
    ) -> Result<bool, StoreError>;
}
