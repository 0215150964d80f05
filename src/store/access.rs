//! Per-entity data access: backend selection, validation, defaults, and the
//! five CRUD operations with identical contracts on either backend.

use crate::error::AppError;
use crate::model::ModelHandle;
use crate::schema::{EntityDescriptor, FieldDefault, StorageKind};
use crate::store::query::{resolve_sort, ListQuery, SortOrder};
use crate::store::{MemoryStore, PgStore, RecordStore, StoreError, StoredRecord};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::sync::Arc;
use uuid::Uuid;

/// Keys the server owns; client-supplied values are ignored on write.
const RESERVED: &[&str] = &["id", "createdAt", "updatedAt"];

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Timeout => AppError::BackendTimeout,
            StoreError::Db(e) => AppError::Db(e),
        }
    }
}

/// Per-call backend selection with failover: the persistent store when it
/// answers a ping, the in-process fallback otherwise. A persistent call that
/// still times out after the ping is retried on the fallback, so one slow
/// statement degrades a single call instead of failing it. Never cached: the
/// system degrades and recovers without restart.
struct FailoverStore {
    postgres: Option<Arc<PgStore>>,
    fallback: Arc<MemoryStore>,
}

impl FailoverStore {
    async fn primary(&self, model: &str) -> Option<&PgStore> {
        let pg = self.postgres.as_deref()?;
        if pg.is_reachable().await {
            Some(pg)
        } else {
            tracing::warn!(model, "persistent store unreachable, using in-process fallback");
            None
        }
    }

    fn timed_out(&self, model: &str) {
        tracing::warn!(model, "persistent store timed out, retrying on in-process fallback");
    }
}

#[async_trait]
impl RecordStore for FailoverStore {
    async fn list(
        &self,
        model: &str,
        descriptor: &EntityDescriptor,
        query: &ListQuery,
    ) -> Result<(Vec<StoredRecord>, u64), StoreError> {
        if let Some(pg) = self.primary(model).await {
            match pg.list(model, descriptor, query).await {
                Err(StoreError::Timeout) => self.timed_out(model),
                other => return other,
            }
        }
        self.fallback.list(model, descriptor, query).await
    }

    async fn get(&self, model: &str, id: &str) -> Result<Option<StoredRecord>, StoreError> {
        if let Some(pg) = self.primary(model).await {
            match pg.get(model, id).await {
                Err(StoreError::Timeout) => self.timed_out(model),
                other => return other,
            }
        }
        self.fallback.get(model, id).await
    }

    async fn insert(&self, model: &str, record: &StoredRecord) -> Result<(), StoreError> {
        if let Some(pg) = self.primary(model).await {
            match pg.insert(model, record).await {
                Err(StoreError::Timeout) => self.timed_out(model),
                other => return other,
            }
        }
        self.fallback.insert(model, record).await
    }

    async fn replace(&self, model: &str, record: &StoredRecord) -> Result<bool, StoreError> {
        if let Some(pg) = self.primary(model).await {
            match pg.replace(model, record).await {
                Err(StoreError::Timeout) => self.timed_out(model),
                other => return other,
            }
        }
        self.fallback.replace(model, record).await
    }

    async fn remove(&self, model: &str, id: &str) -> Result<bool, StoreError> {
        if let Some(pg) = self.primary(model).await {
            match pg.remove(model, id).await {
                Err(StoreError::Timeout) => self.timed_out(model),
                other => return other,
            }
        }
        self.fallback.remove(model, id).await
    }

    async fn value_taken(
        &self,
        model: &str,
        field: &str,
        value: &Value,
        exclude_id: Option<&str>,
    ) -> Result<bool, StoreError> {
        if let Some(pg) = self.primary(model).await {
            match pg.value_taken(model, field, value, exclude_id).await {
                Err(StoreError::Timeout) => self.timed_out(model),
                other => return other,
            }
        }
        self.fallback.value_taken(model, field, value, exclude_id).await
    }
}

pub struct DataAccess {
    descriptor: Arc<EntityDescriptor>,
    handle: Arc<ModelHandle>,
    store: FailoverStore,
}

impl DataAccess {
    pub fn new(
        descriptor: Arc<EntityDescriptor>,
        handle: Arc<ModelHandle>,
        postgres: Option<Arc<PgStore>>,
        fallback: Arc<MemoryStore>,
    ) -> Self {
        DataAccess {
            descriptor,
            handle,
            store: FailoverStore { postgres, fallback },
        }
    }

    pub fn descriptor(&self) -> &Arc<EntityDescriptor> {
        &self.descriptor
    }

    /// Check the handle at operation start. An operation that got past this
    /// point may finish even if a schema update detaches the handle meanwhile.
    fn acquire(&self) -> Result<&str, AppError> {
        if self.handle.is_detached() {
            return Err(AppError::StaleHandle(self.handle.model().to_string()));
        }
        Ok(self.handle.model())
    }

    pub async fn list(
        &self,
        page: u32,
        limit: u32,
        search: Option<String>,
        sort_by: Option<&str>,
        order: Option<SortOrder>,
    ) -> Result<(Vec<Value>, u64), AppError> {
        let model = self.acquire()?;
        let (sort, forced) = resolve_sort(&self.descriptor, sort_by);
        let query = ListQuery {
            page: page.max(1),
            limit: limit.max(1),
            search,
            sort,
            order: forced.or(order).unwrap_or(SortOrder::Asc),
        };
        let (records, total) = self.store.list(model, &self.descriptor, &query).await?;
        Ok((records.iter().map(StoredRecord::to_json).collect(), total))
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Value, AppError> {
        let model = self.acquire()?;
        let record = self.store.get(model, id).await?.ok_or(AppError::NotFound)?;
        Ok(record.to_json())
    }

    pub async fn create(&self, payload: Value) -> Result<Value, AppError> {
        let model = self.acquire()?;
        let payload = as_object(payload)?;
        let mut fields = Map::new();

        for field in &self.descriptor.fields {
            match payload.get(&field.name) {
                Some(Value::Null) | None => {
                    if let Some(default) = &field.default {
                        fields.insert(field.name.clone(), materialize_default(default));
                    }
                }
                Some(v) => {
                    check_kind(&field.name, field.storage, v)?;
                    fields.insert(field.name.clone(), v.clone());
                }
            }
        }

        let missing: Vec<&str> = self
            .descriptor
            .fields
            .iter()
            .filter(|f| f.required && !fields.contains_key(&f.name))
            .map(|f| f.name.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(AppError::Validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }

        self.check_unique(model, &fields, None).await?;

        let now = Utc::now();
        let record = StoredRecord {
            id: Uuid::new_v4().to_string(),
            fields,
            created_at: now,
            updated_at: now,
        };
        self.store.insert(model, &record).await?;
        tracing::debug!(model, id = %record.id, "created record");
        Ok(record.to_json())
    }

    pub async fn update(&self, id: &str, payload: Value) -> Result<Value, AppError> {
        let model = self.acquire()?;
        let payload = as_object(payload)?;
        let mut record = self.store.get(model, id).await?.ok_or(AppError::NotFound)?;

        // Shallow merge: submitted fields replace, omitted fields keep their
        // prior value. id and createdAt are never touched.
        let mut changed = Map::new();
        for field in &self.descriptor.fields {
            match payload.get(&field.name) {
                None => {}
                Some(Value::Null) => {
                    if field.required {
                        return Err(AppError::Validation(format!(
                            "Field '{}' is required and cannot be removed",
                            field.name
                        )));
                    }
                    record.fields.remove(&field.name);
                }
                Some(v) => {
                    check_kind(&field.name, field.storage, v)?;
                    changed.insert(field.name.clone(), v.clone());
                    record.fields.insert(field.name.clone(), v.clone());
                }
            }
        }
        for key in payload.keys() {
            if !RESERVED.contains(&key.as_str()) && self.descriptor.field(key).is_none() {
                tracing::debug!(model, field = %key, "ignoring undeclared field");
            }
        }

        self.check_unique(model, &changed, Some(id)).await?;

        // Strictly later than createdAt even when the clock has not advanced
        // past the stored microsecond precision.
        record.updated_at = Utc::now().max(record.created_at + chrono::Duration::microseconds(1));
        if !self.store.replace(model, &record).await? {
            return Err(AppError::NotFound);
        }
        Ok(record.to_json())
    }

    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        let model = self.acquire()?;
        if !self.store.remove(model, id).await? {
            return Err(AppError::NotFound);
        }
        tracing::debug!(model, id, "deleted record");
        Ok(())
    }

    async fn check_unique(
        &self,
        model: &str,
        fields: &Map<String, Value>,
        exclude_id: Option<&str>,
    ) -> Result<(), AppError> {
        for field in self.descriptor.fields.iter().filter(|f| f.unique) {
            if let Some(v) = fields.get(&field.name) {
                if self.store.value_taken(model, &field.name, v, exclude_id).await? {
                    return Err(AppError::Validation(format!(
                        "Field '{}' must be unique",
                        field.name
                    )));
                }
            }
        }
        Ok(())
    }
}

fn as_object(payload: Value) -> Result<Map<String, Value>, AppError> {
    match payload {
        Value::Object(m) => Ok(m),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

fn check_kind(name: &str, kind: StorageKind, v: &Value) -> Result<(), AppError> {
    if kind.accepts(v) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "Field '{}' must be of kind {}",
            name,
            kind.name()
        )))
    }
}

fn materialize_default(default: &FieldDefault) -> Value {
    match default {
        FieldDefault::Literal(v) => v.clone(),
        FieldDefault::Now => Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)),
    }
}
