//! PostgreSQL document store: one JSONB-payload table per model under a
//! dedicated schema. Every call is bounded by a timeout; collection tables are
//! created lazily so the store recovers after the database comes back.

use crate::schema::EntityDescriptor;
use crate::store::query::{ListQuery, SortKey, SortOrder};
use crate::store::{RecordStore, StoreError, StoredRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use std::collections::HashSet;
use std::future::Future;
use std::sync::RwLock;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Schema name for data and system tables. From env `PROTEAN_SCHEMA`,
/// default `protean`. Must be a valid PostgreSQL identifier.
pub fn protean_schema() -> String {
    std::env::var("PROTEAN_SCHEMA").unwrap_or_else(|_| "protean".into())
}

/// Quote identifier for PostgreSQL.
pub(crate) fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn sql_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

pub struct PgStore {
    pool: PgPool,
    schema: String,
    timeout: Duration,
    /// Models whose table DDL already ran in this process.
    ready: RwLock<HashSet<String>>,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self::with_timeout(pool, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(pool: PgPool, timeout: Duration) -> Self {
        PgStore {
            pool,
            schema: protean_schema(),
            timeout,
            ready: RwLock::new(HashSet::new()),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Whether the database answers within the timeout. Evaluated per call by
    /// the data access layer, never cached.
    pub async fn is_reachable(&self) -> bool {
        self.bounded(sqlx::query("SELECT 1").execute(&self.pool))
            .await
            .is_ok()
    }

    fn table(&self, model: &str) -> String {
        format!("{}.{}", quoted(&self.schema), quoted(&format!("_data_{}", model)))
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, sqlx::Error>> + Send,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(res) => res.map_err(StoreError::Db),
            Err(_) => Err(StoreError::Timeout),
        }
    }

    async fn ensure_collection(&self, model: &str) -> Result<(), StoreError> {
        if self.ready.read().expect("ready set poisoned").contains(model) {
            return Ok(());
        }
        self.bounded(
            sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", quoted(&self.schema)))
                .execute(&self.pool),
        )
        .await?;
        let ddl = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                payload JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
            self.table(model)
        );
        self.bounded(sqlx::query(&ddl).execute(&self.pool)).await?;
        self.ready.write().expect("ready set poisoned").insert(model.to_string());
        Ok(())
    }

    /// WHERE clause for a search term: ILIKE over every text field, bound as
    /// $1. A term with no text fields to search matches nothing.
    fn search_clause(descriptor: &EntityDescriptor) -> String {
        let parts: Vec<String> = descriptor
            .text_fields()
            .map(|f| format!("payload->>{} ILIKE $1", sql_string(f)))
            .collect();
        if parts.is_empty() {
            "FALSE".into()
        } else {
            format!("({})", parts.join(" OR "))
        }
    }

    fn order_clause(query: &ListQuery) -> String {
        let dir = match query.order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        match &query.sort {
            SortKey::CreatedAt => format!("created_at {}, id ASC", dir),
            SortKey::UpdatedAt => format!("updated_at {}, id ASC", dir),
            SortKey::Id => format!("id {}", dir),
            SortKey::Field(f) => format!("payload->{} {}, id ASC", sql_string(f), dir),
        }
    }
}

fn like_pattern(term: &str) -> String {
    let escaped = term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{}%", escaped)
}

type Row = (String, Value, DateTime<Utc>, DateTime<Utc>);

fn row_to_record(row: Row) -> StoredRecord {
    let fields = match row.1 {
        Value::Object(m) => m,
        _ => serde_json::Map::new(),
    };
    StoredRecord {
        id: row.0,
        fields,
        created_at: row.2,
        updated_at: row.3,
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn list(
        &self,
        model: &str,
        descriptor: &EntityDescriptor,
        query: &ListQuery,
    ) -> Result<(Vec<StoredRecord>, u64), StoreError> {
        self.ensure_collection(model).await?;
        let table = self.table(model);
        let search = query.search.as_deref().filter(|t| !t.is_empty());
        // A term with no text fields to search matches nothing; answer without
        // a query so no stray bind parameter reaches the statement.
        if search.is_some() && descriptor.text_fields().next().is_none() {
            return Ok((Vec::new(), 0));
        }
        let where_clause = match search {
            Some(_) => format!("WHERE {}", Self::search_clause(descriptor)),
            None => String::new(),
        };
        let pattern = search.map(like_pattern);

        let count_sql = format!("SELECT COUNT(*) FROM {} {}", table, where_clause);
        tracing::debug!(sql = %count_sql, "query");
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        if let Some(p) = &pattern {
            count_query = count_query.bind(p);
        }
        let total = self.bounded(count_query.fetch_one(&self.pool)).await? as u64;

        let page_sql = format!(
            "SELECT id, payload, created_at, updated_at FROM {} {} ORDER BY {} LIMIT {} OFFSET {}",
            table,
            where_clause,
            Self::order_clause(query),
            query.limit,
            query.offset(),
        );
        tracing::debug!(sql = %page_sql, "query");
        let mut page_query = sqlx::query_as::<_, Row>(&page_sql);
        if let Some(p) = &pattern {
            page_query = page_query.bind(p);
        }
        let rows = self.bounded(page_query.fetch_all(&self.pool)).await?;
        Ok((rows.into_iter().map(row_to_record).collect(), total))
    }

    async fn get(&self, model: &str, id: &str) -> Result<Option<StoredRecord>, StoreError> {
        self.ensure_collection(model).await?;
        let sql = format!(
            "SELECT id, payload, created_at, updated_at FROM {} WHERE id = $1",
            self.table(model)
        );
        tracing::debug!(sql = %sql, "query");
        let row = self
            .bounded(sqlx::query_as::<_, Row>(&sql).bind(id).fetch_optional(&self.pool))
            .await?;
        Ok(row.map(row_to_record))
    }

    async fn insert(&self, model: &str, record: &StoredRecord) -> Result<(), StoreError> {
        self.ensure_collection(model).await?;
        let sql = format!(
            "INSERT INTO {} (id, payload, created_at, updated_at) VALUES ($1, $2, $3, $4)",
            self.table(model)
        );
        tracing::debug!(sql = %sql, "query");
        self.bounded(
            sqlx::query(&sql)
                .bind(&record.id)
                .bind(Value::Object(record.fields.clone()))
                .bind(record.created_at)
                .bind(record.updated_at)
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn replace(&self, model: &str, record: &StoredRecord) -> Result<bool, StoreError> {
        self.ensure_collection(model).await?;
        let sql = format!(
            "UPDATE {} SET payload = $2, updated_at = $3 WHERE id = $1",
            self.table(model)
        );
        tracing::debug!(sql = %sql, "query");
        let result = self
            .bounded(
                sqlx::query(&sql)
                    .bind(&record.id)
                    .bind(Value::Object(record.fields.clone()))
                    .bind(record.updated_at)
                    .execute(&self.pool),
            )
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove(&self, model: &str, id: &str) -> Result<bool, StoreError> {
        self.ensure_collection(model).await?;
        let sql = format!("DELETE FROM {} WHERE id = $1", self.table(model));
        tracing::debug!(sql = %sql, "query");
        let result = self
            .bounded(sqlx::query(&sql).bind(id).execute(&self.pool))
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn value_taken(
        &self,
        model: &str,
        field: &str,
        value: &Value,
        exclude_id: Option<&str>,
    ) -> Result<bool, StoreError> {
        self.ensure_collection(model).await?;
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE payload->{} = $1 AND ($2::TEXT IS NULL OR id <> $2))",
            self.table(model),
            sql_string(field),
        );
        tracing::debug!(sql = %sql, "query");
        self.bounded(
            sqlx::query_scalar::<_, bool>(&sql)
                .bind(value)
                .bind(exclude_id)
                .fetch_one(&self.pool),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::compiler::compile_entity;
    use crate::schema::types::{EntityConfig, FieldSpec};

    #[test]
    fn search_clause_without_text_fields_matches_nothing() {
        let config = EntityConfig {
            route: "/api/counters".into(),
            fields: [(
                "count".to_string(),
                FieldSpec {
                    kind: "number".into(),
                    required: false,
                    unique: false,
                    default: None,
                },
            )]
            .into_iter()
            .collect(),
        };
        let descriptor = compile_entity("counters", &config).unwrap();
        assert_eq!(PgStore::search_clause(&descriptor), "FALSE");
        assert_eq!(descriptor.text_fields().count(), 0);
    }

    #[test]
    fn table_names_are_quoted_and_schema_qualified() {
        let s = quoted("protean");
        assert_eq!(s, "\"protean\"");
        assert_eq!(quoted("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("plain"), "%plain%");
    }

    #[test]
    fn order_clause_always_tiebreaks_on_id() {
        let q = ListQuery {
            page: 1,
            limit: 10,
            search: None,
            sort: SortKey::Field("name".into()),
            order: SortOrder::Desc,
        };
        assert_eq!(PgStore::order_clause(&q), "payload->'name' DESC, id ASC");
    }
}
