//! Durable storage for the accepted schema document: a single JSONB row in
//! `_sys_schema`, written best-effort after every successful update.

use crate::schema::SchemaDocument;
use crate::store::postgres::{protean_schema, quoted};
use sqlx::PgPool;

fn sys_table() -> String {
    format!("{}.{}", quoted(&protean_schema()), quoted("_sys_schema"))
}

const ACTIVE_ROW: &str = "active";

pub async fn ensure_sys_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", quoted(&protean_schema())))
        .execute(pool)
        .await?;
    let ddl = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            id TEXT PRIMARY KEY,
            payload JSONB NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
        sys_table()
    );
    sqlx::query(&ddl).execute(pool).await?;
    Ok(())
}

/// Upsert the accepted document under the well-known row.
pub async fn save_document(pool: &PgPool, document: &SchemaDocument) -> Result<(), sqlx::Error> {
    ensure_sys_schema(pool).await?;
    let payload = serde_json::to_value(document).unwrap_or_default();
    let sql = format!(
        "INSERT INTO {} (id, payload, updated_at) VALUES ($1, $2, NOW())
         ON CONFLICT (id) DO UPDATE SET payload = EXCLUDED.payload, updated_at = NOW()",
        sys_table()
    );
    tracing::debug!(sql = %sql, "query");
    sqlx::query(&sql).bind(ACTIVE_ROW).bind(payload).execute(pool).await?;
    Ok(())
}

/// Load the last accepted document, if any was persisted.
pub async fn load_document(pool: &PgPool) -> Result<Option<SchemaDocument>, sqlx::Error> {
    ensure_sys_schema(pool).await?;
    let sql = format!("SELECT payload FROM {} WHERE id = $1", sys_table());
    tracing::debug!(sql = %sql, "query");
    let row: Option<serde_json::Value> = sqlx::query_scalar(&sql)
        .bind(ACTIVE_ROW)
        .fetch_optional(pool)
        .await?;
    match row {
        Some(payload) => match serde_json::from_value(payload) {
            Ok(doc) => Ok(Some(doc)),
            Err(e) => {
                tracing::warn!(error = %e, "persisted schema document failed to parse, ignoring");
                Ok(None)
            }
        },
        None => Ok(None),
    }
}
