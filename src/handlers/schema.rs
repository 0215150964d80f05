//! Schema management handlers: current document, full-replacement update,
//! health, version.

use crate::error::AppError;
use crate::schema::SchemaDocument;
use crate::state::AppState;
use axum::{extract::State, Json};
use serde_json::Value;

/// GET /api/schema: the current accepted document.
pub async fn get_schema(State(state): State<AppState>) -> Json<SchemaDocument> {
    Json(state.registry.document())
}

/// POST /api/schema/update: full replacement document. Accepted atomically or
/// rejected as a whole.
pub async fn update_schema(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let document: SchemaDocument = serde_json::from_value(body)
        .map_err(|e| AppError::BadRequest(format!("invalid schema document: {}", e)))?;
    let outcome = state.registry.submit(document).await?;
    let mut reply = serde_json::json!({
        "success": true,
        "entities": outcome.entities,
    });
    if let Some(warning) = outcome.warning {
        reply["warning"] = Value::String(warning);
    }
    Ok(Json(reply))
}

/// GET /health: backend connectivity plus active entity count.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let database = if state.registry.has_postgres() {
        if state.registry.backend_reachable().await {
            "ok"
        } else {
            "unreachable"
        }
    } else {
        "disabled"
    };
    Json(serde_json::json!({
        "success": true,
        "database": database,
        "entities": state.registry.active().len(),
    }))
}

pub async fn version() -> Json<Value> {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION")
    }))
}
