//! Dynamic entity CRUD dispatch.
//!
//! Entity routes are not registered on the axum router: the fallback handler
//! matches the request path against the active route table, so a schema update
//! swaps every dynamic route in one step without touching the router.

use crate::error::AppError;
use crate::registry::{EntityBinding, RouteTable};
use crate::response::{success_created, success_empty, success_many, success_one, Pagination};
use crate::state::AppState;
use crate::store::SortOrder;
use axum::{
    extract::{Query, Request, State},
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub const BODY_LIMIT: usize = 2 * 1024 * 1024;

const DEFAULT_PAGE: u32 = 1;
const DEFAULT_LIMIT: u32 = 10;

pub async fn dispatch(State(state): State<AppState>, req: Request) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let table = state.registry.active();

    let Some(matched) = table.resolve(uri.path()) else {
        return unmatched(&table, uri.path());
    };

    let result = match (&method, matched.id) {
        (&Method::GET, None) => list(&matched.binding, &uri).await,
        (&Method::POST, None) => create(&matched.binding, req).await,
        (&Method::GET, Some(id)) => get_by_id(&matched.binding, &id).await,
        (&Method::PUT, Some(id)) => update(&matched.binding, &id, req).await,
        (&Method::DELETE, Some(id)) => delete(&matched.binding, &id).await,
        _ => return unmatched(&table, uri.path()),
    };

    match result {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn list(binding: &Arc<EntityBinding>, uri: &Uri) -> Result<Response, AppError> {
    let params: HashMap<String, String> = Query::try_from_uri(uri)
        .map(|Query(p)| p)
        .unwrap_or_default();

    let page = parse_positive(params.get("page")).unwrap_or(DEFAULT_PAGE);
    let limit = parse_positive(params.get("limit")).unwrap_or(DEFAULT_LIMIT);
    let search = params.get("search").filter(|s| !s.is_empty()).cloned();
    let sort_by = params.get("sortBy").map(String::as_str);
    let order = params.get("sortOrder").map(|o| {
        if o.eq_ignore_ascii_case("desc") {
            SortOrder::Desc
        } else {
            SortOrder::Asc
        }
    });

    let (rows, total) = binding.data.list(page, limit, search, sort_by, order).await?;
    let pagination = Pagination::new(total, page, limit);
    Ok(success_many(rows, pagination).into_response())
}

async fn get_by_id(binding: &Arc<EntityBinding>, id: &str) -> Result<Response, AppError> {
    let row = binding.data.get_by_id(id).await?;
    Ok(success_one(row).into_response())
}

async fn create(binding: &Arc<EntityBinding>, req: Request) -> Result<Response, AppError> {
    let body = read_json_body(req).await?;
    let row = binding.data.create(body).await?;
    Ok(success_created(row).into_response())
}

async fn update(binding: &Arc<EntityBinding>, id: &str, req: Request) -> Result<Response, AppError> {
    let body = read_json_body(req).await?;
    let row = binding.data.update(id, body).await?;
    Ok(success_one(row).into_response())
}

async fn delete(binding: &Arc<EntityBinding>, id: &str) -> Result<Response, AppError> {
    binding.data.delete(id).await?;
    Ok(success_empty().into_response())
}

/// Invalid or missing values fall back to defaults; zero is not a valid page
/// or limit.
fn parse_positive(raw: Option<&String>) -> Option<u32> {
    raw.and_then(|s| s.parse::<u32>().ok()).filter(|n| *n >= 1)
}

async fn read_json_body(req: Request) -> Result<Value, AppError> {
    let bytes = axum::body::to_bytes(req.into_body(), BODY_LIMIT)
        .await
        .map_err(|e| AppError::BadRequest(format!("failed to read body: {}", e)))?;
    if bytes.is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    serde_json::from_slice(&bytes).map_err(|e| AppError::BadRequest(format!("invalid JSON body: {}", e)))
}

fn unmatched(table: &RouteTable, path: &str) -> Response {
    let mut available = vec![
        "/api/schema".to_string(),
        "/api/schema/update".to_string(),
        "/health".to_string(),
    ];
    available.extend(table.route_prefixes());
    let body = serde_json::json!({
        "success": false,
        "error": format!("Route '{}' not found", path),
        "availableRoutes": available,
    });
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}
