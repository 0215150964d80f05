//! Router assembly: static schema-management routes plus the dynamic entity
//! dispatcher as the fallback.

use crate::handlers::entity::{dispatch, BODY_LIMIT};
use crate::handlers::schema::{get_schema, health, update_schema, version};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::limit::RequestBodyLimitLayer;

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/api/schema", get(get_schema))
        .route("/api/schema/update", post(update_schema))
        .route("/health", get(health))
        .route("/version", get(version))
        .fallback(dispatch)
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SchemaRegistry;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn test_app() -> Router {
        app_router(AppState::new(SchemaRegistry::in_memory()))
    }

    fn items_schema() -> Value {
        json!({
            "items": {
                "route": "/api/items",
                "fields": {
                    "name": { "kind": "text", "required": true }
                }
            }
        })
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let req = match body {
            Some(v) => builder.body(Body::from(v.to_string())).unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    #[tokio::test]
    async fn schema_submit_then_get_round_trips() {
        let app = test_app();
        let (status, body) = send(&app, "POST", "/api/schema/update", Some(items_schema())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["entities"], json!(["items"]));

        let (status, body) = send(&app, "GET", "/api/schema", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, items_schema());
    }

    #[tokio::test]
    async fn create_then_search_finds_the_widget() {
        let app = test_app();
        send(&app, "POST", "/api/schema/update", Some(items_schema())).await;

        let (status, body) = send(&app, "POST", "/api/items", Some(json!({ "name": "widget" }))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);
        assert!(body["data"]["id"].is_string());
        assert_eq!(body["data"]["name"], "widget");

        let (status, body) = send(&app, "GET", "/api/items?search=widg", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["data"][0]["name"], "widget");
        assert_eq!(body["pagination"]["total"], 1);
    }

    #[tokio::test]
    async fn create_without_required_field_is_rejected() {
        let app = test_app();
        send(&app, "POST", "/api/schema/update", Some(items_schema())).await;
        let (status, body) = send(&app, "POST", "/api/items", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("name"));
    }

    #[tokio::test]
    async fn empty_put_keeps_fields_but_bumps_updated_at() {
        let app = test_app();
        send(&app, "POST", "/api/schema/update", Some(items_schema())).await;
        let (_, created) = send(&app, "POST", "/api/items", Some(json!({ "name": "widget" }))).await;
        let id = created["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(&app, "PUT", &format!("/api/items/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "widget");
        let created_at = body["data"]["createdAt"].as_str().unwrap();
        let updated_at = body["data"]["updatedAt"].as_str().unwrap();
        assert!(updated_at > created_at);
    }

    #[tokio::test]
    async fn delete_twice_yields_200_then_404() {
        let app = test_app();
        send(&app, "POST", "/api/schema/update", Some(items_schema())).await;
        let (_, created) = send(&app, "POST", "/api/items", Some(json!({ "name": "widget" }))).await;
        let id = created["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(&app, "DELETE", &format!("/api/items/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let (status, body) = send(&app, "DELETE", &format!("/api/items/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Item not found");
    }

    #[tokio::test]
    async fn missing_item_returns_not_found_body() {
        let app = test_app();
        send(&app, "POST", "/api/schema/update", Some(items_schema())).await;
        let (status, body) = send(&app, "GET", "/api/items/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "success": false, "error": "Item not found" }));
    }

    #[tokio::test]
    async fn unmatched_route_lists_available_routes() {
        let app = test_app();
        send(&app, "POST", "/api/schema/update", Some(items_schema())).await;
        let (status, body) = send(&app, "GET", "/api/nothing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        let available: Vec<&str> = body["availableRoutes"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert!(available.contains(&"/api/items"));
        assert!(available.contains(&"/api/schema"));
    }

    #[tokio::test]
    async fn invalid_schema_is_rejected_and_previous_routes_keep_serving() {
        let app = test_app();
        send(&app, "POST", "/api/schema/update", Some(items_schema())).await;

        let bad = json!({
            "items": { "route": "/api/items", "fields": { "name": { "kind": "text" } } },
            "broken": { "route": "no-slash", "fields": { "x": { "kind": "text" } } }
        });
        let (status, body) = send(&app, "POST", "/api/schema/update", Some(bad)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (status, _) = send(&app, "POST", "/api/items", Some(json!({ "name": "still works" }))).await;
        assert_eq!(status, StatusCode::CREATED);
        let (_, schema) = send(&app, "GET", "/api/schema", None).await;
        assert_eq!(schema, items_schema());
    }

    #[tokio::test]
    async fn bogus_pagination_params_fall_back_to_defaults() {
        let app = test_app();
        send(&app, "POST", "/api/schema/update", Some(items_schema())).await;
        send(&app, "POST", "/api/items", Some(json!({ "name": "widget" }))).await;

        let (status, body) = send(&app, "GET", "/api/items?page=abc&limit=0", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pagination"]["page"], 1);
        assert_eq!(body["pagination"]["limit"], 10);
        assert_eq!(body["pagination"]["totalPages"], 1);
    }

    #[tokio::test]
    async fn health_reports_disabled_database_without_postgres() {
        let app = test_app();
        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["database"], "disabled");
        assert_eq!(body["entities"], 0);
    }

    #[tokio::test]
    async fn schema_update_swaps_routes_atomically() {
        let app = test_app();
        send(&app, "POST", "/api/schema/update", Some(items_schema())).await;

        let replacement = json!({
            "products": {
                "route": "/api/products",
                "fields": { "title": { "kind": "text", "required": true } }
            }
        });
        send(&app, "POST", "/api/schema/update", Some(replacement)).await;

        let (status, _) = send(&app, "GET", "/api/items", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, "GET", "/api/products", None).await;
        assert_eq!(status, StatusCode::OK);
    }
}
