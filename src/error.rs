//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Schema-compile-time errors. Fatal to the submitted update, never to the
/// running system: the last-good schema and route table stay active.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("entity '{entity}': field '{field}' has unknown kind '{kind}'")]
    InvalidFieldKind {
        entity: String,
        field: String,
        kind: String,
    },
    #[error("entity '{entity}': field '{field}': {reason}")]
    InvalidDefault {
        entity: String,
        field: String,
        reason: String,
    },
    #[error("entity '{entity}': {reason}")]
    InvalidEntityConfig { entity: String, reason: String },
    #[error("entities '{first}' and '{second}' collapse to the same model name '{model}'")]
    ModelNameCollision {
        model: String,
        first: String,
        second: String,
    },
}

/// Request-time errors, recovered per request.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("Item not found")]
    NotFound,
    #[error("{0}")]
    Validation(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("storage handle for model '{0}' was superseded by a schema update")]
    StaleHandle(String),
    #[error("backend timed out")]
    BackendTimeout,
    #[error("a schema update is already in progress")]
    UpdateInProgress,
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Schema(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::StaleHandle(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::BackendTimeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::UpdateInProgress => StatusCode::CONFLICT,
            AppError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = serde_json::json!({
            "success": false,
            "error": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}
