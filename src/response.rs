//! Standard response envelope helpers.

use axum::{http::StatusCode, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct SuccessOne<T> {
    pub success: bool,
    pub data: T,
}

#[derive(Serialize)]
pub struct SuccessMany<T> {
    pub success: bool,
    pub data: Vec<T>,
    pub pagination: Pagination,
}

#[derive(Serialize, Clone, Copy)]
pub struct Pagination {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    #[serde(rename = "totalPages")]
    pub total_pages: u64,
}

impl Pagination {
    pub fn new(total: u64, page: u32, limit: u32) -> Self {
        let total_pages = total.div_ceil(limit.max(1) as u64);
        Pagination {
            total,
            page,
            limit,
            total_pages,
        }
    }
}

pub fn success_one<T: Serialize>(data: T) -> (StatusCode, Json<SuccessOne<T>>) {
    (StatusCode::OK, Json(SuccessOne { success: true, data }))
}

pub fn success_created<T: Serialize>(data: T) -> (StatusCode, Json<SuccessOne<T>>) {
    (
        StatusCode::CREATED,
        Json(SuccessOne { success: true, data }),
    )
}

pub fn success_many<T: Serialize>(
    data: Vec<T>,
    pagination: Pagination,
) -> (StatusCode, Json<SuccessMany<T>>) {
    (
        StatusCode::OK,
        Json(SuccessMany {
            success: true,
            data,
            pagination,
        }),
    )
}

pub fn success_empty() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(serde_json::json!({ "success": true })))
}
