use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

/// Standard success envelope: `{"success": true, "data": ..., "message": ...}`.
pub fn success_response<T: Serialize>(data: T, message: &str) -> Response {
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "data": data,
            "message": message,
        })),
    )
        .into_response()
}
