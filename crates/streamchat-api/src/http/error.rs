//! Application error type mapping to HTTP status codes and envelope format.

use axum::response::{IntoResponse, Response};

use super::response::ApiResponse;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (code, message) = match &self {
            AppError::NotFound(msg) => ("NOT_FOUND", msg.as_str()),
        };
        tracing::debug!(code, message, "Request failed");
        ApiResponse::error(code, message, uuid::Uuid::now_v7().to_string(), 0).into_response()
    }
}
