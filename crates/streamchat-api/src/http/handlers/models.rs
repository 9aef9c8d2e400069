//! Model list handlers.

use std::time::Instant;

use axum::Json;
use axum::extract::{Path, State};
use serde::Serialize;

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ModelList {
    pub provider: String,
    pub default_model: String,
    pub models: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub provider: String,
    pub is_default: bool,
}

/// GET /api/v1/models
pub async fn list_models(State(state): State<AppState>) -> Json<ApiResponse<ModelList>> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let data = ModelList {
        provider: state.controller.provider().name().to_string(),
        default_model: state.default_model().to_string(),
        models: state.models().to_vec(),
    };

    let elapsed = start.elapsed().as_millis() as u64;
    Json(ApiResponse::success(data, request_id, elapsed).with_link("self", "/api/v1/models"))
}

/// GET /api/v1/models/{id}
///
/// Model ids may contain `/` (OpenRouter's `vendor/model`), so the route
/// captures the rest of the path.
pub async fn get_model(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ModelInfo>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    if !state.config.provider.is_model_allowed(&id) {
        return Err(AppError::NotFound(format!("Model '{id}' is not available")));
    }

    let data = ModelInfo {
        is_default: id == state.default_model(),
        provider: state.controller.provider().name().to_string(),
        id,
    };

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(data, request_id, elapsed)))
}
