//! Axum router configuration with middleware.
//!
//! - `/` serves the chat widget and `/ws/chat` its WebSocket.
//! - `/health` is a bare liveness check.
//! - JSON endpoints live under `/api/v1/` and use the envelope format.
//!
//! Middleware: CORS, tracing.

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/models", get(handlers::models::list_models))
        .route("/models/{*id}", get(handlers::models::get_model))
        .fallback(handlers::widget::not_found);

    Router::new()
        .route("/", get(handlers::widget::index))
        .route("/health", get(health_check))
        .route("/ws/chat", get(handlers::chat_ws::chat_ws))
        .nest("/api/v1", api_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use secrecy::SecretString;
    use tower::ServiceExt;

    use streamchat_infra::llm::create_provider;
    use streamchat_types::config::{GEMINI_DEFAULT_MODEL, StreamchatConfig};
    use streamchat_types::llm::ProviderType;

    use super::*;

    fn test_router() -> Router {
        let config = StreamchatConfig::for_provider(ProviderType::Gemini);
        let provider =
            create_provider(&config.provider, SecretString::from("test-key")).unwrap();
        build_router(AppState::new(config, provider))
    }

    async fn get(uri: &str) -> (StatusCode, Option<String>, Vec<u8>) {
        let resp = test_router()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let content_type = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec();
        (status, content_type, body)
    }

    #[tokio::test]
    async fn test_health() {
        let (status, _, body) = get("/health").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_index_serves_widget() {
        let (status, content_type, body) = get("/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(content_type.unwrap().starts_with("text/html"));
        let html = String::from_utf8(body).unwrap();
        assert!(html.contains("/ws/chat"));
    }

    #[tokio::test]
    async fn test_list_models() {
        let (status, _, body) = get("/api/v1/models").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["data"]["provider"], "gemini");
        assert_eq!(json["data"]["default_model"], GEMINI_DEFAULT_MODEL);
        assert_eq!(json["data"]["models"].as_array().unwrap().len(), 3);
        assert_eq!(json["_links"]["self"], "/api/v1/models");
        assert!(json["meta"]["request_id"].is_string());
    }

    #[tokio::test]
    async fn test_get_model() {
        let (status, _, body) = get(&format!("/api/v1/models/{GEMINI_DEFAULT_MODEL}")).await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["data"]["id"], GEMINI_DEFAULT_MODEL);
        assert_eq!(json["data"]["is_default"], true);

        let (status, _, body) = get("/api/v1/models/gpt-4o").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["errors"][0]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_unknown_api_path_uses_envelope() {
        let (status, content_type, body) = get("/api/v1/bots").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(content_type.as_deref(), Some("application/json"));
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["errors"][0]["code"], "NOT_FOUND");
        assert!(json.get("data").is_none());
    }
}
