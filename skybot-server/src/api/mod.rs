use std::sync::Arc;

use axum::{
    handler::Handler,
    http::{StatusCode, Uri},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::json;

pub mod webhook;

pub use webhook::Webhook;

pub const HEALTH_URI: &str = "/health";

pub fn build(webhook: Arc<Webhook>) -> Router {
    Router::new()
        .route(HEALTH_URI, get(health_handler))
        .route(webhook.path(), post(webhook::receive))
        .layer(Extension(webhook))
        .fallback(not_found_handler.into_service())
}

async fn health_handler() -> &'static str {
    "UP"
}

async fn not_found_handler(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "result": "failure",
            "message": "not found",
            "uri": uri.to_string()
        })),
    )
}
