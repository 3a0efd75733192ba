// handlers/public/root.rs - GET / and GET /health

use axum::{extract::State, http::StatusCode, response::Json};
use chrono::Utc;
use serde_json::{json, Value};

use crate::app::AppState;

/// GET / - liveness banner
pub async fn root_get() -> Json<Value> {
    Json(json!({ "message": "Org Management Service Running" }))
}

/// GET /health - checks that the tenant directory is reachable
pub async fn health_get(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let timestamp = Utc::now().to_rfc3339();

    match state.orgs.directory().ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "timestamp": timestamp,
                "database": "ok",
                "storage": state.config.storage,
                "version": env!("CARGO_PKG_VERSION"),
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "error",
                    "timestamp": timestamp,
                    "database": "unavailable",
                    "storage": state.config.storage,
                })),
            )
        }
    }
}
