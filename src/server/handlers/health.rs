use std::sync::Arc;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde_json::json;

use crate::state::AppState;
use crate::core::errors::ApiError;

pub async fn health(State(_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let model_available = state.qa.model_available().await;
    let status = if model_available { "ok" } else { "degraded" };
    Ok(Json(json!({
        "status": status,
        "model": {
            "provider": state.provider.name(),
            "name": state.provider.model(),
            "available": model_available
        },
        "index_backend": state.qa.index_backend(),
        "timestamp": Utc::now().to_rfc3339()
    })))
}
