//! Health check handler

use axum::{extract::State, Json};
use serde::Serialize;

use crate::classifier::ModelInfo;
use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    model_loaded: bool,
    model: ModelInfo,
    timestamp: i64,
}

/// The server only starts once the model is loaded, so this is always true
pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        model_loaded: true,
        model: state.model.info.clone(),
        timestamp: chrono::Utc::now().timestamp(),
    })
}
