//! Prediction history handlers

use axum::{extract::State, Json};
use serde::Serialize;

use crate::models::LogEntry;
use crate::store::DEFAULT_HISTORY_LIMIT;
use crate::{AppResult, AppState};

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub success: bool,
    pub history: Vec<LogEntry>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub success: bool,
    pub message: &'static str,
}

/// Most recent predictions, newest first, never more than 100
pub async fn list(State(state): State<AppState>) -> AppResult<Json<HistoryResponse>> {
    let limit = state.config.history_limit.clamp(1, DEFAULT_HISTORY_LIMIT);
    let history = state.store.recent(limit).await?;

    Ok(Json(HistoryResponse {
        success: true,
        total: history.len(),
        history,
    }))
}

/// Delete all history
pub async fn clear(State(state): State<AppState>) -> AppResult<Json<ClearResponse>> {
    let removed = state.store.clear().await?;
    tracing::info!("Prediction history cleared ({} entries)", removed);

    Ok(Json(ClearResponse {
        success: true,
        message: "History cleared successfully",
    }))
}
