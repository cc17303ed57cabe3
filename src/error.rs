//! Error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::classifier::ModelError;
use crate::features::FeatureError;
use crate::models::LogError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    // Validation errors
    #[error("No data provided")]
    EmptyBody,

    #[error("{0}")]
    MalformedBody(String),

    #[error("Missing required features: {}", .0.join(", "))]
    MissingFeatures(Vec<String>),

    #[error("Invalid feature values: {}", .0.join(", "))]
    InvalidFeatures(Vec<String>),

    // Database errors
    #[error("{0}")]
    Storage(String),

    // Generic errors
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::EmptyBody | AppError::MalformedBody(_) => {
                (StatusCode::BAD_REQUEST, json!({ "error": self.to_string() }))
            }
            AppError::MissingFeatures(names) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "Missing required features",
                    "missing_features": names,
                }),
            ),
            AppError::InvalidFeatures(names) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "Invalid feature values",
                    "invalid_features": names,
                }),
            ),
            AppError::Storage(msg) => {
                tracing::error!("Storage error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": msg }))
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": msg }))
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<FeatureError> for AppError {
    fn from(err: FeatureError) -> Self {
        match err {
            FeatureError::Missing(names) => AppError::MissingFeatures(names),
            FeatureError::Invalid(names) => AppError::InvalidFeatures(names),
        }
    }
}

impl From<LogError> for AppError {
    fn from(err: LogError) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<ModelError> for AppError {
    fn from(err: ModelError) -> Self {
        AppError::Internal(err.to_string())
    }
}
