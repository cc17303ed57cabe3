//! Prediction handler
//!
//! Validate → score the whole batch in one classifier call → format →
//! append to history in one transaction → respond.

use std::time::Instant;

use axum::{body::Bytes, extract::State, Json};
use serde::Serialize;
use serde_json::Value;

use crate::features::{extract_rows, RawRow};
use crate::models::{NewLogEntry, PredictionResult};
use crate::{AppError, AppResult, AppState};

/// Request body: one row, or a batch of rows
#[derive(Debug, Clone, PartialEq)]
pub enum PredictInput {
    Single(RawRow),
    Batch(Vec<RawRow>),
}

impl PredictInput {
    pub fn parse(body: &[u8]) -> AppResult<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(AppError::EmptyBody);
        }

        let value: Value = serde_json::from_slice(body)
            .map_err(|e| AppError::MalformedBody(format!("Invalid JSON: {}", e)))?;

        match value {
            Value::Null => Err(AppError::EmptyBody),
            Value::Object(row) if row.is_empty() => Err(AppError::EmptyBody),
            Value::Object(row) => Ok(PredictInput::Single(row)),
            Value::Array(items) if items.is_empty() => Err(AppError::EmptyBody),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(row) => Ok(row),
                    _ => Err(AppError::MalformedBody(
                        "Each item in the batch must be a JSON object".to_string(),
                    )),
                })
                .collect::<AppResult<Vec<_>>>()
                .map(PredictInput::Batch),
            _ => Err(AppError::MalformedBody(
                "Expected a JSON object or an array of JSON objects".to_string(),
            )),
        }
    }

    pub fn rows(&self) -> &[RawRow] {
        match self {
            PredictInput::Single(row) => std::slice::from_ref(row),
            PredictInput::Batch(rows) => rows,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum PredictResponse {
    Single {
        success: bool,
        prediction: PredictionResult,
    },
    Batch {
        success: bool,
        predictions: Vec<PredictionResult>,
    },
}

/// Predict attack type for one row or a batch
pub async fn predict(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<Json<PredictResponse>> {
    let input = PredictInput::parse(&body)?;
    let vectors = extract_rows(input.rows())?;

    let started = Instant::now();
    let classifier = state.model.classifier.clone();
    let (vectors, scores) = tokio::task::spawn_blocking(move || {
        let scores = classifier.score(&vectors);
        (vectors, scores)
    })
    .await
    .map_err(|e| AppError::Internal(format!("Scoring task failed: {}", e)))?;
    let scores = scores?;

    let results: Vec<PredictionResult> = scores.iter().map(PredictionResult::from_score).collect();

    let entries: Vec<NewLogEntry> = results
        .iter()
        .cloned()
        .zip(vectors)
        .map(|(prediction, input_data)| NewLogEntry::now(prediction, input_data))
        .collect();
    state.store.append_batch(entries).await?;

    tracing::debug!(
        "Scored {} row(s) in {:?}",
        results.len(),
        started.elapsed()
    );

    let response = match input {
        PredictInput::Single(_) => {
            let prediction = results
                .into_iter()
                .next()
                .ok_or_else(|| AppError::Internal("Classifier returned no prediction".to_string()))?;
            PredictResponse::Single {
                success: true,
                prediction,
            }
        }
        PredictInput::Batch(_) => PredictResponse::Batch {
            success: true,
            predictions: results,
        },
    };

    Ok(Json(response))
}
