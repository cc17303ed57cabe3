//! Traffic Classifier API
//!
//! Serves a pre-trained attack-type classifier (DDoS / Intrusion / Malware)
//! over HTTP and keeps a history of every prediction.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    TRAFFIC CLASSIFIER                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐  ┌──────────────┐  ┌──────────────────────┐ │
//! │  │  API      │  │  Feature     │  │  Classifier          │ │
//! │  │  (Axum)   │─▶│  Schema      │─▶│  (GBDT dump / ONNX)  │ │
//! │  └─────┬─────┘  └──────────────┘  └──────────────────────┘ │
//! │        ▼                                                    │
//! │  ┌─────────────┐                                            │
//! │  │ SQLite log  │  predictions (append / recent / clear)     │
//! │  └─────────────┘                                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod classifier;
pub mod config;
pub mod converter;
pub mod db;
pub mod error;
pub mod features;
pub mod handlers;
pub mod models;
pub mod schema;
pub mod store;

#[cfg(test)]
mod test_support;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use error::{AppError, AppResult};

use classifier::ModelHandle;
use config::Config;
use store::LogStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: LogStore,
    pub model: ModelHandle,
    pub config: Config,
}

/// Create the main router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::meta::home))
        .route("/health", get(handlers::health::check))
        .route("/features", get(handlers::features::list))
        .route("/predict", post(handlers::predict::predict))
        .route("/history", get(handlers::history::list))
        .route("/history/clear", post(handlers::history::clear))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
