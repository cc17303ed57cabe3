//! Traffic Classifier API server

use std::net::SocketAddr;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use traffic_classifier::{
    classifier::load_classifier, config::Config, create_router, store::LogStore, AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before anything reads the environment
    dotenvy::dotenv().ok();

    // Initialize logging
    let json_logs = std::env::var("LOG_FORMAT").map(|f| f == "json").unwrap_or(false);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "traffic_classifier=debug,tower_http=debug".into()))
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(|| tracing_subscriber::fmt::layer()))
        .init();

    let config = Config::from_env();

    tracing::info!(
        production = config.is_production(),
        "Traffic Classifier API starting ({})...",
        config.environment
    );
    tracing::info!("Model: {}", config.model_path.display());
    tracing::info!("Database: {}", config.database_path.display());

    // A missing or unreadable model is fatal: never serve without one
    let model = load_classifier(&config.model_path)
        .with_context(|| format!("Failed to load classifier from {}", config.model_path.display()))?;

    let store = LogStore::open(&config.database_path)
        .with_context(|| format!("Failed to open database {}", config.database_path.display()))?;

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.host, config.port))?;

    let state = AppState {
        store,
        model,
        config,
    };

    let app = create_router(state);

    tracing::info!("🚀 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
