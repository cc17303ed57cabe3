//! Service metadata handler

use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct Endpoint {
    path: &'static str,
    method: &'static str,
    description: &'static str,
}

#[derive(Serialize)]
pub struct ServiceInfo {
    message: &'static str,
    version: &'static str,
    endpoints: Vec<Endpoint>,
}

const ENDPOINTS: &[(&str, &str, &str)] = &[
    ("/", "GET", "Service metadata"),
    ("/health", "GET", "Health check"),
    ("/features", "GET", "Required feature names"),
    ("/predict", "POST", "Predict attack type for one row or a batch"),
    ("/history", "GET", "Most recent predictions"),
    ("/history/clear", "POST", "Delete prediction history"),
];

pub async fn home() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        message: "Cybersecurity Attack Classification API",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: ENDPOINTS
            .iter()
            .map(|&(path, method, description)| Endpoint { path, method, description })
            .collect(),
    })
}
