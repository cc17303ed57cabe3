//! Feature layout handler

use axum::Json;

use crate::schema::LayoutInfo;

/// List the features required by `/predict`
pub async fn list() -> Json<LayoutInfo> {
    Json(LayoutInfo::current())
}
