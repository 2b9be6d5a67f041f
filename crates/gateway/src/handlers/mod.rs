//! API handlers module

pub mod chat;
pub mod health;
pub mod ingest;
pub mod personas;

use personaiq_common::errors::AppError;

/// JSON 404 for unknown API paths
pub async fn not_found(uri: axum::http::Uri) -> AppError {
    AppError::NotFound {
        resource_type: "route".to_string(),
        id: uri.path().to_string(),
    }
}
