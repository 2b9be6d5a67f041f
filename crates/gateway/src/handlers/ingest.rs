//! Ingestion handler

use axum::{extract::State, Json};
use tracing::instrument;

use crate::{extract::AppJson, AppState};
use personaiq_common::{
    api::{IngestRequest, IngestResponse},
    errors::Result,
};

/// `POST /api/ingest`
#[instrument(skip(state, request))]
pub async fn ingest(
    State(state): State<AppState>,
    AppJson(request): AppJson<IngestRequest>,
) -> Result<Json<IngestResponse>> {
    let response = state.services.ingest.ingest(request).await?;
    Ok(Json(response))
}
