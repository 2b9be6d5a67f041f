//! Chat handler

use axum::{extract::State, Json};
use tracing::instrument;

use crate::{extract::AppJson, AppState};
use personaiq_common::{
    api::{ChatRequest, ChatResponse},
    errors::Result,
};

/// `POST /api/chat`
#[instrument(skip(state, request))]
pub async fn chat(
    State(state): State<AppState>,
    AppJson(request): AppJson<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    let response = state.services.chat.chat(request).await?;
    Ok(Json(response))
}
