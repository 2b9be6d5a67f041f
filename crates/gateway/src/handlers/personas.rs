//! Persona registry handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::instrument;

use crate::{extract::AppJson, AppState};
use personaiq_common::{
    api::{CreatePersonaRequest, PersonaList, PersonaSummary},
    errors::Result,
};

/// `GET /api/personas`
pub async fn list_personas(State(state): State<AppState>) -> Result<Json<PersonaList>> {
    Ok(Json(state.services.personas.list().await?))
}

/// `POST /api/personas`
#[instrument(skip(state, request))]
pub async fn create_persona(
    State(state): State<AppState>,
    AppJson(request): AppJson<CreatePersonaRequest>,
) -> Result<(StatusCode, Json<PersonaSummary>)> {
    let created = state.services.personas.create(request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /api/personas/{id}`
pub async fn get_persona(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PersonaSummary>> {
    Ok(Json(state.services.personas.get(&id).await?))
}

/// `DELETE /api/personas/{id}`
#[instrument(skip(state))]
pub async fn delete_persona(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.services.personas.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
