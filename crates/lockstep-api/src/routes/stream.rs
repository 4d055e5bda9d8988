use axum::{extract::State, http::StatusCode, Json};
use lockstep_core::coordinator::Command;
use lockstep_core::registry::ViewerCounts;
use lockstep_core::AppState;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct StartStreamRequest {
    pub file: usize,
}

async fn run_command(state: &AppState, command: Command) -> Result<Json<Value>, ApiError> {
    let message = state.coordinator.command(command).await?;
    Ok(Json(json!({ "message": message })))
}

/// Select a library file and make it the active stream. The outcome is a
/// human-readable message either way; a bad number or a missing media
/// directory is an operator mistake, not a transport failure.
pub async fn start_stream(
    State(state): State<AppState>,
    Json(req): Json<StartStreamRequest>,
) -> Result<Json<Value>, ApiError> {
    if req.file == 0 {
        return Err(ApiError::BadRequest("file numbers start at 1".to_string()));
    }
    run_command(&state, Command::StartStream { index: req.file }).await
}

pub async fn clear_stream(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    run_command(&state, Command::Clear).await
}

pub async fn play(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    run_command(&state, Command::Play).await
}

pub async fn pause(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    run_command(&state, Command::Pause).await
}

pub async fn resume(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    run_command(&state, Command::Resume).await
}

pub async fn force_play(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    run_command(&state, Command::ForcePlay).await
}

pub async fn viewer_counts(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<ViewerCounts>), ApiError> {
    let counts = state.coordinator.viewer_counts().await?;
    Ok((StatusCode::OK, Json(counts)))
}
