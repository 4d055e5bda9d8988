use axum::{extract::State, Json};
use lockstep_core::AppState;
use serde_json::{json, Value};

use crate::error::ApiError;

/// Numbered listing of playable files. The numbers are what the stream
/// selection endpoint accepts, so the two views must come from the same
/// scan order.
pub async fn list_library(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let files = state.library.scan()?;
    let entries: Vec<Value> = files
        .iter()
        .enumerate()
        .map(|(i, path)| json!({ "number": i + 1, "path": path }))
        .collect();
    Ok(Json(json!({ "files": entries })))
}
