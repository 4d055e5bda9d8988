use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found")]
    NotFound,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("service unavailable: {0}")]
    Unavailable(String),
    #[error("rate limited")]
    RateLimited,
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            ApiError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "rate limited".to_string()),
            ApiError::Internal(err) => {
                tracing::error!("API internal error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message, "message": message }))).into_response()
    }
}

impl From<lockstep_core::error::CoreError> for ApiError {
    fn from(e: lockstep_core::error::CoreError) -> Self {
        use lockstep_core::error::CoreError;
        match e {
            CoreError::LibraryUnavailable => {
                ApiError::Unavailable("video directory not configured".to_string())
            }
            CoreError::BadIndex(index) => {
                ApiError::BadRequest(format!("no video file with number {index}"))
            }
            CoreError::Io(_) => ApiError::Internal(anyhow::anyhow!("media directory error")),
            CoreError::CoordinatorClosed => {
                ApiError::Unavailable("sync coordinator has shut down".to_string())
            }
        }
    }
}
