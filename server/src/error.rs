use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use room_core::RoomError;
use speech_core::SynthesisError;

/// Message returned to callers for any synthesis failure. The underlying
/// cause only goes to the log.
pub const SPEECH_FAILURE_MESSAGE: &str = "Failed to fetch speech audio";

/// API Error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Speech synthesis error: {0}")]
    SpeechFailed(#[from] SynthesisError),

    #[error("Room service error: {0}")]
    RoomFailed(#[from] RoomError),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

/// Error response structure
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::SpeechFailed(e) => {
                tracing::error!(
                    error = %e,
                    upstream_rejected = e.is_upstream_rejection(),
                    "Error fetching speech audio"
                );
                (StatusCode::INTERNAL_SERVER_ERROR, SPEECH_FAILURE_MESSAGE.to_string())
            }
            ApiError::RoomFailed(RoomError::MissingRoomUrl) => (
                StatusCode::BAD_REQUEST,
                RoomError::MissingRoomUrl.to_string(),
            ),
            ApiError::RoomFailed(e) => {
                tracing::error!(error = %e, "Room service error");
                (StatusCode::BAD_GATEWAY, "Room service request failed".to_string())
            }
            ApiError::NotConfigured(what) => (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("{what} is not configured"),
            ),
        };

        (status, Json(ErrorResponse { error: error_message })).into_response()
    }
}
