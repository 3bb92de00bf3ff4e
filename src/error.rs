use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Internal failures on the loading and inference side.
#[derive(Error, Debug)]
pub enum ServeError {
    #[error("model loading error: {0}")]
    ModelLoad(String),

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("generation error: {0}")]
    Generation(String),

    #[error("hub error: {0}")]
    Hub(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("candle error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ServeError>;

/// Failures surfaced to HTTP callers. Everything maps to a structured
/// JSON body; nothing propagates as a handler panic.
#[derive(Debug)]
pub enum ApiError {
    /// Missing or blank input.
    BadRequest(String),
    /// Model still loading (or failed to load); `stage` is the current
    /// loading status text.
    NotReady { stage: String },
    /// Generation blew up inside the model call.
    Generation(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "error": message })),
            )
                .into_response(),
            ApiError::NotReady { stage } => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": format!("Model is not ready yet. Status: {stage}"),
                    "loading": true,
                })),
            )
                .into_response(),
            ApiError::Generation(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "error": format!("Internal error: {message}"),
                })),
            )
                .into_response(),
        }
    }
}
