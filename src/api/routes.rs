use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::info;
use uuid::Uuid;

use super::types::*;
use crate::device::{describe_device, device_label};
use crate::error::ApiError;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/chat", post(chat))
        .route("/status", get(status))
        .route("/favicon.ico", get(favicon))
        .route("/debug", get(debug_info))
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(include_str!("../../static/index.html"))
}

async fn favicon() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let request_id = Uuid::new_v4();

    // Load status comes first: while the model is loading every request
    // gets the 503, even one with a blank message.
    let Some(engine) = state.engine() else {
        return Err(ApiError::NotReady {
            stage: state.status().await.describe(),
        });
    };

    let message = request.message.trim().to_string();
    if message.is_empty() {
        return Err(ApiError::BadRequest(
            "Message must not be empty".to_string(),
        ));
    }

    info!(%request_id, chars = message.len(), "chat request");

    // Generation is CPU-bound and can take seconds; keep it off the
    // async workers.
    let reply = tokio::task::spawn_blocking(move || engine.reply(&message))
        .await
        .map_err(|e| ApiError::Generation(format!("generation task panicked: {e}")))?
        .map_err(|e| ApiError::Generation(e.to_string()))?;

    info!(%request_id, chars = reply.len(), "chat reply ready");

    Ok(Json(ChatResponse {
        success: true,
        response: reply,
        model: format!("{} (Local)", state.model_id),
        device: device_label(&state.device),
    }))
}

async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let status = state.status().await;

    Json(StatusResponse {
        model_loaded: status.is_ready(),
        loading_status: status.describe(),
        model_name: state.model_id.clone(),
        device_info: describe_device(&state.device),
        status: if status.is_ready() {
            "online"
        } else if status.is_failed() {
            "error"
        } else {
            "loading"
        },
    })
}

async fn debug_info(State(state): State<Arc<AppState>>) -> Json<DebugResponse> {
    let status = state.status().await;

    let mut system = sysinfo::System::new();
    system.refresh_memory();
    let memory_used_percent = if system.total_memory() > 0 {
        system.used_memory() as f32 / system.total_memory() as f32 * 100.0
    } else {
        0.0
    };

    Json(DebugResponse {
        server_version: env!("CARGO_PKG_VERSION"),
        model_loaded: status.is_ready(),
        loading_status: status.describe(),
        device: device_label(&state.device),
        memory_used_percent,
        cpu_count: std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1),
        uptime_seconds: state.uptime_seconds(),
    })
}
