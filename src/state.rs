use std::sync::Arc;
use std::time::Instant;

use candle_core::Device;
use tokio::sync::{OnceCell, RwLock};

use crate::engine::ChatEngine;

/// Lifecycle of the one-time model load. Written only by the loader task,
/// read by every handler.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadStatus {
    NotStarted,
    Loading { stage: String },
    Ready,
    Failed { message: String },
}

impl LoadStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, LoadStatus::Ready)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, LoadStatus::Failed { .. })
    }

    /// Human-readable status line for `/status` and 503 bodies.
    pub fn describe(&self) -> String {
        match self {
            LoadStatus::NotStarted => "load not started".to_string(),
            LoadStatus::Loading { stage } => stage.clone(),
            LoadStatus::Ready => "model ready".to_string(),
            LoadStatus::Failed { message } => format!("load failed: {message}"),
        }
    }
}

/// Process-wide state shared by the loader and the handlers.
///
/// The engine cell is the handoff point: the loader sets it exactly once,
/// handlers read it atomically, and a handler never reaches the model
/// through any other path. The status lock carries the progress text.
pub struct AppState {
    pub model_id: String,
    pub device: Device,
    status: RwLock<LoadStatus>,
    engine: OnceCell<Arc<ChatEngine>>,
    started_at: Instant,
}

impl AppState {
    pub fn new(model_id: String, device: Device) -> Self {
        Self {
            model_id,
            device,
            status: RwLock::new(LoadStatus::NotStarted),
            engine: OnceCell::new(),
            started_at: Instant::now(),
        }
    }

    pub async fn status(&self) -> LoadStatus {
        self.status.read().await.clone()
    }

    pub async fn set_status(&self, status: LoadStatus) {
        *self.status.write().await = status;
    }

    /// Publish the loaded engine. Returns false if an engine was already
    /// published; the first one wins and keeps serving.
    pub fn publish(&self, engine: Arc<ChatEngine>) -> bool {
        self.engine.set(engine).is_ok()
    }

    pub fn engine(&self) -> Option<Arc<ChatEngine>> {
        self.engine.get().cloned()
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
