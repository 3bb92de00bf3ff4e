use serde::{Deserialize, Serialize};

use crate::device::DeviceInfo;

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub success: bool,
    pub response: String,
    pub model: String,
    pub device: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub model_loaded: bool,
    pub loading_status: String,
    pub model_name: String,
    pub device_info: DeviceInfo,
    pub status: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct DebugResponse {
    pub server_version: &'static str,
    pub model_loaded: bool,
    pub loading_status: String,
    pub device: String,
    pub memory_used_percent: f32,
    pub cpu_count: usize,
    pub uptime_seconds: u64,
}
