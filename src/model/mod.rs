mod gemma;
mod gemma2;
mod mistral;

pub use gemma::GemmaChatModel;
pub use gemma2::Gemma2ChatModel;
pub use mistral::MistralChatModel;

use std::path::Path;

use candle_core::{DType, Device, Tensor};
use tracing::info;

use crate::error::Result;
use crate::hub::ModelFiles;

/// A causal LM that produces next-token logits. The KV cache makes
/// `forward` stateful, so callers must serialize access per handle.
pub trait LanguageModel: Send + Sync {
    fn forward(&mut self, input_ids: &Tensor, position: usize) -> Result<Tensor>;

    fn reset_cache(&mut self);

    fn eos_token_id(&self) -> u32;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelArchitecture {
    Mistral,
    Gemma,
    Gemma2,
}

/// Read the architecture out of the model's `config.json`, checking the
/// `architectures` list first and `model_type` second. Unrecognized
/// configs are treated as mistral-compatible.
pub fn detect_architecture(config_path: &Path) -> Result<ModelArchitecture> {
    let raw = std::fs::read_to_string(config_path)?;
    let config: serde_json::Value = serde_json::from_str(&raw)?;

    let mut names: Vec<String> = Vec::new();
    if let Some(archs) = config.get("architectures").and_then(|v| v.as_array()) {
        names.extend(archs.iter().filter_map(|v| v.as_str().map(str::to_lowercase)));
    }
    if let Some(model_type) = config.get("model_type").and_then(|v| v.as_str()) {
        names.push(model_type.to_lowercase());
    }

    for name in &names {
        if name.contains("gemma2") {
            return Ok(ModelArchitecture::Gemma2);
        }
        if name.contains("gemma") {
            return Ok(ModelArchitecture::Gemma);
        }
        if name.contains("mistral") {
            return Ok(ModelArchitecture::Mistral);
        }
    }

    Ok(ModelArchitecture::Mistral)
}

/// Load the backend matching the detected architecture.
pub fn build_model(
    architecture: ModelArchitecture,
    files: &ModelFiles,
    device: &Device,
) -> Result<Box<dyn LanguageModel>> {
    info!(?architecture, "building model");

    Ok(match architecture {
        ModelArchitecture::Mistral => {
            Box::new(MistralChatModel::load(&files.config, &files.weights, device)?)
        }
        ModelArchitecture::Gemma => {
            Box::new(GemmaChatModel::load(&files.config, &files.weights, device)?)
        }
        ModelArchitecture::Gemma2 => {
            Box::new(Gemma2ChatModel::load(&files.config, &files.weights, device)?)
        }
    })
}

/// Half precision on accelerators, full precision on the CPU.
pub(crate) fn weight_dtype(device: &Device) -> DType {
    if device.is_cuda() {
        DType::BF16
    } else {
        DType::F32
    }
}

/// `eos_token_id` in hub configs is either a number or a list of numbers.
pub(crate) fn eos_from_config(config: &serde_json::Value, fallback: u32) -> u32 {
    config
        .get("eos_token_id")
        .and_then(|v| {
            v.as_u64()
                .or_else(|| v.as_array().and_then(|arr| arr.first()?.as_u64()))
        })
        .unwrap_or(u64::from(fallback)) as u32
}
