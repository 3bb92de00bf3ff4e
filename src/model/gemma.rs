use std::path::{Path, PathBuf};

use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::gemma::{Config, Model};
use tracing::info;

use super::{eos_from_config, weight_dtype, LanguageModel};
use crate::error::Result;

pub struct GemmaChatModel {
    model: Model,
    eos_token_id: u32,
}

impl GemmaChatModel {
    pub fn load(config_path: &Path, weight_paths: &[PathBuf], device: &Device) -> Result<Self> {
        let raw = std::fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&raw)?;
        let eos_token_id = eos_from_config(&serde_json::from_str(&raw)?, 1);

        info!(
            vocab_size = config.vocab_size,
            hidden_size = config.hidden_size,
            layers = config.num_hidden_layers,
            "loading gemma weights"
        );

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(weight_paths, weight_dtype(device), device)?
        };
        let model = Model::new(false, &config, vb)?;

        Ok(Self {
            model,
            eos_token_id,
        })
    }
}

impl LanguageModel for GemmaChatModel {
    fn forward(&mut self, input_ids: &Tensor, position: usize) -> Result<Tensor> {
        Ok(self.model.forward(input_ids, position)?)
    }

    fn reset_cache(&mut self) {
        self.model.clear_kv_cache();
    }

    fn eos_token_id(&self) -> u32 {
        self.eos_token_id
    }
}
