use std::sync::{Arc, Mutex};
use std::time::Instant;

use candle_core::{Device, Tensor};
use candle_transformers::utils::apply_repeat_penalty;
use tracing::debug;

use crate::config::{SamplingParams, FALLBACK_REPLY, MIN_REPLY_CHARS};
use crate::error::{Result, ServeError};
use crate::model::LanguageModel;
use crate::sampling::{last_token_logits, Sampler};
use crate::tokenizer::TokenizerWrapper;

/// Text-level generation: a user message in, decoded text out. The HTTP
/// layer and the retry policy only ever see this trait, never tensors.
pub trait TextGenerator: Send + Sync {
    fn generate(&self, message: &str, params: &SamplingParams) -> Result<String>;
}

/// Chat facade over a generator: runs the primary sampling attempt, one
/// resample when the output is blank or degenerate, and the fixed
/// fallback when both come back empty.
pub struct ChatEngine {
    generator: Arc<dyn TextGenerator>,
    primary: SamplingParams,
    retry: SamplingParams,
}

impl ChatEngine {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        primary: SamplingParams,
        retry: SamplingParams,
    ) -> Self {
        Self {
            generator,
            primary,
            retry,
        }
    }

    pub fn reply(&self, message: &str) -> Result<String> {
        let first = self.generator.generate(message, &self.primary)?;
        let first = first.trim();
        if first.chars().count() >= MIN_REPLY_CHARS {
            return Ok(first.to_string());
        }

        debug!(chars = first.chars().count(), "short reply, resampling once");
        let second = self.generator.generate(message, &self.retry)?;
        let second = second.trim();
        if second.is_empty() {
            Ok(FALLBACK_REPLY.to_string())
        } else {
            Ok(second.to_string())
        }
    }
}

/// Candle-backed generator. `forward` mutates the KV cache, so passes are
/// serialized behind the mutex; concurrent callers queue here.
pub struct CandleGenerator {
    model: Mutex<Box<dyn LanguageModel>>,
    tokenizer: TokenizerWrapper,
    device: Device,
}

impl CandleGenerator {
    pub fn new(model: Box<dyn LanguageModel>, tokenizer: TokenizerWrapper, device: Device) -> Self {
        Self {
            model: Mutex::new(model),
            tokenizer,
            device,
        }
    }
}

impl TextGenerator for CandleGenerator {
    fn generate(&self, message: &str, params: &SamplingParams) -> Result<String> {
        let mut model = self
            .model
            .lock()
            .map_err(|_| ServeError::Generation("model lock poisoned".to_string()))?;

        model.reset_cache();

        let mut tokens = self.tokenizer.encode(message)?;
        if tokens.is_empty() {
            return Err(ServeError::Generation(
                "message produced no tokens".to_string(),
            ));
        }

        // Close the user turn with the end-of-sequence marker so the model
        // replies instead of continuing the message.
        let eos = self
            .tokenizer
            .eos_token_id()
            .unwrap_or_else(|| model.eos_token_id());
        tokens.push(eos);
        let prompt_len = tokens.len();

        let mut sampler = Sampler::new(params);
        let mut generated: Vec<u32> = Vec::new();

        let start = Instant::now();
        let input = Tensor::new(tokens.as_slice(), &self.device)?.unsqueeze(0)?;
        let mut logits = model.forward(&input, 0)?;

        for step in 0..params.max_tokens {
            let last = last_token_logits(&logits)?;
            let last = if params.repeat_penalty == 1.0 {
                last
            } else {
                apply_repeat_penalty(&last, params.repeat_penalty, &tokens)?
            };

            let next = sampler.sample(&last)?;
            if next == eos || next == model.eos_token_id() {
                break;
            }

            generated.push(next);
            tokens.push(next);

            let input = Tensor::new(&[next], &self.device)?.unsqueeze(0)?;
            logits = model.forward(&input, prompt_len + step)?;
        }

        let text = self.tokenizer.decode(&generated)?;
        debug!(
            tokens = generated.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "generation finished"
        );

        Ok(text)
    }
}
