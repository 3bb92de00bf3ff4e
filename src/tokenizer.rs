use std::path::Path;

use tokenizers::Tokenizer;
use tracing::info;

use crate::error::{Result, ServeError};

/// Thin wrapper mapping `tokenizers` errors into ours.
pub struct TokenizerWrapper {
    tokenizer: Tokenizer,
}

impl TokenizerWrapper {
    pub fn load(path: &Path) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(path)
            .map_err(|e| ServeError::Tokenizer(e.to_string()))?;

        info!(vocab = tokenizer.get_vocab_size(true), "tokenizer loaded");
        Ok(Self { tokenizer })
    }

    pub fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| ServeError::Tokenizer(e.to_string()))?;

        Ok(encoding.get_ids().to_vec())
    }

    pub fn decode(&self, ids: &[u32]) -> Result<String> {
        self.tokenizer
            .decode(ids, true)
            .map_err(|e| ServeError::Tokenizer(e.to_string()))
    }

    pub fn vocab_size(&self) -> usize {
        self.tokenizer.get_vocab_size(true)
    }

    /// End-of-sequence id, probing the token spellings common across the
    /// model families we load.
    pub fn eos_token_id(&self) -> Option<u32> {
        self.tokenizer
            .token_to_id("</s>")
            .or_else(|| self.tokenizer.token_to_id("<|endoftext|>"))
            .or_else(|| self.tokenizer.token_to_id("<eos>"))
    }
}
