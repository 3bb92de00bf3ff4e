use std::collections::BTreeSet;
use std::path::PathBuf;

use hf_hub::api::sync::{Api, ApiBuilder, ApiRepo};
use hf_hub::{Repo, RepoType};
use tracing::info;

use crate::error::{Result, ServeError};

pub struct ModelFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: Vec<PathBuf>,
}

/// Download config, tokenizer and weights from the Hugging Face Hub.
/// Blocking; run on the blocking thread pool.
pub fn fetch_model_files(
    model_id: &str,
    revision: &str,
    token: Option<&str>,
) -> Result<ModelFiles> {
    info!(model = model_id, revision, "fetching model files");

    let api = match token {
        Some(t) => ApiBuilder::new()
            .with_token(Some(t.to_string()))
            .build()
            .map_err(|e| ServeError::Hub(e.to_string()))?,
        None => Api::new().map_err(|e| ServeError::Hub(e.to_string()))?,
    };

    let repo = api.repo(Repo::with_revision(
        model_id.to_string(),
        RepoType::Model,
        revision.to_string(),
    ));

    let config = repo
        .get("config.json")
        .map_err(|e| ServeError::Hub(format!("failed to fetch config.json: {e}")))?;

    let tokenizer = repo
        .get("tokenizer.json")
        .map_err(|e| ServeError::Hub(format!("failed to fetch tokenizer.json: {e}")))?;

    let weights = fetch_weights(&repo)?;

    info!(weight_files = weights.len(), "model files fetched");

    Ok(ModelFiles {
        config,
        tokenizer,
        weights,
    })
}

fn fetch_weights(repo: &ApiRepo) -> Result<Vec<PathBuf>> {
    // Single-file checkpoints first.
    if let Ok(path) = repo.get("model.safetensors") {
        return Ok(vec![path]);
    }

    // Sharded checkpoints list their shards in the index file.
    if let Ok(index_path) = repo.get("model.safetensors.index.json") {
        let raw = std::fs::read_to_string(index_path)?;
        let index: serde_json::Value = serde_json::from_str(&raw)?;

        let shards: BTreeSet<String> = index
            .get("weight_map")
            .and_then(|m| m.as_object())
            .map(|m| {
                m.values()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        if !shards.is_empty() {
            return shards
                .iter()
                .map(|name| {
                    repo.get(name).map_err(|e| {
                        ServeError::Hub(format!("failed to fetch shard {name}: {e}"))
                    })
                })
                .collect();
        }
    }

    Err(ServeError::Hub(
        "no safetensors weights found (tried model.safetensors and the shard index)"
            .to_string(),
    ))
}
