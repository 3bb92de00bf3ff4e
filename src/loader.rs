use std::sync::Arc;

use tokio::task;
use tracing::{error, info, warn};

use crate::config::{Args, SamplingParams};
use crate::device::device_label;
use crate::engine::{CandleGenerator, ChatEngine};
use crate::error::{Result, ServeError};
use crate::hub;
use crate::model::{build_model, detect_architecture, LanguageModel};
use crate::state::{AppState, LoadStatus};
use crate::tokenizer::TokenizerWrapper;

pub struct LoadOptions {
    pub model_id: String,
    pub revision: String,
    pub hf_token: Option<String>,
    pub primary: SamplingParams,
    pub retry: SamplingParams,
}

impl LoadOptions {
    pub fn from_args(args: &Args) -> Self {
        Self {
            model_id: args.model.clone(),
            revision: args.revision.clone(),
            hf_token: args.hf_token.clone(),
            primary: SamplingParams::primary(args),
            retry: SamplingParams::retry(args),
        }
    }
}

/// Background load task, spawned once at startup. A failure is recorded
/// in the shared status and is terminal until the process restarts; the
/// HTTP server keeps running either way.
pub async fn run(state: Arc<AppState>, options: LoadOptions) {
    info!(model = %options.model_id, "starting model load");

    if let Err(err) = load(&state, options).await {
        error!(%err, "model load failed");
        state
            .set_status(LoadStatus::Failed {
                message: err.to_string(),
            })
            .await;
    }
}

async fn load(state: &Arc<AppState>, options: LoadOptions) -> Result<()> {
    state
        .set_status(LoadStatus::Loading {
            stage: "fetching tokenizer and model files".to_string(),
        })
        .await;

    let model_id = options.model_id.clone();
    let revision = options.revision.clone();
    let token = options.hf_token.clone();
    let files = task::spawn_blocking(move || {
        hub::fetch_model_files(&model_id, &revision, token.as_deref())
    })
    .await
    .map_err(|e| ServeError::ModelLoad(format!("fetch task panicked: {e}")))??;

    state
        .set_status(LoadStatus::Loading {
            stage: format!("loading model weights onto {}", device_label(&state.device)),
        })
        .await;

    let device = state.device.clone();
    let (model, tokenizer) = task::spawn_blocking(move || -> Result<(Box<dyn LanguageModel>, TokenizerWrapper)> {
        let tokenizer = TokenizerWrapper::load(&files.tokenizer)?;
        let architecture = detect_architecture(&files.config)?;
        let model = build_model(architecture, &files, &device)?;
        Ok((model, tokenizer))
    })
    .await
    .map_err(|e| ServeError::ModelLoad(format!("load task panicked: {e}")))??;

    let generator = Arc::new(CandleGenerator::new(
        model,
        tokenizer,
        state.device.clone(),
    ));
    let engine = Arc::new(ChatEngine::new(generator, options.primary, options.retry));

    // Publish before flipping the status: anyone who sees Ready is
    // guaranteed to find the engine in the cell.
    if !state.publish(engine) {
        warn!("engine was already published, keeping the first one");
    }
    state.set_status(LoadStatus::Ready).await;

    info!(model = %state.model_id, "model ready");
    Ok(())
}
