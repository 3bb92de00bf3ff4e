use clap::Parser;
use serde::{Deserialize, Serialize};

/// Model fetched from the Hub when no `--model` flag is given.
pub const DEFAULT_MODEL: &str = "crumb/nano-mistral";

/// Reply returned when both sampling attempts come back empty.
pub const FALLBACK_REPLY: &str =
    "Sorry, I couldn't come up with a good reply. Try rephrasing that.";

/// Trimmed replies shorter than this trigger the single resample.
pub const MIN_REPLY_CHARS: usize = 3;

const RETRY_MAX_TOKENS: usize = 50;
const RETRY_TEMPERATURE: f64 = 0.9;
const RETRY_TOP_P: f64 = 0.9;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Local chat server over a pretrained language model")]
pub struct Args {
    #[arg(short, long, default_value = DEFAULT_MODEL)]
    pub model: String,

    #[arg(long, default_value = "main")]
    pub revision: String,

    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, default_value_t = 5000)]
    pub port: u16,

    /// Skip accelerator probing and run on the CPU.
    #[arg(long)]
    pub cpu: bool,

    #[arg(long, env)]
    pub hf_token: Option<String>,

    #[arg(long, default_value_t = 100)]
    pub max_tokens: usize,

    #[arg(long, default_value_t = 0.7)]
    pub temperature: f64,

    #[arg(long, default_value_t = 1.1)]
    pub repeat_penalty: f32,

    /// 0 seeds the sampler from entropy.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
}

/// Decoding knobs for one generation attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingParams {
    pub max_tokens: usize,
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: usize,
    pub repeat_penalty: f32,
    pub seed: Option<u64>,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            max_tokens: 100,
            temperature: 0.7,
            top_p: 1.0,
            top_k: 0,
            repeat_penalty: 1.1,
            seed: None,
        }
    }
}

impl SamplingParams {
    /// First-attempt profile: plain temperature sampling.
    pub fn primary(args: &Args) -> Self {
        Self {
            max_tokens: args.max_tokens,
            temperature: args.temperature,
            top_p: 1.0,
            top_k: 0,
            repeat_penalty: args.repeat_penalty,
            seed: if args.seed == 0 { None } else { Some(args.seed) },
        }
    }

    /// Resample profile used when the first attempt comes back short:
    /// hotter temperature, nucleus sampling, smaller token budget.
    pub fn retry(args: &Args) -> Self {
        Self {
            max_tokens: RETRY_MAX_TOKENS,
            temperature: RETRY_TEMPERATURE,
            top_p: RETRY_TOP_P,
            ..Self::primary(args)
        }
    }

    /// Retry profile derived from defaults, for callers without CLI args.
    pub fn retry_default() -> Self {
        Self {
            max_tokens: RETRY_MAX_TOKENS,
            temperature: RETRY_TEMPERATURE,
            top_p: RETRY_TOP_P,
            ..Self::default()
        }
    }
}
