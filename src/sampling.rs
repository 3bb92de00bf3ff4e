use candle_core::{DType, Tensor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::SamplingParams;
use crate::error::{Result, ServeError};

/// Temperature / top-k / nucleus sampler over a 1-d logits tensor.
pub struct Sampler {
    temperature: f64,
    top_p: f64,
    top_k: usize,
    rng: StdRng,
}

impl Sampler {
    pub fn new(params: &SamplingParams) -> Self {
        let rng = match params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            temperature: params.temperature,
            top_p: params.top_p,
            top_k: params.top_k,
            rng,
        }
    }

    pub fn sample(&mut self, logits: &Tensor) -> Result<u32> {
        let logits: Vec<f32> = logits.to_dtype(DType::F32)?.to_vec1()?;
        if logits.is_empty() {
            return Err(ServeError::Generation("empty logits".to_string()));
        }

        // Temperature 0 degenerates to greedy decoding.
        if self.temperature <= 0.0 {
            return Ok(argmax(&logits));
        }

        let temperature = self.temperature as f32;
        let mut ranked: Vec<(usize, f32)> = logits
            .iter()
            .map(|&l| l / temperature)
            .enumerate()
            .collect();
        ranked.sort_unstable_by(|a, b| b.1.total_cmp(&a.1));

        if self.top_k > 0 && self.top_k < ranked.len() {
            ranked.truncate(self.top_k);
        }

        // Softmax over the surviving candidates.
        let max = ranked[0].1;
        let mut probs: Vec<f32> = ranked.iter().map(|(_, l)| (l - max).exp()).collect();
        let total: f32 = probs.iter().sum();
        for p in &mut probs {
            *p /= total;
        }

        // Nucleus cutoff: the smallest prefix whose mass exceeds top_p,
        // always keeping at least one candidate.
        if self.top_p < 1.0 {
            let mut mass = 0.0f32;
            let mut keep = probs.len();
            for (i, p) in probs.iter().enumerate() {
                mass += p;
                if mass > self.top_p as f32 {
                    keep = i + 1;
                    break;
                }
            }
            ranked.truncate(keep);
            probs.truncate(keep);
            let total: f32 = probs.iter().sum();
            for p in &mut probs {
                *p /= total;
            }
        }

        let draw: f32 = self.rng.gen();
        let mut mass = 0.0f32;
        for (i, p) in probs.iter().enumerate() {
            mass += p;
            if draw < mass {
                return Ok(ranked[i].0 as u32);
            }
        }

        // Rounding left the draw past the accumulated mass.
        Ok(ranked[ranked.len() - 1].0 as u32)
    }
}

fn argmax(logits: &[f32]) -> u32 {
    let mut best = 0;
    for (i, &l) in logits.iter().enumerate() {
        if l > logits[best] {
            best = i;
        }
    }
    best as u32
}

/// Reduce model output of shape `[vocab]`, `[seq, vocab]` or
/// `[1, seq, vocab]` to the logits of the final position.
pub fn last_token_logits(logits: &Tensor) -> Result<Tensor> {
    match logits.dims() {
        &[_] => Ok(logits.clone()),
        &[seq, _] => Ok(logits.get(seq - 1)?),
        &[1, seq, _] => Ok(logits.get(0)?.get(seq - 1)?),
        dims => Err(ServeError::Generation(format!(
            "unexpected logits shape {dims:?}"
        ))),
    }
}
