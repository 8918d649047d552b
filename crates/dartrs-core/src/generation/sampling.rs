//! Next-token sampling policy
//!
//! Order of operations on one score vector: ban mask, temperature, top-k, top-p,
//! softmax, weighted draw. Banned and filtered entries are set to negative
//! infinity so they receive exactly zero probability.

use super::GenerationConfig;
use crate::{CoreError, Result};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::cmp::Ordering;

/// Set the score of every banned id to negative infinity. Ids outside the vector are ignored.
pub fn ban_tokens<'a, I>(logits: &mut [f32], ban_ids: I)
where
    I: IntoIterator<Item = &'a u32>,
{
    for &id in ban_ids {
        if let Some(logit) = logits.get_mut(id as usize) {
            *logit = f32::NEG_INFINITY;
        }
    }
}

/// Seeded sampler applying temperature, top-k and top-p
#[derive(Debug, Clone)]
pub struct LogitsProcessor {
    rng: StdRng,
    temperature: f32,
    top_k: usize,
    top_p: f32,
}

impl LogitsProcessor {
    /// `seed == None` draws the generator state from process entropy
    pub fn new(seed: Option<u64>, temperature: f32, top_k: usize, top_p: f32) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            temperature,
            top_k,
            top_p,
        }
    }

    pub fn from_config(config: &GenerationConfig) -> Self {
        Self::new(
            config.seed(),
            config.temperature(),
            config.top_k(),
            config.top_p(),
        )
    }

    /// Draw one token id from already-masked scores
    pub fn sample(&mut self, logits: &[f32]) -> Result<u32> {
        let probabilities = self.probabilities(logits)?;
        let dist = WeightedIndex::new(&probabilities)
            .map_err(|e| exhausted(&format!("Weighted draw failed: {}", e), logits))?;
        Ok(dist.sample(&mut self.rng) as u32)
    }

    /// Final sampling distribution after temperature, top-k and top-p
    pub fn probabilities(&self, logits: &[f32]) -> Result<Vec<f32>> {
        let max_logit = logits
            .iter()
            .copied()
            .filter(|l| !l.is_nan())
            .fold(f32::NEG_INFINITY, f32::max);
        if max_logit == f32::NEG_INFINITY {
            return Err(exhausted("Every candidate is banned", logits));
        }

        // Best score sits at 0 before temperature scaling
        let mut logits: Vec<f32> = logits
            .iter()
            .map(|&l| {
                if l.is_nan() || l == f32::NEG_INFINITY {
                    f32::NEG_INFINITY
                } else if l == max_logit {
                    0.0
                } else {
                    (l - max_logit) / self.temperature
                }
            })
            .collect();

        if self.top_k > 0 && self.top_k < logits.len() {
            apply_top_k_filtering(&mut logits, self.top_k);
        }

        if self.top_p < 1.0 {
            apply_top_p_filtering(&mut logits, self.top_p);
        }

        let probabilities = softmax(&logits);
        if probabilities.iter().all(|&p| p == 0.0) {
            return Err(exhausted("Filtered distribution has no mass", &logits));
        }
        Ok(probabilities)
    }
}

fn exhausted(context: &str, logits: &[f32]) -> CoreError {
    let banned = logits.iter().filter(|&&l| l == f32::NEG_INFINITY).count();
    CoreError::sampling_exhausted(context, logits.len(), banned)
}

/// Indices ordered by descending score; equal scores keep ascending id order
fn sorted_indices(logits: &[f32]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..logits.len()).collect();
    indices.sort_by(|&a, &b| logits[b].partial_cmp(&logits[a]).unwrap_or(Ordering::Equal));
    indices
}

/// Keep the `top_k` best scores
pub fn apply_top_k_filtering(logits: &mut [f32], top_k: usize) {
    for idx in sorted_indices(logits).into_iter().skip(top_k) {
        logits[idx] = f32::NEG_INFINITY;
    }
}

/// Keep the smallest best-first prefix whose probability mass reaches `top_p`
pub fn apply_top_p_filtering(logits: &mut [f32], top_p: f32) {
    let indices = sorted_indices(logits);
    let sorted_logits: Vec<f32> = indices.iter().map(|&i| logits[i]).collect();
    let sorted_probs = softmax(&sorted_logits);

    let mut cumulative_prob = 0.0;
    let mut cutoff_index = sorted_probs.len();
    for (i, &prob) in sorted_probs.iter().enumerate() {
        cumulative_prob += prob;
        if cumulative_prob >= top_p {
            cutoff_index = i + 1;
            break;
        }
    }

    for &idx in indices.iter().skip(cutoff_index) {
        logits[idx] = f32::NEG_INFINITY;
    }
}

/// Numerically stable softmax; all-masked input yields all zeros
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max_logit = logits.iter().fold(f32::NEG_INFINITY, |acc, &x| acc.max(x));
    if max_logit == f32::NEG_INFINITY {
        return vec![0.0; logits.len()];
    }

    let exp_logits: Vec<f32> = logits.iter().map(|&x| (x - max_logit).exp()).collect();
    let sum_exp: f32 = exp_logits.iter().sum();

    if sum_exp > 0.0 && sum_exp.is_finite() {
        exp_logits.iter().map(|&x| x / sum_exp).collect()
    } else {
        vec![0.0; logits.len()]
    }
}
