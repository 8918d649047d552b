//! Generation configuration and results

pub mod cache;
pub mod channel;
pub mod pipeline;
pub mod sampling;

use crate::tokenizer::Tokenizer;
use crate::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const DEFAULT_MAX_NEW_TOKENS: usize = 256;
pub const DEFAULT_TEMPERATURE: f32 = 1.0;
pub const DEFAULT_TOP_K: usize = 100;
pub const DEFAULT_TOP_P: f32 = 0.9;

/// Configuration for one generation call. Built through [`GenerationConfigBuilder`],
/// which rejects out-of-range sampling parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationConfig {
    /// Compiled prompt text
    prompt: String,

    /// Maximum number of tokens to generate
    max_new_tokens: usize,

    /// Logit divisor; must be > 0
    temperature: f32,

    /// Keep only the k best candidates (0 disables)
    top_k: usize,

    /// Nucleus threshold in (0, 1]
    top_p: f32,

    /// Random seed for reproducible generation; `None` draws from process entropy
    seed: Option<u64>,

    /// Stop token text; `None` uses the tokenizer's eos token
    eos_token: Option<String>,

    /// Token ids that can never be sampled
    ban_token_ids: BTreeSet<u32>,
}

impl GenerationConfig {
    pub fn builder(prompt: impl Into<String>) -> GenerationConfigBuilder {
        GenerationConfigBuilder::new(prompt)
    }

    /// Default configuration for a prompt
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            top_k: DEFAULT_TOP_K,
            top_p: DEFAULT_TOP_P,
            seed: None,
            eos_token: None,
            ban_token_ids: BTreeSet::new(),
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn max_new_tokens(&self) -> usize {
        self.max_new_tokens
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn top_p(&self) -> f32 {
        self.top_p
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn eos_token(&self) -> Option<&str> {
        self.eos_token.as_deref()
    }

    pub fn ban_token_ids(&self) -> &BTreeSet<u32> {
        &self.ban_token_ids
    }
}

/// Reject sampling parameters outside their valid ranges
pub fn validate_sampling(temperature: f32, top_p: f32) -> Result<()> {
    if !(temperature.is_finite() && temperature > 0.0) {
        return Err(CoreError::invalid_parameter(
            "INVALID_TEMPERATURE",
            format!("Temperature must be a finite value above 0 (got: {})", temperature),
            "Generation configuration validation",
            "Use values below 1.0 to sharpen the distribution and above 1.0 to flatten it",
            "temperature",
            temperature.to_string(),
            "(0, inf)",
        ));
    }

    if !(top_p > 0.0 && top_p <= 1.0) {
        return Err(CoreError::invalid_parameter(
            "INVALID_TOP_P",
            format!("top_p must be in (0, 1] (got: {})", top_p),
            "Generation configuration validation",
            "Use 1.0 to disable nucleus filtering",
            "top_p",
            top_p.to_string(),
            "(0, 1]",
        ));
    }

    Ok(())
}

/// Validating builder for [`GenerationConfig`]
#[derive(Debug, Clone)]
pub struct GenerationConfigBuilder {
    config: GenerationConfig,
}

impl GenerationConfigBuilder {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            config: GenerationConfig::new(prompt),
        }
    }

    pub fn max_new_tokens(mut self, max_new_tokens: usize) -> Self {
        self.config.max_new_tokens = max_new_tokens;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.config.top_k = top_k;
        self
    }

    pub fn top_p(mut self, top_p: f32) -> Self {
        self.config.top_p = top_p;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn eos_token(mut self, eos_token: impl Into<String>) -> Self {
        self.config.eos_token = Some(eos_token.into());
        self
    }

    pub fn ban_token_ids<I: IntoIterator<Item = u32>>(mut self, ids: I) -> Self {
        self.config.ban_token_ids.extend(ids);
        self
    }

    /// Ban tags by text. Every tag must exist in the tokenizer's vocabulary.
    pub fn ban_tags<I, S>(mut self, tokenizer: &dyn Tokenizer, tags: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for tag in tags {
            let tag = tag.as_ref().trim();
            let id = tokenizer.token_to_id(tag).ok_or_else(|| {
                CoreError::invalid_parameter(
                    "UNKNOWN_BAN_TAG",
                    format!("Cannot ban '{}': tag is not in the vocabulary", tag),
                    "Resolving banned tags",
                    "Check the tag spelling against the tokenizer vocabulary",
                    "ban_tags",
                    tag,
                    "any vocabulary tag",
                )
            })?;
            self.config.ban_token_ids.insert(id);
        }
        Ok(self)
    }

    /// Apply file/CLI defaults; explicit builder calls made afterwards win
    pub fn apply_defaults(mut self, defaults: &crate::config::GenerationDefaults) -> Self {
        self.config.max_new_tokens = defaults.max_new_tokens;
        self.config.temperature = defaults.temperature;
        self.config.top_k = defaults.top_k;
        self.config.top_p = defaults.top_p;
        self.config.seed = defaults.seed;
        self.config.eos_token = defaults.eos_token.clone();
        self
    }

    pub fn build(self) -> Result<GenerationConfig> {
        validate_sampling(self.config.temperature, self.config.top_p)?;
        Ok(self.config)
    }
}

/// Result of a generation operation
#[derive(Debug, Clone, Serialize)]
pub struct GenerationResult {
    /// Id attached to every log record of this call
    pub generation_id: String,

    /// Generated tokens
    pub tokens: Vec<u32>,

    /// Decoded text, special tokens skipped
    pub text: String,

    /// Reason generation stopped; `None` when no step was taken
    pub finish_reason: Option<FinishReason>,

    /// Number of tokens generated
    pub tokens_generated: usize,

    /// Generation statistics
    pub stats: GenerationStats,
}

/// Reason why generation stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Reached max_new_tokens
    MaxTokens,

    /// Sampled the eos token
    EndOfSequence,
}

/// Statistics about the generation process
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationStats {
    /// Number of prompt tokens
    pub prompt_tokens: usize,

    /// Time to first token (ms)
    pub time_to_first_token_ms: f64,

    /// Total generation time (ms)
    pub total_time_ms: f64,

    /// Tokens per second
    pub tokens_per_second: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GenerationConfig::new("<|bos|>");
        assert_eq!(config.max_new_tokens(), 256);
        assert_eq!(config.temperature(), 1.0);
        assert_eq!(config.top_k(), 100);
        assert_eq!(config.top_p(), 0.9);
        assert_eq!(config.seed(), None);
        assert_eq!(config.eos_token(), None);
        assert!(config.ban_token_ids().is_empty());
    }

    #[test]
    fn test_builder_validation() {
        assert!(GenerationConfig::builder("p").temperature(0.5).top_p(1.0).build().is_ok());

        let err = GenerationConfig::builder("p").temperature(0.0).build().unwrap_err();
        assert_eq!(err.code(), "INVALID_TEMPERATURE");
        assert!(err.is_construction_error());

        let err = GenerationConfig::builder("p").temperature(f32::NAN).build().unwrap_err();
        assert_eq!(err.code(), "INVALID_TEMPERATURE");

        let err = GenerationConfig::builder("p").top_p(0.0).build().unwrap_err();
        assert_eq!(err.code(), "INVALID_TOP_P");

        let err = GenerationConfig::builder("p").top_p(1.5).build().unwrap_err();
        assert_eq!(err.code(), "INVALID_TOP_P");
    }

    #[test]
    fn test_ban_tags_resolves_ids() {
        let tok = crate::tokenizer::tag_tokenizer::TagTokenizer::from_tags(["animal ears", "1girl"]).unwrap();
        let config = GenerationConfig::builder("p")
            .ban_tags(&tok, ["animal ears"])
            .unwrap()
            .build()
            .unwrap();
        assert!(config.ban_token_ids().contains(&tok.token_to_id("animal ears").unwrap()));

        let err = GenerationConfig::builder("p").ban_tags(&tok, ["wings"]).unwrap_err();
        assert_eq!(err.code(), "UNKNOWN_BAN_TAG");
    }
}
