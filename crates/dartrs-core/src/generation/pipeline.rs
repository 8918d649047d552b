//! Generation controller
//!
//! [`TextGenerator`] owns the model and tokenizer handles and drives the
//! score, ban, sample, append, stop-check loop. Single-shot and streaming entry
//! points share [`TextGenerator::step`], so for the same configuration and seed they
//! produce the same token sequence.

use super::cache::GenerationCache;
use super::sampling::{ban_tokens, LogitsProcessor};
use super::{FinishReason, GenerationConfig, GenerationResult, GenerationStats};
use crate::model::Model;
use crate::tokenizer::Tokenizer;
use crate::{CoreError, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace, warn};
use uuid::Uuid;

/// Drives generation for one model/tokenizer pair. Cheap to clone; safe to share.
pub struct TextGenerator<M: Model> {
    model: Arc<M>,
    tokenizer: Arc<dyn Tokenizer>,
}

impl<M: Model> Clone for TextGenerator<M> {
    fn clone(&self) -> Self {
        Self {
            model: Arc::clone(&self.model),
            tokenizer: Arc::clone(&self.tokenizer),
        }
    }
}

impl<M: Model> TextGenerator<M> {
    pub fn new(model: Arc<M>, tokenizer: Arc<dyn Tokenizer>) -> Self {
        if model.vocab_size() != tokenizer.vocab_size() {
            warn!(
                "Model '{}' scores {} tokens but tokenizer has {}; generation will fail",
                model.name(),
                model.vocab_size(),
                tokenizer.vocab_size()
            );
        }
        Self { model, tokenizer }
    }

    pub fn model(&self) -> &Arc<M> {
        &self.model
    }

    pub fn tokenizer(&self) -> &Arc<dyn Tokenizer> {
        &self.tokenizer
    }

    /// Tokenize the prompt and allocate fresh model state
    pub fn create_cache(&self, config: &GenerationConfig) -> Result<GenerationCache<M>> {
        let input_tokens = self.tokenizer.encode(config.prompt())?;
        let needed = input_tokens.len() + config.max_new_tokens();
        if needed > self.model.context_length() {
            warn!(
                "Prompt ({} tokens) plus max_new_tokens ({}) exceeds context length {}",
                input_tokens.len(),
                config.max_new_tokens(),
                self.model.context_length()
            );
        }
        GenerationCache::new(Arc::clone(&self.model), input_tokens)
    }

    /// Resolve the stop token: the configured eos text, else the tokenizer's eos token
    pub fn eos_token_id(&self, config: &GenerationConfig) -> Result<u32> {
        match config.eos_token() {
            Some(text) => self.tokenizer.token_to_id(text).ok_or_else(|| {
                CoreError::configuration(
                    "UNKNOWN_EOS_TOKEN",
                    format!("End-of-sequence token '{}' is not in the vocabulary", text),
                    "Resolving stop token",
                    "Use a token from the tokenizer's added tokens, e.g. <|eos|>",
                )
            }),
            None => self.tokenizer.eos_token_id().ok_or_else(|| {
                CoreError::configuration(
                    "NO_EOS_TOKEN",
                    "Tokenizer defines no end-of-sequence token",
                    "Resolving stop token",
                    "Set eos_token in the generation configuration",
                )
            }),
        }
    }

    /// Advance the cache by exactly one token.
    ///
    /// Fails without touching the model when the cache is already finished.
    pub fn step(
        &self,
        cache: &mut GenerationCache<M>,
        sampler: &mut LogitsProcessor,
        config: &GenerationConfig,
    ) -> Result<u32> {
        let eos_token_id = self.eos_token_id(config)?;
        self.step_with_eos(cache, sampler, config, eos_token_id)
    }

    fn step_with_eos(
        &self,
        cache: &mut GenerationCache<M>,
        sampler: &mut LogitsProcessor,
        config: &GenerationConfig,
        eos_token_id: u32,
    ) -> Result<u32> {
        if cache.is_finished() {
            return Err(CoreError::generation(
                "CACHE_FINISHED",
                "Generation cache has already finished",
                format!("Cache finished with {:?}", cache.finish_reason()),
                "Create a new cache to generate again",
            ));
        }

        let mut logits = cache.score()?;
        if logits.len() != self.tokenizer.vocab_size() {
            return Err(CoreError::model(
                "MODEL_VOCAB_MISMATCH",
                format!(
                    "Model returned {} scores for a vocabulary of {}",
                    logits.len(),
                    self.tokenizer.vocab_size()
                ),
                format!("Scoring step {}", cache.output_tokens().len()),
                "Use a tokenizer that matches the model",
            ));
        }

        ban_tokens(&mut logits, config.ban_token_ids());
        let token = sampler.sample(&logits)?;
        cache.push(token);

        if token == eos_token_id {
            cache.finish(FinishReason::EndOfSequence);
        } else if cache.output_tokens().len() >= config.max_new_tokens() {
            cache.finish(FinishReason::MaxTokens);
        }

        trace!(
            "step {}: token {} ({:?})",
            cache.output_tokens().len() - 1,
            token,
            self.tokenizer.id_to_token(token)
        );
        Ok(token)
    }

    /// Generate and return the decoded text
    pub fn generate(&self, config: &GenerationConfig) -> Result<String> {
        Ok(self.generate_with_details(config)?.text)
    }

    /// Generate and return tokens, text, finish reason and timing
    pub fn generate_with_details(&self, config: &GenerationConfig) -> Result<GenerationResult> {
        self.generate_stream(config)?.finish()
    }

    /// Generate lazily, yielding one decoded fragment per sampled token
    pub fn generate_stream(&self, config: &GenerationConfig) -> Result<GenerationStream<'_, M>> {
        let generation_id = Uuid::new_v4().to_string();
        let eos_token_id = self.eos_token_id(config)?;
        let cache = self.create_cache(config)?;

        debug!(
            generation_id = %generation_id,
            prompt_tokens = cache.input_tokens().len(),
            max_new_tokens = config.max_new_tokens(),
            temperature = config.temperature(),
            top_k = config.top_k(),
            top_p = config.top_p(),
            seed = ?config.seed(),
            banned = config.ban_token_ids().len(),
            "starting generation"
        );

        Ok(GenerationStream {
            generator: self,
            config: config.clone(),
            sampler: LogitsProcessor::from_config(config),
            cache,
            eos_token_id,
            generation_id,
            started: Instant::now(),
            first_token_at: None,
            result: None,
            done: false,
        })
    }
}

/// Lazy generation sequence.
///
/// Each item is the decoded text of one sampled token with special tokens skipped,
/// so fragments for control tags and eos are empty strings. After the last
/// fragment the full result is available from [`GenerationStream::result`] or
/// [`GenerationStream::finish`]. After an error, the stream yields nothing more.
/// Dropping the stream early releases the model state.
pub struct GenerationStream<'a, M: Model> {
    generator: &'a TextGenerator<M>,
    config: GenerationConfig,
    sampler: LogitsProcessor,
    cache: GenerationCache<M>,
    eos_token_id: u32,
    generation_id: String,
    started: Instant,
    first_token_at: Option<Instant>,
    result: Option<GenerationResult>,
    done: bool,
}

impl<'a, M: Model> GenerationStream<'a, M> {
    pub fn generation_id(&self) -> &str {
        &self.generation_id
    }

    pub fn output_tokens(&self) -> &[u32] {
        self.cache.output_tokens()
    }

    /// Terminal value, present once the stream is exhausted without error
    pub fn result(&self) -> Option<&GenerationResult> {
        self.result.as_ref()
    }

    /// Drain the stream and return the terminal value
    pub fn finish(mut self) -> Result<GenerationResult> {
        for fragment in self.by_ref() {
            fragment?;
        }
        self.result.take().ok_or_else(|| {
            CoreError::generation(
                "STREAM_ABORTED",
                "Generation stream ended without a result",
                "Collecting generation result",
                "Check the error yielded earlier by the stream",
            )
            .with_generation_id(&self.generation_id)
        })
    }

    fn advance(&mut self) -> Result<String> {
        let token = self.generator.step_with_eos(
            &mut self.cache,
            &mut self.sampler,
            &self.config,
            self.eos_token_id,
        )?;
        self.first_token_at.get_or_insert_with(Instant::now);
        self.generator.tokenizer.decode(&[token], true)
    }

    fn complete(&mut self) -> Result<GenerationResult> {
        self.cache.release();

        let tokens = self.cache.output_tokens().to_vec();
        let text = self.generator.tokenizer.decode(&tokens, true)?;

        let total = self.started.elapsed();
        let total_time_ms = total.as_secs_f64() * 1000.0;
        let time_to_first_token_ms = self
            .first_token_at
            .map(|t| t.duration_since(self.started).as_secs_f64() * 1000.0)
            .unwrap_or(0.0);
        let tokens_per_second = if total.as_secs_f64() > 0.0 {
            tokens.len() as f64 / total.as_secs_f64()
        } else {
            0.0
        };

        debug!(
            generation_id = %self.generation_id,
            tokens = tokens.len(),
            finish_reason = ?self.cache.finish_reason(),
            total_time_ms,
            "generation complete"
        );

        Ok(GenerationResult {
            generation_id: self.generation_id.clone(),
            tokens_generated: tokens.len(),
            finish_reason: self.cache.finish_reason(),
            text,
            tokens,
            stats: GenerationStats {
                prompt_tokens: self.cache.input_tokens().len(),
                time_to_first_token_ms,
                total_time_ms,
                tokens_per_second,
            },
        })
    }

    fn fail(&mut self, err: CoreError) -> CoreError {
        self.done = true;
        self.cache.release();
        debug!(
            generation_id = %self.generation_id,
            code = err.code(),
            tokens = self.cache.output_tokens().len(),
            "generation aborted"
        );
        err.with_generation_id(&self.generation_id)
    }
}

impl<'a, M: Model> Iterator for GenerationStream<'a, M> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if self.cache.is_finished() || self.cache.output_tokens().len() >= self.config.max_new_tokens() {
            self.done = true;
            return match self.complete() {
                Ok(result) => {
                    self.result = Some(result);
                    None
                }
                Err(e) => Some(Err(self.fail(e))),
            };
        }

        match self.advance() {
            Ok(fragment) => Some(Ok(fragment)),
            Err(e) => Some(Err(self.fail(e))),
        }
    }
}
