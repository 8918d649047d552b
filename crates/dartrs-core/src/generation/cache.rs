//! Per-generation cache
//!
//! Owns the prompt tokens, the tokens produced so far and the model's recurrent
//! state. The state is released exactly once: explicitly through
//! [`GenerationCache::release`] or implicitly when the cache is dropped, whichever
//! comes first. Only the generation controller mutates a cache.

use super::FinishReason;
use crate::model::Model;
use crate::{CoreError, Result};
use std::sync::Arc;
use tracing::trace;

/// Lifecycle of a generation cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    Running,
    Finished(FinishReason),
}

pub struct GenerationCache<M: Model> {
    model: Arc<M>,
    input_tokens: Vec<u32>,
    output_tokens: Vec<u32>,
    recurrent_state: Option<M::State>,
    state: GenerationState,
}

impl<M: Model> GenerationCache<M> {
    /// Create a cache for a tokenized prompt. The prompt must not be empty.
    pub fn new(model: Arc<M>, input_tokens: Vec<u32>) -> Result<Self> {
        if input_tokens.is_empty() {
            return Err(CoreError::invalid_input(
                "EMPTY_PROMPT",
                "Prompt encodes to zero tokens",
                "Creating generation cache",
                "Compose the prompt with the prompt compiler so it starts with <|bos|>",
            ));
        }

        let recurrent_state = model.new_state()?;
        Ok(Self {
            model,
            input_tokens,
            output_tokens: Vec::new(),
            recurrent_state: Some(recurrent_state),
            state: GenerationState::Running,
        })
    }

    pub fn input_tokens(&self) -> &[u32] {
        &self.input_tokens
    }

    pub fn output_tokens(&self) -> &[u32] {
        &self.output_tokens
    }

    pub fn state(&self) -> GenerationState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, GenerationState::Finished(_))
    }

    pub fn finish_reason(&self) -> Option<FinishReason> {
        match self.state {
            GenerationState::Finished(reason) => Some(reason),
            GenerationState::Running => None,
        }
    }

    pub fn is_released(&self) -> bool {
        self.recurrent_state.is_none()
    }

    /// Total tokens seen so far (prompt plus output)
    pub fn seq_len(&self) -> usize {
        self.input_tokens.len() + self.output_tokens.len()
    }

    /// Run the model over the tokens the state has not consumed yet.
    ///
    /// The first call feeds the whole prompt at offset 0; later calls feed only the
    /// last sampled token at offset `seq_len - 1`.
    pub(crate) fn score(&mut self) -> Result<Vec<f32>> {
        let (pending, offset) = match self.output_tokens.last() {
            None => (self.input_tokens.as_slice(), 0),
            Some(last) => (std::slice::from_ref(last), self.seq_len() - 1),
        };

        let state = self.recurrent_state.as_mut().ok_or_else(|| {
            CoreError::generation(
                "CACHE_RELEASED",
                "Generation cache has already been released",
                "Scoring next token",
                "Create a new cache for each generation",
            )
        })?;

        trace!("scoring {} pending tokens at offset {}", pending.len(), offset);
        self.model.forward(state, pending, offset)
    }

    pub(crate) fn push(&mut self, token: u32) {
        self.output_tokens.push(token);
    }

    pub(crate) fn finish(&mut self, reason: FinishReason) {
        self.state = GenerationState::Finished(reason);
    }

    /// Release the model state. Safe to call more than once.
    pub fn release(&mut self) {
        if let Some(mut state) = self.recurrent_state.take() {
            trace!("releasing generation cache ({} tokens)", self.seq_len());
            self.model.release(&mut state);
        }
    }
}

impl<M: Model> Drop for GenerationCache<M> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<M: Model> std::fmt::Debug for GenerationCache<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationCache")
            .field("model", &self.model.name())
            .field("input_tokens", &self.input_tokens)
            .field("output_tokens", &self.output_tokens)
            .field("state", &self.state)
            .field("released", &self.is_released())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::bigram::BigramModel;

    #[test]
    fn test_score_feeds_prompt_then_last_token() {
        let model = Arc::new(BigramModel::uniform(8).unwrap().with_transition(3, 5, 2.0));
        let mut cache = GenerationCache::new(model, vec![0, 1, 3]).unwrap();

        let scores = cache.score().unwrap();
        assert_eq!(scores[5], 2.0);

        cache.push(5);
        let scores = cache.score().unwrap();
        assert_eq!(scores[5], 0.0);
        assert_eq!(cache.seq_len(), 4);
    }

    #[test]
    fn test_release_is_idempotent() {
        let model = Arc::new(BigramModel::uniform(4).unwrap());
        let mut cache = GenerationCache::new(model, vec![0]).unwrap();
        assert!(!cache.is_released());

        cache.release();
        cache.release();
        assert!(cache.is_released());

        let err = cache.score().unwrap_err();
        assert_eq!(err.code(), "CACHE_RELEASED");
    }

    #[test]
    fn test_finish_transitions_state() {
        let model = Arc::new(BigramModel::uniform(4).unwrap());
        let mut cache = GenerationCache::new(model, vec![0]).unwrap();
        assert_eq!(cache.state(), GenerationState::Running);
        assert_eq!(cache.finish_reason(), None);

        cache.finish(FinishReason::MaxTokens);
        assert!(cache.is_finished());
        assert_eq!(cache.finish_reason(), Some(FinishReason::MaxTokens));
    }

    #[test]
    fn test_empty_prompt_rejected() {
        let model = Arc::new(BigramModel::uniform(4).unwrap());
        let err = GenerationCache::new(model, Vec::new()).unwrap_err();
        assert_eq!(err.code(), "EMPTY_PROMPT");
    }
}
