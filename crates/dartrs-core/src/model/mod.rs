//! Scoring model contract
//!
//! The generation controller treats the language model as an opaque scorer: given
//! the tokens it has not yet consumed and their absolute start position, it returns
//! one unnormalized score per vocabulary entry for the next token. Incremental
//! state lives in [`Model::State`], created per generation and released exactly once.

pub mod bigram;

use crate::Result;

/// Next-token scorer driven by the generation controller
pub trait Model: Send + Sync {
    /// Per-generation recurrent state (attention cache, position, ...)
    type State: Send;

    /// Get the model name
    fn name(&self) -> &str;

    /// Number of scores returned by [`Model::forward`]
    fn vocab_size(&self) -> usize;

    /// Maximum number of positions the model can attend to
    fn context_length(&self) -> usize;

    /// Allocate fresh state for one generation
    fn new_state(&self) -> Result<Self::State>;

    /// Consume `input_ids`, which start at absolute position `seqlen_offset`, and
    /// score the token that follows them.
    fn forward(
        &self,
        state: &mut Self::State,
        input_ids: &[u32],
        seqlen_offset: usize,
    ) -> Result<Vec<f32>>;

    /// Release resources held by `state`
    fn release(&self, state: &mut Self::State);
}
