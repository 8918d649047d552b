//! Table-driven bigram scorer
//!
//! Scores the next token from the last consumed token only. Useful for smoke-testing
//! the controller end to end and for driving the CLI without neural weights.
//!
//! File format (JSON):
//!
//! ```json
//! {
//!   "name": "toy",
//!   "vocab_size": 40,
//!   "context_length": 512,
//!   "default_logit": 0.0,
//!   "unigram": { "30": 1.5 },
//!   "transitions": { "28": { "30": 4.0, "31": 2.0 } }
//! }
//! ```
//!
//! The score of token `t` after `p` is `default_logit + unigram[t] + transitions[p][t]`.

use super::Model;
use crate::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, trace};

fn default_context_length() -> usize {
    4096
}

/// Bigram table definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BigramTable {
    #[serde(default = "default_name")]
    pub name: String,
    pub vocab_size: usize,
    #[serde(default = "default_context_length")]
    pub context_length: usize,
    #[serde(default)]
    pub default_logit: f32,
    #[serde(default)]
    pub unigram: HashMap<u32, f32>,
    #[serde(default)]
    pub transitions: HashMap<u32, HashMap<u32, f32>>,
}

fn default_name() -> String {
    "bigram".to_string()
}

/// Recurrent state: how far the model has read and what it read last
#[derive(Debug, Clone, Default)]
pub struct BigramState {
    position: usize,
    last_token: Option<u32>,
    released: bool,
}

impl BigramState {
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

/// Bigram scoring model
#[derive(Debug, Clone)]
pub struct BigramModel {
    table: BigramTable,
}

impl BigramModel {
    pub fn new(table: BigramTable) -> Result<Self> {
        if table.vocab_size == 0 {
            return Err(CoreError::model(
                "MODEL_EMPTY_VOCAB",
                "Bigram table has vocab_size 0",
                "Creating bigram model",
                "Set vocab_size to the tokenizer's vocabulary size",
            ));
        }

        let out_of_range = table
            .unigram
            .keys()
            .chain(table.transitions.keys())
            .chain(table.transitions.values().flat_map(|row| row.keys()))
            .find(|&&id| id as usize >= table.vocab_size);
        if let Some(id) = out_of_range {
            return Err(CoreError::model(
                "MODEL_TOKEN_OUT_OF_RANGE",
                format!("Token id {} exceeds vocab_size {}", id, table.vocab_size),
                "Creating bigram model",
                "Check the table against the tokenizer vocabulary",
            ));
        }

        Ok(Self { table })
    }

    /// Uniform scorer over `vocab_size` tokens
    pub fn uniform(vocab_size: usize) -> Result<Self> {
        Self::new(BigramTable {
            name: default_name(),
            vocab_size,
            context_length: default_context_length(),
            default_logit: 0.0,
            unigram: HashMap::new(),
            transitions: HashMap::new(),
        })
    }

    /// Load a table from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CoreError::model_with_path(
                "MODEL_FILE_READ_ERROR",
                format!("Failed to read bigram table: {}", e),
                "Loading bigram model",
                "Check that the file exists and is readable",
                path,
            )
        })?;
        let table: BigramTable = serde_json::from_str(&content).map_err(|e| {
            CoreError::model_with_path(
                "MODEL_FILE_PARSE_ERROR",
                format!("Invalid bigram table: {}", e),
                "Loading bigram model",
                "The file must be a JSON object with vocab_size and optional unigram/transitions maps",
                path,
            )
        })?;

        info!(
            "Loaded bigram model '{}' from {} ({} transitions rows)",
            table.name,
            path.display(),
            table.transitions.len()
        );
        Self::new(table)
    }

    /// Add to the score of `next` when it follows `prev`
    pub fn with_transition(mut self, prev: u32, next: u32, logit: f32) -> Self {
        *self
            .table
            .transitions
            .entry(prev)
            .or_default()
            .entry(next)
            .or_insert(0.0) += logit;
        self
    }

    /// Add to the score of `token` regardless of context
    pub fn with_unigram(mut self, token: u32, logit: f32) -> Self {
        *self.table.unigram.entry(token).or_insert(0.0) += logit;
        self
    }

    pub fn table(&self) -> &BigramTable {
        &self.table
    }

    fn scores_after(&self, prev: Option<u32>) -> Vec<f32> {
        let mut scores = vec![self.table.default_logit; self.table.vocab_size];
        for (&id, &logit) in &self.table.unigram {
            scores[id as usize] += logit;
        }
        if let Some(row) = prev.and_then(|p| self.table.transitions.get(&p)) {
            for (&id, &logit) in row {
                scores[id as usize] += logit;
            }
        }
        scores
    }
}

impl Model for BigramModel {
    type State = BigramState;

    fn name(&self) -> &str {
        &self.table.name
    }

    fn vocab_size(&self) -> usize {
        self.table.vocab_size
    }

    fn context_length(&self) -> usize {
        self.table.context_length
    }

    fn new_state(&self) -> Result<Self::State> {
        Ok(BigramState::default())
    }

    fn forward(
        &self,
        state: &mut Self::State,
        input_ids: &[u32],
        seqlen_offset: usize,
    ) -> Result<Vec<f32>> {
        if state.released {
            return Err(CoreError::model(
                "MODEL_STATE_RELEASED",
                "Forward called on released state",
                "Bigram forward pass",
                "Create a new generation cache",
            ));
        }
        if seqlen_offset != state.position {
            return Err(CoreError::model(
                "MODEL_POSITION_MISMATCH",
                format!(
                    "Input starts at position {} but state is at {}",
                    seqlen_offset, state.position
                ),
                "Bigram forward pass",
                "Pass only tokens the state has not consumed yet",
            ));
        }
        let Some(&last) = input_ids.last() else {
            return Err(CoreError::model(
                "MODEL_EMPTY_INPUT",
                "Forward called with no input tokens",
                "Bigram forward pass",
                "Provide at least one token",
            ));
        };
        if state.position + input_ids.len() > self.table.context_length {
            return Err(CoreError::model(
                "MODEL_CONTEXT_OVERFLOW",
                format!(
                    "Sequence length {} exceeds context length {}",
                    state.position + input_ids.len(),
                    self.table.context_length
                ),
                "Bigram forward pass",
                "Reduce max_new_tokens or the prompt length",
            ));
        }
        if let Some(&bad) = input_ids.iter().find(|&&id| id as usize >= self.table.vocab_size) {
            return Err(CoreError::model(
                "MODEL_TOKEN_OUT_OF_RANGE",
                format!("Token id {} exceeds vocab_size {}", bad, self.table.vocab_size),
                "Bigram forward pass",
                "Check that the model and tokenizer share a vocabulary",
            ));
        }

        state.position += input_ids.len();
        state.last_token = Some(last);
        trace!("bigram forward: position={} last={}", state.position, last);

        Ok(self.scores_after(Some(last)))
    }

    fn release(&self, state: &mut Self::State) {
        if !state.released {
            debug!("Releasing bigram state at position {}", state.position);
            state.released = true;
            state.last_token = None;
        }
    }
}
