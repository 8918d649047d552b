//! Tokenizer module for tag text
//!
//! The generation controller talks to tokenizers through the [`Tokenizer`]
//! trait. [`hf_tokenizer::HfTokenizer`] loads a model's `tokenizer.json`;
//! [`tag_tokenizer::TagTokenizer`] builds a word-level vocabulary from a plain
//! tag list: one token per tag, control tags as added tokens.

pub mod hf_tokenizer;
pub mod tag_tokenizer;
pub mod vocab;

use crate::Result;
use std::collections::HashMap;

/// Main tokenizer trait that all tokenizer implementations must implement
pub trait Tokenizer: Send + Sync {
    /// Encode text into a sequence of token IDs. Unknown text maps to the unknown token.
    fn encode(&self, text: &str) -> Result<Vec<u32>>;

    /// Decode a sequence of token IDs back into text
    fn decode(&self, tokens: &[u32], skip_special_tokens: bool) -> Result<String>;

    /// Decode into discrete tag fragments, optionally keeping special tokens as their own fragments
    fn decode_tags(&self, tokens: &[u32], skip_special_tokens: bool) -> Result<Vec<String>>;

    /// Width of the score vector a model must produce over this vocabulary
    fn vocab_size(&self) -> usize;

    /// Get the end of sequence token ID
    fn eos_token_id(&self) -> Option<u32>;

    /// Get the unknown token ID
    fn unk_token_id(&self) -> Option<u32>;

    /// Get token string by ID
    fn id_to_token(&self, id: u32) -> Option<String>;

    /// Get token ID by string
    fn token_to_id(&self, token: &str) -> Option<u32>;

    /// Check if a token ID is a special token
    fn is_special_token(&self, id: u32) -> bool;

    /// Text-to-id mapping, optionally including added tokens
    fn get_vocab(&self, include_added_tokens: bool) -> HashMap<String, u32>;

    /// Added tokens in id order
    fn get_added_tokens(&self) -> Vec<String>;
}
