//! Vocabulary management for tag tokenizers
//!
//! A vocabulary holds the word-level tag entries plus "added" tokens: the
//! reserved and control tags, matched verbatim anywhere in the input and
//! skipped when decoding with `skip_special_tokens`. Full `tokenizer.json`
//! files are handled by [`super::hf_tokenizer::HfTokenizer`] instead.

use crate::tags::{all_special_tags, ReservedTag, SpecialTag};
use crate::{CoreError, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Vocabulary container for managing token-to-id and id-to-token mappings
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    /// Token to ID mapping
    token_to_id: HashMap<String, u32>,

    /// ID to token mapping
    id_to_token: HashMap<u32, String>,

    /// Special tokens
    special_tokens: HashMap<String, u32>,

    /// Added tokens, kept sorted by id
    added_tokens: Vec<(String, u32)>,

    /// Unknown token ID
    unk_token_id: Option<u32>,

    /// End of sequence token ID
    eos_token_id: Option<u32>,
}

impl Vocabulary {
    /// Create a new empty vocabulary
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a plain tag list: one tag per line, ids assigned after the special tags
    pub fn from_tag_list_file(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            CoreError::tokenizer(
                "TOKENIZER_VOCAB_FILE_OPEN_ERROR",
                format!("Failed to open vocabulary file: {}", e),
                "vocabulary file loading",
                "Check file path and permissions",
            )
        })?;

        let reader = BufReader::new(file);
        let mut builder = VocabularyBuilder::new();

        for line in reader.lines() {
            let tag = line.map_err(|e| {
                CoreError::tokenizer(
                    "TOKENIZER_VOCAB_LINE_READ_ERROR",
                    format!("Failed to read vocabulary line: {}", e),
                    "vocabulary file parsing",
                    "Check file format and encoding",
                )
            })?;
            let tag = tag.trim();
            if !tag.is_empty() {
                builder = builder.add_tag(tag);
            }
        }

        Ok(builder.build())
    }

    /// Add a token to the vocabulary
    pub fn add_token(&mut self, token: String, id: u32) {
        self.token_to_id.insert(token.clone(), id);
        self.id_to_token.insert(id, token);
    }

    /// Add a special token, matched verbatim before word-level splitting
    pub fn add_special_token(&mut self, token: &str, id: u32) {
        self.add_token(token.to_string(), id);
        self.special_tokens.insert(token.to_string(), id);
        match self.added_tokens.binary_search_by_key(&id, |(_, i)| *i) {
            Ok(pos) => self.added_tokens[pos] = (token.to_string(), id),
            Err(pos) => self.added_tokens.insert(pos, (token.to_string(), id)),
        }
    }

    fn resolve_reserved_ids(&mut self) {
        self.unk_token_id = self.token_to_id(ReservedTag::Unk.to_tag());
        self.eos_token_id = self.token_to_id(ReservedTag::Eos.to_tag());
    }

    /// Get token ID
    pub fn token_to_id(&self, token: &str) -> Option<u32> {
        self.token_to_id.get(token).copied()
    }

    /// Get token by ID
    pub fn id_to_token(&self, id: u32) -> Option<&str> {
        self.id_to_token.get(&id).map(|s| s.as_str())
    }

    /// Number of distinct ids
    pub fn size(&self) -> usize {
        self.id_to_token.len()
    }

    /// One past the largest id; the width of a score vector over this vocabulary
    pub fn id_space(&self) -> usize {
        self.id_to_token.keys().max().map_or(0, |&max| max as usize + 1)
    }

    /// Check if a token is special
    pub fn is_special_token(&self, token: &str) -> bool {
        self.special_tokens.contains_key(token)
    }

    /// Check if an ID corresponds to a special token
    pub fn is_special_id(&self, id: u32) -> bool {
        self.id_to_token(id)
            .map_or(false, |token| self.is_special_token(token))
    }

    /// Added tokens in id order
    pub fn added_tokens(&self) -> impl Iterator<Item = &str> {
        self.added_tokens.iter().map(|(token, _)| token.as_str())
    }

    /// Text-to-id map, optionally including added tokens
    pub fn to_map(&self, include_added_tokens: bool) -> HashMap<String, u32> {
        self.token_to_id
            .iter()
            .filter(|(token, id)| {
                include_added_tokens
                    || self
                        .added_tokens
                        .binary_search_by_key(*id, |(_, i)| *i)
                        .map_or(true, |pos| &self.added_tokens[pos].0 != *token)
            })
            .map(|(token, &id)| (token.clone(), id))
            .collect()
    }

    /// Get unknown token ID
    pub fn unk_token_id(&self) -> Option<u32> {
        self.unk_token_id
    }

    /// Get end of sequence token ID
    pub fn eos_token_id(&self) -> Option<u32> {
        self.eos_token_id
    }
}

/// Builder for tag vocabularies; every reserved and control tag is registered first
pub struct VocabularyBuilder {
    tags: Vec<String>,
}

impl VocabularyBuilder {
    pub fn new() -> Self {
        Self { tags: Vec::new() }
    }

    pub fn add_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn add_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> Vocabulary {
        let mut vocab = Vocabulary::new();
        let mut current_id = 0u32;

        for tag in all_special_tags() {
            vocab.add_special_token(tag, current_id);
            current_id += 1;
        }

        for tag in self.tags {
            if vocab.token_to_id(&tag).is_none() {
                vocab.add_token(tag, current_id);
                current_id += 1;
            }
        }

        vocab.resolve_reserved_ids();
        vocab
    }
}

impl Default for VocabularyBuilder {
    fn default() -> Self {
        Self::new()
    }
}
