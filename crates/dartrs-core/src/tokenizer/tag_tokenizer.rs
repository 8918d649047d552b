//! Word-level tag tokenizer
//!
//! Added tokens (reserved and control tags) are matched verbatim anywhere in the
//! text, longest match first. Everything between them is split on commas and each
//! trimmed tag is looked up as a whole token.

use super::vocab::{Vocabulary, VocabularyBuilder};
use super::Tokenizer;
use crate::{CoreError, Result};
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Separator used when joining decoded tags
pub const TAG_SEPARATOR: &str = ", ";

/// Tokenizer for comma-separated tag text
#[derive(Debug, Clone)]
pub struct TagTokenizer {
    vocab: Vocabulary,
    /// Alternation of every added token, longest first
    added_pattern: Option<Regex>,
    unk_token_id: u32,
}

impl TagTokenizer {
    /// Create a tokenizer over a vocabulary. The vocabulary must define an unknown token.
    pub fn new(vocab: Vocabulary) -> Result<Self> {
        let unk_token_id = vocab.unk_token_id().ok_or_else(|| {
            CoreError::tokenizer(
                "TOKENIZER_NO_UNK_TOKEN",
                "Vocabulary has no unknown token",
                "Creating tag tokenizer",
                "Add <|unk|> to the vocabulary",
            )
        })?;

        let mut added: Vec<&str> = vocab.added_tokens().collect();
        added.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        let added_pattern = if added.is_empty() {
            None
        } else {
            let alternation = added
                .iter()
                .map(|token| regex::escape(token))
                .collect::<Vec<_>>()
                .join("|");
            let pattern = Regex::new(&alternation).map_err(|e| {
                CoreError::tokenizer(
                    "TOKENIZER_PATTERN_ERROR",
                    format!("Failed to build added-token pattern: {}", e),
                    "Creating tag tokenizer",
                    "Check the added tokens in the vocabulary",
                )
            })?;
            Some(pattern)
        };

        debug!(
            "Tag tokenizer ready: {} tokens, {} added",
            vocab.size(),
            added.len()
        );

        Ok(Self {
            vocab,
            added_pattern,
            unk_token_id,
        })
    }

    /// Load from a plain tag list, one tag per line
    pub fn from_tag_list_file(path: &Path) -> Result<Self> {
        let vocab = Vocabulary::from_tag_list_file(path)?;
        info!("Loaded tag list from {} ({} tokens)", path.display(), vocab.size());
        Self::new(vocab)
    }

    /// Build from an in-memory tag list
    pub fn from_tags<I, S>(tags: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(VocabularyBuilder::new().add_tags(tags).build())
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    fn encode_plain(&self, text: &str, ids: &mut Vec<u32>) {
        for tag in text.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            ids.push(self.vocab.token_to_id(tag).unwrap_or(self.unk_token_id));
        }
    }

    fn decode_one(&self, id: u32, skip_special_tokens: bool) -> Result<&str> {
        if skip_special_tokens && self.vocab.is_special_id(id) {
            return Ok("");
        }
        self.vocab.id_to_token(id).ok_or_else(|| CoreError::Tokenizer {
            code: "TOKENIZER_UNKNOWN_ID",
            message: format!("Token id {} is not in the vocabulary", id),
            context: "Decoding token ids".to_string(),
            suggestion: "Check that the model and tokenizer share a vocabulary".to_string(),
            token: Some(id.to_string()),
        })
    }
}

impl Tokenizer for TagTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let mut ids = Vec::new();
        let mut last = 0;

        if let Some(pattern) = &self.added_pattern {
            for m in pattern.find_iter(text) {
                self.encode_plain(&text[last..m.start()], &mut ids);
                ids.push(self.vocab.token_to_id(m.as_str()).unwrap_or(self.unk_token_id));
                last = m.end();
            }
        }
        self.encode_plain(&text[last..], &mut ids);

        Ok(ids)
    }

    fn decode(&self, tokens: &[u32], skip_special_tokens: bool) -> Result<String> {
        Ok(self.decode_tags(tokens, skip_special_tokens)?.join(TAG_SEPARATOR))
    }

    fn decode_tags(&self, tokens: &[u32], skip_special_tokens: bool) -> Result<Vec<String>> {
        let mut tags = Vec::with_capacity(tokens.len());
        for &id in tokens {
            let tag = self.decode_one(id, skip_special_tokens)?;
            if !tag.is_empty() {
                tags.push(tag.to_string());
            }
        }
        Ok(tags)
    }

    fn vocab_size(&self) -> usize {
        self.vocab.id_space()
    }

    fn eos_token_id(&self) -> Option<u32> {
        self.vocab.eos_token_id()
    }

    fn unk_token_id(&self) -> Option<u32> {
        Some(self.unk_token_id)
    }

    fn id_to_token(&self, id: u32) -> Option<String> {
        self.vocab.id_to_token(id).map(str::to_string)
    }

    fn token_to_id(&self, token: &str) -> Option<u32> {
        self.vocab.token_to_id(token)
    }

    fn is_special_token(&self, id: u32) -> bool {
        self.vocab.is_special_id(id)
    }

    fn get_vocab(&self, include_added_tokens: bool) -> HashMap<String, u32> {
        self.vocab.to_map(include_added_tokens)
    }

    fn get_added_tokens(&self) -> Vec<String> {
        self.vocab.added_tokens().map(str::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::{compose, StructuredPrompt};

    fn tokenizer() -> TagTokenizer {
        TagTokenizer::from_tags(["1girl", "cat ears", "blue hair", "vocaloid", "hatsune miku"]).unwrap()
    }

    #[test]
    fn test_encode_tags() {
        let tok = tokenizer();
        let ids = tok.encode("1girl, cat ears").unwrap();
        assert_eq!(
            ids,
            vec![tok.token_to_id("1girl").unwrap(), tok.token_to_id("cat ears").unwrap()]
        );
    }

    #[test]
    fn test_unknown_tag_maps_to_unk() {
        let tok = tokenizer();
        let ids = tok.encode("1girl, wings").unwrap();
        assert_eq!(ids[1], tok.unk_token_id().unwrap());
    }

    #[test]
    fn test_decode_skips_special_tokens() {
        let tok = tokenizer();
        let ids = tok.encode("1girl, cat ears</general><|eos|>").unwrap();
        assert_eq!(ids.len(), 4);

        assert_eq!(tok.decode(&ids, true).unwrap(), "1girl, cat ears");
        assert_eq!(tok.decode_tags(&ids, true).unwrap(), vec!["1girl", "cat ears"]);
        assert_eq!(
            tok.decode_tags(&ids, false).unwrap(),
            vec!["1girl", "cat ears", "</general>", "<|eos|>"]
        );
    }

    #[test]
    fn test_compiled_prompt_tokenizes_structurally() {
        let tok = tokenizer();
        let prompt = compose(
            &StructuredPrompt::new("1girl, blue hair")
                .copyright("vocaloid")
                .character("hatsune miku"),
        );
        let ids = tok.encode(prompt.as_str()).unwrap();

        // bos, <copyright>, vocaloid, </copyright>, <character>, hatsune miku,
        // </character>, rating, aspect, length, <general>, 1girl, blue hair,
        // identity, input_end
        assert_eq!(ids.len(), 15);
        assert!(!ids.contains(&tok.unk_token_id().unwrap()));
        assert_eq!(tok.decode(&ids, true).unwrap(), "vocaloid, hatsune miku, 1girl, blue hair");
    }

    #[test]
    fn test_single_special_token_decodes_empty() {
        let tok = tokenizer();
        let eos = tok.eos_token_id().unwrap();
        assert_eq!(tok.decode(&[eos], true).unwrap(), "");
        assert_eq!(tok.decode(&[eos], false).unwrap(), "<|eos|>");
    }

    #[test]
    fn test_unknown_id_is_error() {
        let tok = tokenizer();
        let err = tok.decode(&[9999], true).unwrap_err();
        assert_eq!(err.code(), "TOKENIZER_UNKNOWN_ID");
    }

    #[test]
    fn test_vocab_introspection() {
        let tok = tokenizer();
        let added = tok.get_added_tokens();
        assert_eq!(added[0], "<|bos|>");
        assert!(added.contains(&"<|input_end|>".to_string()));
        assert_eq!(tok.get_vocab(false).len(), 5);
        assert_eq!(tok.get_vocab(true).len(), 5 + added.len());
        assert_eq!(tok.vocab_size(), 5 + added.len());
    }

    #[test]
    fn test_missing_unk_is_rejected() {
        let mut vocab = Vocabulary::new();
        vocab.add_token("1girl".to_string(), 0);
        let err = TagTokenizer::new(vocab).unwrap_err();
        assert_eq!(err.code(), "TOKENIZER_NO_UNK_TOKEN");
    }
}
