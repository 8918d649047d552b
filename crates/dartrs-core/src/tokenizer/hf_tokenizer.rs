//! HuggingFace `tokenizer.json` support
//!
//! Wraps [`tokenizers::Tokenizer`] so the file's model (WordLevel, BPE, Unigram),
//! normalizer, pre-tokenizer and decoder all apply exactly as the model was
//! trained. Decoding goes one id at a time so each tag stays a separate fragment.

use super::tag_tokenizer::TAG_SEPARATOR;
use super::Tokenizer;
use crate::tags::{ReservedTag, SpecialTag};
use crate::{CoreError, Result};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Tokenizer backed by a `tokenizer.json` file
#[derive(Debug, Clone)]
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
    special_ids: HashSet<u32>,
    id_space: usize,
    eos_token_id: Option<u32>,
    unk_token_id: Option<u32>,
}

impl HfTokenizer {
    /// Load a tokenizer from a `tokenizer.json` file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let inner = tokenizers::Tokenizer::from_file(path).map_err(|e| CoreError::Tokenizer {
            code: "TOKENIZER_LOAD_ERROR",
            message: format!("Failed to load tokenizer: {}", e),
            context: format!("Loading {}", path.display()),
            suggestion: "Check that the file is a valid tokenizer.json".to_string(),
            token: None,
        })?;

        let tokenizer = Self::from_inner(inner);
        info!(
            "Loaded tokenizer from {} ({} ids, {} special)",
            path.display(),
            tokenizer.id_space,
            tokenizer.special_ids.len()
        );
        Ok(tokenizer)
    }

    /// Create a tokenizer from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let inner = tokenizers::Tokenizer::from_bytes(json.as_bytes()).map_err(|e| {
            CoreError::tokenizer(
                "TOKENIZER_JSON_PARSE_ERROR",
                format!("Invalid tokenizer JSON: {}", e),
                "tokenizer.json parsing",
                "Check that the content is a valid tokenizer.json",
            )
        })?;
        Ok(Self::from_inner(inner))
    }

    fn from_inner(inner: tokenizers::Tokenizer) -> Self {
        let special_ids = inner
            .get_added_tokens_decoder()
            .into_iter()
            .filter(|(_, token)| token.special)
            .map(|(id, _)| id)
            .collect();
        let id_space = inner
            .get_vocab(true)
            .values()
            .max()
            .map_or(0, |&max| max as usize + 1);
        let eos_token_id = inner.token_to_id(ReservedTag::Eos.to_tag());
        let unk_token_id = inner.token_to_id(ReservedTag::Unk.to_tag());

        debug!(
            "HF tokenizer ready: {} ids, eos={:?}, unk={:?}",
            id_space, eos_token_id, unk_token_id
        );

        Self {
            inner,
            special_ids,
            id_space,
            eos_token_id,
            unk_token_id,
        }
    }

    /// Get the underlying `tokenizers::Tokenizer`
    pub fn inner(&self) -> &tokenizers::Tokenizer {
        &self.inner
    }

    fn decode_one(&self, id: u32, skip_special_tokens: bool) -> Result<String> {
        if self.inner.id_to_token(id).is_none() {
            return Err(CoreError::Tokenizer {
                code: "TOKENIZER_UNKNOWN_ID",
                message: format!("Token id {} is not in the vocabulary", id),
                context: "Decoding token ids".to_string(),
                suggestion: "Check that the model and tokenizer share a vocabulary".to_string(),
                token: Some(id.to_string()),
            });
        }
        self.inner
            .decode(&[id], skip_special_tokens)
            .map_err(|e| CoreError::Tokenizer {
                code: "TOKENIZER_DECODE_ERROR",
                message: format!("Failed to decode token: {}", e),
                context: "Decoding token ids".to_string(),
                suggestion: "Check the decoder section of tokenizer.json".to_string(),
                token: Some(id.to_string()),
            })
    }
}

impl Tokenizer for HfTokenizer {
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        // Compiled prompts already carry <|bos|>; no post-processor tokens
        let encoding = self.inner.encode(text, false).map_err(|e| {
            CoreError::tokenizer(
                "TOKENIZER_ENCODE_ERROR",
                format!("Failed to encode text: {}", e),
                "Encoding prompt",
                "Check the prompt text and tokenizer.json",
            )
        })?;
        Ok(encoding.get_ids().to_vec())
    }

    fn decode(&self, tokens: &[u32], skip_special_tokens: bool) -> Result<String> {
        Ok(self.decode_tags(tokens, skip_special_tokens)?.join(TAG_SEPARATOR))
    }

    fn decode_tags(&self, tokens: &[u32], skip_special_tokens: bool) -> Result<Vec<String>> {
        let mut tags = Vec::with_capacity(tokens.len());
        for &id in tokens {
            let tag = self.decode_one(id, skip_special_tokens)?;
            if !tag.is_empty() {
                tags.push(tag);
            }
        }
        Ok(tags)
    }

    fn vocab_size(&self) -> usize {
        self.id_space
    }

    fn eos_token_id(&self) -> Option<u32> {
        self.eos_token_id
    }

    fn unk_token_id(&self) -> Option<u32> {
        self.unk_token_id
    }

    fn id_to_token(&self, id: u32) -> Option<String> {
        self.inner.id_to_token(id)
    }

    fn token_to_id(&self, token: &str) -> Option<u32> {
        self.inner.token_to_id(token)
    }

    fn is_special_token(&self, id: u32) -> bool {
        self.special_ids.contains(&id)
    }

    fn get_vocab(&self, include_added_tokens: bool) -> HashMap<String, u32> {
        self.inner.get_vocab(include_added_tokens)
    }

    fn get_added_tokens(&self) -> Vec<String> {
        let mut added: Vec<(u32, String)> = self
            .inner
            .get_added_tokens_decoder()
            .into_iter()
            .map(|(id, token)| (id, token.content))
            .collect();
        added.sort_by_key(|(id, _)| *id);
        added.into_iter().map(|(_, content)| content).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::{compose, StructuredPrompt};
    use std::io::Write;

    fn added(id: u32, content: &str) -> String {
        format!(
            r#"{{"id": {id}, "content": "{content}", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true}}"#
        )
    }

    fn word_level_json() -> String {
        let specials = [
            "<|bos|>", "<|eos|>", "<|unk|>", "<general>", "</general>", "<|input_end|>",
        ];
        let added_tokens = specials
            .iter()
            .enumerate()
            .map(|(id, content)| added(id as u32, content))
            .collect::<Vec<_>>()
            .join(", ");
        let vocab = specials
            .iter()
            .chain(["1girl", "cat ears", "blue hair"].iter())
            .enumerate()
            .map(|(id, token)| format!(r#""{token}": {id}"#))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            r#"{{
                "version": "1.0",
                "added_tokens": [{added_tokens}],
                "normalizer": null,
                "pre_tokenizer": {{
                    "type": "Split",
                    "pattern": {{"Regex": "\\s*,\\s*"}},
                    "behavior": "Removed",
                    "invert": false
                }},
                "post_processor": null,
                "decoder": null,
                "model": {{"type": "WordLevel", "vocab": {{{vocab}}}, "unk_token": "<|unk|>"}}
            }}"#
        )
    }

    fn tokenizer() -> HfTokenizer {
        HfTokenizer::from_json(&word_level_json()).unwrap()
    }

    #[test]
    fn test_reserved_ids_resolved() {
        let tok = tokenizer();
        assert_eq!(tok.eos_token_id(), Some(1));
        assert_eq!(tok.unk_token_id(), Some(2));
        assert_eq!(tok.vocab_size(), 9);
        assert!(tok.is_special_token(0));
        assert!(!tok.is_special_token(6));
    }

    #[test]
    fn test_encode_splits_added_tokens_and_tags() {
        let tok = tokenizer();
        let ids = tok.encode("<general>1girl, cat ears, wings</general>").unwrap();
        assert_eq!(ids, vec![3, 6, 7, 2, 4]);
    }

    #[test]
    fn test_decode_tags_one_fragment_per_token() {
        let tok = tokenizer();
        let ids = [6, 7, 4, 1];
        assert_eq!(tok.decode_tags(&ids, true).unwrap(), vec!["1girl", "cat ears"]);
        assert_eq!(tok.decode(&ids, true).unwrap(), "1girl, cat ears");
        assert_eq!(
            tok.decode_tags(&ids, false).unwrap(),
            vec!["1girl", "cat ears", "</general>", "<|eos|>"]
        );
    }

    #[test]
    fn test_compiled_prompt_ends_with_input_end() {
        let tok = tokenizer();
        let prompt = compose(&StructuredPrompt::new("1girl, blue hair"));
        let ids = tok.encode(prompt.as_str()).unwrap();
        assert_eq!(ids.first(), Some(&0));
        assert_eq!(ids.last(), Some(&5));
        // <general> opens the general section
        let general = ids.iter().position(|&id| id == 3).unwrap();
        assert_eq!(ids[general + 1], 6);
    }

    #[test]
    fn test_unknown_id_is_error() {
        let tok = tokenizer();
        let err = tok.decode(&[9999], true).unwrap_err();
        assert_eq!(err.code(), "TOKENIZER_UNKNOWN_ID");
    }

    #[test]
    fn test_added_tokens_in_id_order() {
        let tok = tokenizer();
        let added = tok.get_added_tokens();
        assert_eq!(added.len(), 6);
        assert_eq!(added[0], "<|bos|>");
        assert_eq!(added[5], "<|input_end|>");
        assert_eq!(tok.get_vocab(true).get("cat ears"), Some(&7));
    }

    #[test]
    fn test_unigram_model_loads() {
        let json = format!(
            r#"{{
                "version": "1.0",
                "added_tokens": [{}, {}, {}],
                "model": {{
                    "type": "Unigram",
                    "unk_id": 2,
                    "vocab": [["<|bos|>", 0.0], ["<|eos|>", 0.0], ["<|unk|>", 0.0], ["1girl", -1.0], ["solo", -2.0]]
                }}
            }}"#,
            added(0, "<|bos|>"),
            added(1, "<|eos|>"),
            added(2, "<|unk|>")
        );

        let tok = HfTokenizer::from_json(&json).unwrap();
        assert_eq!(tok.eos_token_id(), Some(1));
        assert_eq!(tok.token_to_id("solo"), Some(4));
        assert_eq!(tok.vocab_size(), 5);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(word_level_json().as_bytes()).unwrap();

        let tok = HfTokenizer::from_file(file.path()).unwrap();
        assert_eq!(tok.token_to_id("blue hair"), Some(8));
    }

    #[test]
    fn test_invalid_json_is_error() {
        let err = HfTokenizer::from_json("{not json").unwrap_err();
        assert_eq!(err.code(), "TOKENIZER_JSON_PARSE_ERROR");

        let err = HfTokenizer::from_file("/nonexistent/tokenizer.json").unwrap_err();
        assert_eq!(err.code(), "TOKENIZER_LOAD_ERROR");
    }
}
