//! Tokenize command: show token ids and tags for a piece of text, or decode ids

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Args;
use serde_json::json;
use std::path::PathBuf;

use crate::commands::{load_tokenizer, Command};
use crate::config::resolve_path;
use crate::utils::print_output;
use dartrs_core::prelude::*;

#[derive(Args, Debug)]
pub struct TokenizeCommand {
    /// Text to tokenize (typically a compiled prompt), or token ids with --decode
    pub text: String,

    /// Path to tokenizer.json or a tag list
    #[arg(long)]
    pub tokenizer: Option<PathBuf>,

    /// Treat the input as comma- or space-separated token ids and decode them
    #[arg(long)]
    pub decode: bool,

    /// Drop special tokens from the tag view
    #[arg(long)]
    pub skip_special: bool,
}

#[async_trait]
impl Command for TokenizeCommand {
    async fn execute(&self, config: &EngineConfig, json_output: bool) -> Result<()> {
        let path = resolve_path(
            self.tokenizer.as_deref(),
            config.tokenizer_path.as_deref(),
            "tokenizer",
        )?;
        let tokenizer = load_tokenizer(&path)?;

        let ids = if self.decode {
            parse_ids(&self.text)?
        } else {
            tokenizer.encode(&self.text)?
        };
        let tokens = tokenizer.decode_tags(&ids, self.skip_special)?;
        let text = tokenizer.decode(&ids, true)?;
        let unknown = tokenizer
            .unk_token_id()
            .map(|unk| ids.iter().filter(|&&id| id == unk).count())
            .unwrap_or(0);

        let output = json!({
            "ids": ids,
            "tokens": tokens,
            "text": text,
            "count": ids.len(),
            "unknown": unknown,
        });
        print_output(&output, json_output)
    }
}

fn parse_ids(input: &str) -> Result<Vec<u32>> {
    input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u32>().with_context(|| format!("Invalid token id: {s}")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ids() {
        assert_eq!(parse_ids("1, 2 3,4").unwrap(), vec![1, 2, 3, 4]);
        assert!(parse_ids("1, x").is_err());
        assert!(parse_ids("").unwrap().is_empty());
    }
}
