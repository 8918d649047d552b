//! Command implementations for dartrs CLI

pub mod compose;
pub mod generate;
pub mod tokenize;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Args;
use dartrs_core::config::PromptDefaults;
use dartrs_core::prelude::*;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Trait for CLI command execution
#[async_trait]
pub trait Command {
    /// Execute the command
    async fn execute(&self, config: &EngineConfig, json_output: bool) -> Result<()>;
}

/// Structured prompt fields shared by `compose` and `generate`
#[derive(Args, Debug, Clone, Default)]
pub struct PromptArgs {
    /// Comma-separated general tags
    #[arg(default_value = "")]
    pub general: String,

    /// Copyright tags
    #[arg(long, default_value = "")]
    pub copyright: String,

    /// Character tags
    #[arg(long, default_value = "")]
    pub character: String,

    /// Rating (sfw, general, sensitive, nsfw, questionable, explicit)
    #[arg(long)]
    pub rating: Option<RatingTag>,

    /// Aspect ratio (ultra_wide, wide, square, tall, ultra_tall)
    #[arg(long)]
    pub aspect_ratio: Option<AspectRatioTag>,

    /// Target length (very_short, short, medium, long, very_long)
    #[arg(long)]
    pub length: Option<LengthTag>,

    /// Identity strictness (none, lax, strict)
    #[arg(long)]
    pub identity: Option<IdentityTag>,

    /// Leave the general section open instead of closing the input
    #[arg(long)]
    pub no_completion: bool,
}

impl PromptArgs {
    /// Merge with configured defaults; flags win
    pub fn to_prompt(&self, defaults: &PromptDefaults) -> StructuredPrompt {
        let mut prompt = defaults
            .to_prompt(self.general.as_str())
            .copyright(self.copyright.as_str())
            .character(self.character.as_str());

        if let Some(rating) = self.rating {
            prompt = prompt.rating(rating);
        }
        if let Some(aspect_ratio) = self.aspect_ratio {
            prompt = prompt.aspect_ratio(aspect_ratio);
        }
        if let Some(length) = self.length {
            prompt = prompt.length(length);
        }
        if let Some(identity) = self.identity {
            prompt = prompt.identity(identity);
        }
        if self.no_completion {
            prompt = prompt.do_completion(false);
        }
        prompt
    }
}

/// Load a `tokenizer.json` file, or a plain tag list for any other extension
pub fn load_tokenizer(path: &Path) -> Result<Arc<dyn Tokenizer>> {
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let tokenizer: Arc<dyn Tokenizer> = if is_json {
        Arc::new(
            HfTokenizer::from_file(path)
                .with_context(|| format!("Failed to load tokenizer: {}", path.display()))?,
        )
    } else {
        Arc::new(
            TagTokenizer::from_tag_list_file(path)
                .with_context(|| format!("Failed to load tokenizer: {}", path.display()))?,
        )
    };

    info!("Tokenizer vocabulary: {} tokens", tokenizer.vocab_size());
    Ok(tokenizer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let defaults = PromptDefaults {
            rating: RatingTag::General,
            ..Default::default()
        };
        let args = PromptArgs {
            general: "1girl".to_string(),
            length: Some(LengthTag::Short),
            no_completion: true,
            ..Default::default()
        };

        let prompt = args.to_prompt(&defaults);
        assert_eq!(prompt.rating, RatingTag::General);
        assert_eq!(prompt.length, LengthTag::Short);
        assert_eq!(prompt.aspect_ratio, AspectRatioTag::Tall);
        assert!(!prompt.do_completion);
        assert_eq!(prompt.general_tags, "1girl");
    }
}
