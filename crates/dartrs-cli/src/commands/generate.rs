//! Generate command: compose a prompt and sample tags from a scoring model

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Args;
use serde_json::json;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::commands::{load_tokenizer, Command, PromptArgs};
use crate::config::resolve_path;
use crate::utils::{format_duration, print_output, print_stats};
use dartrs_core::prelude::*;

#[derive(Args, Debug)]
pub struct GenerateCommand {
    #[command(flatten)]
    pub prompt: PromptArgs,

    /// Use this text as the compiled prompt instead of composing one
    #[arg(long, conflicts_with_all = ["copyright", "character", "rating", "aspect_ratio", "length", "identity", "no_completion"])]
    pub raw_prompt: Option<String>,

    /// Path to tokenizer.json or a tag list
    #[arg(long)]
    pub tokenizer: Option<PathBuf>,

    /// Path to the scoring model table (JSON)
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// Maximum number of tags to generate
    #[arg(long)]
    pub max_new_tokens: Option<usize>,

    /// Sampling temperature (> 0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Keep the k most likely tags (0 disables)
    #[arg(long)]
    pub top_k: Option<usize>,

    /// Nucleus sampling threshold in (0, 1]
    #[arg(long)]
    pub top_p: Option<f32>,

    /// Random seed for reproducible output
    #[arg(long)]
    pub seed: Option<u64>,

    /// Stop token (defaults to the tokenizer's <|eos|>)
    #[arg(long)]
    pub eos_token: Option<String>,

    /// Tag that must never be generated (repeatable)
    #[arg(long = "ban", value_name = "TAG")]
    pub ban: Vec<String>,

    /// Print tags as they are sampled
    #[arg(long)]
    pub stream: bool,
}

#[async_trait]
impl Command for GenerateCommand {
    async fn execute(&self, config: &EngineConfig, json_output: bool) -> Result<()> {
        debug!("Executing generate command: {:?}", self);

        let tokenizer_path = resolve_path(
            self.tokenizer.as_deref(),
            config.tokenizer_path.as_deref(),
            "tokenizer",
        )?;
        let model_path = resolve_path(self.model.as_deref(), config.model_path.as_deref(), "model")?;

        let tokenizer = load_tokenizer(&tokenizer_path)?;
        let model = BigramModel::from_file(&model_path)
            .with_context(|| format!("Failed to load model: {}", model_path.display()))?;
        info!("Using model '{}' ({} tokens)", model.name(), model.vocab_size());

        let prompt = match &self.raw_prompt {
            Some(raw) => raw.clone(),
            None => self.prompt.to_prompt(&config.prompt).compose().into_string(),
        };
        let generation_config = self.build_config(prompt, config, tokenizer.as_ref())?;
        let generator = TextGenerator::new(Arc::new(model), tokenizer);

        if self.stream && !json_output {
            self.run_streaming(generator, generation_config).await
        } else {
            let result = generator.generate_with_details(&generation_config)?;
            self.print_result(&result, json_output)
        }
    }
}

impl GenerateCommand {
    fn build_config(
        &self,
        prompt: String,
        config: &EngineConfig,
        tokenizer: &dyn Tokenizer,
    ) -> Result<GenerationConfig> {
        let defaults = &config.generation;
        let mut builder = GenerationConfig::builder(prompt)
            .apply_defaults(defaults)
            .ban_tags(tokenizer, &defaults.ban_tags)?
            .ban_tags(tokenizer, &self.ban)?;

        if let Some(max_new_tokens) = self.max_new_tokens {
            builder = builder.max_new_tokens(max_new_tokens);
        }
        if let Some(temperature) = self.temperature {
            builder = builder.temperature(temperature);
        }
        if let Some(top_k) = self.top_k {
            builder = builder.top_k(top_k);
        }
        if let Some(top_p) = self.top_p {
            builder = builder.top_p(top_p);
        }
        if let Some(seed) = self.seed {
            builder = builder.seed(seed);
        }
        if let Some(eos_token) = &self.eos_token {
            builder = builder.eos_token(eos_token.as_str());
        }

        Ok(builder.build()?)
    }

    async fn run_streaming(&self, generator: TextGenerator<BigramModel>, config: GenerationConfig) -> Result<()> {
        let (mut events, handle) = spawn_generation(generator, config, 16);
        let mut stdout = io::stdout();
        let mut first = true;

        while let Some(event) = events.recv().await {
            match event {
                StreamEvent::Fragment(fragment) => {
                    if fragment.is_empty() {
                        continue;
                    }
                    if !first {
                        write!(stdout, ", ")?;
                    }
                    write!(stdout, "{}", fragment)?;
                    stdout.flush()?;
                    first = false;
                }
                StreamEvent::Finished(result) => {
                    writeln!(stdout)?;
                    self.print_stats(&result);
                }
                StreamEvent::Failed(e) => {
                    writeln!(stdout)?;
                    return Err(e.into());
                }
            }
        }

        handle.await.context("Generation task panicked")?;
        Ok(())
    }

    fn print_result(&self, result: &GenerationResult, json_output: bool) -> Result<()> {
        if json_output {
            let output = json!({
                "generation_id": result.generation_id,
                "text": result.text,
                "tokens": result.tokens,
                "finish_reason": result.finish_reason,
                "stats": result.stats,
            });
            print_output(&output, true)
        } else {
            println!("{}", result.text);
            self.print_stats(result);
            Ok(())
        }
    }

    fn print_stats(&self, result: &GenerationResult) {
        let total = Duration::from_secs_f64(result.stats.total_time_ms / 1000.0);
        print_stats(&format!(
            "{} tokens in {} ({:.1} tok/s), finish: {:?}",
            result.tokens_generated,
            format_duration(total),
            result.stats.tokens_per_second,
            result.finish_reason,
        ));
    }
}
