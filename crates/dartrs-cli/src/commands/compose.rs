//! Compose command: print the compiled prompt

use anyhow::Result;
use async_trait::async_trait;
use clap::Args;
use serde_json::json;
use tracing::debug;

use crate::commands::{Command, PromptArgs};
use crate::utils::print_output;
use dartrs_core::prelude::*;

#[derive(Args, Debug)]
pub struct ComposeCommand {
    #[command(flatten)]
    pub prompt: PromptArgs,
}

#[async_trait]
impl Command for ComposeCommand {
    async fn execute(&self, config: &EngineConfig, json_output: bool) -> Result<()> {
        let prompt = self.prompt.to_prompt(&config.prompt);
        debug!("Composing prompt: {:?}", prompt);
        let compiled = compose(&prompt);

        if json_output {
            let output = json!({
                "prompt": compiled.as_str(),
                "structured": prompt,
            });
            print_output(&output, true)?;
        } else {
            println!("{}", compiled);
        }
        Ok(())
    }
}
