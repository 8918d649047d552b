//! dartrs CLI - compose tag prompts and generate tags from the command line

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use std::path::PathBuf;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

mod commands;
mod config;
mod utils;

use commands::{compose::ComposeCommand, generate::GenerateCommand, tokenize::TokenizeCommand, Command};

#[derive(Parser)]
#[command(
    name = "dartrs",
    version = env!("CARGO_PKG_VERSION"),
    about = "Tag-based prompt compiler and generation controller",
    long_about = "Compose structured tag prompts, inspect their tokenization, and sample tag completions from a scoring model."
)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Quiet output (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "DARTRS_CONFIG")]
    config: Option<PathBuf>,

    /// JSON output format
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a structured prompt
    #[command(name = "compose", alias = "c")]
    Compose(ComposeCommand),

    /// Show how text tokenizes
    #[command(name = "tokenize", alias = "t")]
    Tokenize(TokenizeCommand),

    /// Generate tags
    #[command(name = "generate", alias = "gen", alias = "g")]
    Generate(GenerateCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {:#}", style("Error:").red().bold(), e);
            std::process::exit(1);
        }
    };

    init_logging(&cli, &config)?;

    debug!("dartrs CLI v{} starting", env!("CARGO_PKG_VERSION"));
    debug!("Configuration loaded: {:?}", config);

    let result = match cli.command {
        Commands::Compose(cmd) => cmd.execute(&config, cli.json).await,
        Commands::Tokenize(cmd) => cmd.execute(&config, cli.json).await,
        Commands::Generate(cmd) => cmd.execute(&config, cli.json).await,
    };

    match result {
        Ok(_) => {
            if !cli.quiet {
                info!("Command completed successfully");
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {:#}", style("Error:").red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn init_logging(cli: &Cli, config: &dartrs_core::config::EngineConfig) -> Result<()> {
    let level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else if cli.quiet {
        Level::ERROR
    } else {
        config.logging.level.as_str().parse().unwrap_or(Level::WARN)
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
