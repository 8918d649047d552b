//! Configuration management for dartrs CLI

use anyhow::{Context, Result};
use dartrs_core::config::EngineConfig;
use std::path::{Path, PathBuf};

/// Load configuration from the given file, or from the default location when it exists
pub fn load(config_path: Option<&Path>) -> Result<EngineConfig> {
    match config_path {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("Failed to load config file: {}", path.display())),
        None => {
            let path = default_config_path();
            if path.exists() {
                EngineConfig::from_file(&path)
                    .with_context(|| format!("Failed to load config file: {}", path.display()))
            } else {
                Ok(EngineConfig::default())
            }
        }
    }
}

/// Get default configuration file path
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".config"))
        .join("dartrs")
        .join("config.toml")
}

/// Pick the command-line path over the configured one and expand `~` and variables
pub fn resolve_path(cli: Option<&Path>, configured: Option<&Path>, what: &str) -> Result<PathBuf> {
    let path = cli.or(configured).with_context(|| {
        format!(
            "No {what} given. Pass --{what} or set {what}_path in {}",
            default_config_path().display()
        )
    })?;

    let raw = path.to_string_lossy();
    let expanded = shellexpand::full(&raw)
        .with_context(|| format!("Failed to expand {what} path: {raw}"))?;
    Ok(PathBuf::from(expanded.as_ref()))
}
