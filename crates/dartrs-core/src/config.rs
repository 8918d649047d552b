//! Configuration for the generation engine

use crate::generation::{
    validate_sampling, DEFAULT_MAX_NEW_TOKENS, DEFAULT_TEMPERATURE, DEFAULT_TOP_K, DEFAULT_TOP_P,
};
use crate::prompt::StructuredPrompt;
use crate::tags::{AspectRatioTag, IdentityTag, LengthTag, RatingTag};
use crate::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration for the generation engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Path to a tokenizer.json file or a plain tag list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokenizer_path: Option<PathBuf>,

    /// Path to the scoring model file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_path: Option<PathBuf>,

    /// Sampling defaults
    pub generation: GenerationDefaults,

    /// Prompt compiler defaults
    pub prompt: PromptDefaults,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Default sampling parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationDefaults {
    pub max_new_tokens: usize,
    pub temperature: f32,
    pub top_k: usize,
    pub top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eos_token: Option<String>,
    /// Tags that are never generated
    pub ban_tags: Vec<String>,
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            top_k: DEFAULT_TOP_K,
            top_p: DEFAULT_TOP_P,
            seed: None,
            eos_token: None,
            ban_tags: Vec::new(),
        }
    }
}

/// Default control tags for composed prompts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptDefaults {
    pub rating: RatingTag,
    pub aspect_ratio: AspectRatioTag,
    pub length: LengthTag,
    pub identity: IdentityTag,
    pub do_completion: bool,
}

impl Default for PromptDefaults {
    fn default() -> Self {
        let prompt = StructuredPrompt::default();
        Self {
            rating: prompt.rating,
            aspect_ratio: prompt.aspect_ratio,
            length: prompt.length,
            identity: prompt.identity,
            do_completion: prompt.do_completion,
        }
    }
}

impl PromptDefaults {
    /// Start a structured prompt carrying these control tags
    pub fn to_prompt(&self, general_tags: impl Into<String>) -> StructuredPrompt {
        StructuredPrompt::new(general_tags)
            .rating(self.rating)
            .aspect_ratio(self.aspect_ratio)
            .length(self.length)
            .identity(self.identity)
            .do_completion(self.do_completion)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level used when no verbosity flag is given
    pub level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Warn,
        }
    }
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl EngineConfig {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Self::file_error(path, e.to_string()))?;
        let config: Self = toml::from_str(&content).map_err(|e| Self::file_error(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| {
            CoreError::configuration(
                "CONFIG_SERIALIZE_ERROR",
                format!("Failed to serialize configuration: {}", e),
                "Saving configuration",
                "Report this as a bug",
            )
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        validate_sampling(self.generation.temperature, self.generation.top_p)?;

        if self.generation.ban_tags.iter().any(|tag| tag.trim().is_empty()) {
            return Err(CoreError::Configuration {
                code: "CONFIG_EMPTY_BAN_TAG",
                message: "ban_tags contains an empty entry".to_string(),
                context: "Validating generation defaults".to_string(),
                suggestion: "Remove empty strings from ban_tags".to_string(),
                config_path: None,
                field_name: Some("generation.ban_tags".to_string()),
            });
        }

        Ok(())
    }

    fn file_error(path: &Path, message: String) -> CoreError {
        CoreError::Configuration {
            code: "CONFIG_LOAD_ERROR",
            message,
            context: "Loading configuration file".to_string(),
            suggestion: "Check that the file exists and is valid TOML".to_string(),
            config_path: Some(path.to_path_buf()),
            field_name: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.generation.max_new_tokens, 256);
        assert_eq!(config.generation.top_k, 100);
        assert_eq!(config.prompt.rating, RatingTag::Sfw);
        assert_eq!(config.prompt.aspect_ratio, AspectRatioTag::Tall);
        assert!(config.prompt.do_completion);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig::default();
        config.generation.temperature = 0.0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.generation.ban_tags.push(" ".to_string());
        assert_eq!(config.validate().unwrap_err().code(), "CONFIG_EMPTY_BAN_TAG");
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = EngineConfig::default();
        config.generation.seed = Some(42);
        config.generation.ban_tags = vec!["animal ears".to_string()];
        config.prompt.rating = RatingTag::General;
        config.to_file(&path).unwrap();

        let loaded = EngineConfig::from_file(&path).unwrap();
        assert_eq!(loaded.generation, config.generation);
        assert_eq!(loaded.prompt, config.prompt);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[generation]\ntop_p = 1.0\n\n[prompt]\nlength = \"very_short\"\n",
        )
        .unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.generation.top_p, 1.0);
        assert_eq!(config.generation.top_k, 100);
        assert_eq!(config.prompt.length, LengthTag::VeryShort);
    }
}
