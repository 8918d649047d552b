//! dartrs Core - tag-based generation controller
//!
//! This crate compiles structured image metadata (rating, aspect ratio, length,
//! identity, copyright, character and general tags) into the prompt format a
//! tag-generation language model was trained on, and drives token-by-token
//! generation over that model with a configurable sampling policy.

// Module declarations
pub mod config;
pub mod generation;
pub mod model;
pub mod prompt;
pub mod tags;
pub mod tokenizer;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// Tokenizer loading or encode/decode errors
    #[error("Tokenizer error [{code}]: {message}\nContext: {context}\nSuggestion: {suggestion}")]
    Tokenizer {
        code: &'static str,
        message: String,
        context: String,
        suggestion: String,
        token: Option<String>,
    },

    /// Failures reported by the scoring model
    #[error("Model error [{code}]: {message}\nContext: {context}\nSuggestion: {suggestion}")]
    Model {
        code: &'static str,
        message: String,
        context: String,
        suggestion: String,
        file_path: Option<std::path::PathBuf>,
    },

    /// Generation state errors (stepping a finished cache, reusing a stream)
    #[error("Generation error [{code}]: {message}\nContext: {context}\nSuggestion: {suggestion}")]
    Generation {
        code: &'static str,
        message: String,
        context: String,
        suggestion: String,
        generation_id: Option<String>,
    },

    /// The sampling filters left no candidate token to draw from
    #[error("Sampling error [{code}]: {message}\nContext: {context}\nSuggestion: {suggestion}")]
    Sampling {
        code: &'static str,
        message: String,
        context: String,
        suggestion: String,
        vocab_size: usize,
        banned: usize,
    },

    /// Input validation and parameter errors
    #[error("Invalid input [{code}]: {message}\nContext: {context}\nSuggestion: {suggestion}")]
    InvalidInput {
        code: &'static str,
        message: String,
        context: String,
        suggestion: String,
        parameter_name: Option<String>,
        value: Option<String>,
        valid_range: Option<String>,
    },

    /// Configuration parsing and validation errors
    #[error("Configuration error [{code}]: {message}\nContext: {context}\nSuggestion: {suggestion}")]
    Configuration {
        code: &'static str,
        message: String,
        context: String,
        suggestion: String,
        config_path: Option<std::path::PathBuf>,
        field_name: Option<String>,
    },

    /// File system and I/O errors
    #[error("IO error [{code}]: {message}\nPath: {path:?}\nSuggestion: {suggestion}")]
    Io {
        code: &'static str,
        message: String,
        path: Option<std::path::PathBuf>,
        suggestion: String,
        #[source]
        source: std::io::Error,
    },

    /// Other unexpected errors
    #[error("Internal error [{code}]: {message}\nContext: {context}")]
    Internal {
        code: &'static str,
        message: String,
        context: String,
        #[source]
        source: Option<anyhow::Error>,
    },
}

pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Create a tokenizer error with context
    pub fn tokenizer<S1, S2, S3>(
        code: &'static str,
        message: S1,
        context: S2,
        suggestion: S3,
    ) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self::Tokenizer {
            code,
            message: message.into(),
            context: context.into(),
            suggestion: suggestion.into(),
            token: None,
        }
    }

    /// Create a model (scoring) error with context
    pub fn model<S1, S2, S3>(
        code: &'static str,
        message: S1,
        context: S2,
        suggestion: S3,
    ) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self::Model {
            code,
            message: message.into(),
            context: context.into(),
            suggestion: suggestion.into(),
            file_path: None,
        }
    }

    /// Create a model error with file path
    pub fn model_with_path<S1, S2, S3, P>(
        code: &'static str,
        message: S1,
        context: S2,
        suggestion: S3,
        path: P,
    ) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
        P: Into<std::path::PathBuf>,
    {
        Self::Model {
            code,
            message: message.into(),
            context: context.into(),
            suggestion: suggestion.into(),
            file_path: Some(path.into()),
        }
    }

    /// Create a generation state error
    pub fn generation<S1, S2, S3>(
        code: &'static str,
        message: S1,
        context: S2,
        suggestion: S3,
    ) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self::Generation {
            code,
            message: message.into(),
            context: context.into(),
            suggestion: suggestion.into(),
            generation_id: None,
        }
    }

    /// Create a sampling-exhausted error
    pub fn sampling_exhausted<S: Into<String>>(context: S, vocab_size: usize, banned: usize) -> Self {
        Self::Sampling {
            code: "SAMPLING_EXHAUSTED",
            message: "No candidate token left after ban list and top-k/top-p filtering".to_string(),
            context: context.into(),
            suggestion: "Loosen top_k/top_p or shrink the ban list".to_string(),
            vocab_size,
            banned,
        }
    }

    /// Create an invalid input error
    pub fn invalid_input<S1, S2, S3>(
        code: &'static str,
        message: S1,
        context: S2,
        suggestion: S3,
    ) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self::InvalidInput {
            code,
            message: message.into(),
            context: context.into(),
            suggestion: suggestion.into(),
            parameter_name: None,
            value: None,
            valid_range: None,
        }
    }

    /// Create an invalid input error with parameter validation details
    pub fn invalid_parameter<S1, S2, S3, S4, S5, S6>(
        code: &'static str,
        message: S1,
        context: S2,
        suggestion: S3,
        param_name: S4,
        value: S5,
        valid_range: S6,
    ) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
        S4: Into<String>,
        S5: Into<String>,
        S6: Into<String>,
    {
        Self::InvalidInput {
            code,
            message: message.into(),
            context: context.into(),
            suggestion: suggestion.into(),
            parameter_name: Some(param_name.into()),
            value: Some(value.into()),
            valid_range: Some(valid_range.into()),
        }
    }

    /// Create a configuration error
    pub fn configuration<S1, S2, S3>(
        code: &'static str,
        message: S1,
        context: S2,
        suggestion: S3,
    ) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self::Configuration {
            code,
            message: message.into(),
            context: context.into(),
            suggestion: suggestion.into(),
            config_path: None,
            field_name: None,
        }
    }

    /// Get the error code for programmatic handling
    pub fn code(&self) -> &'static str {
        match self {
            Self::Tokenizer { code, .. } => code,
            Self::Model { code, .. } => code,
            Self::Generation { code, .. } => code,
            Self::Sampling { code, .. } => code,
            Self::InvalidInput { code, .. } => code,
            Self::Configuration { code, .. } => code,
            Self::Io { code, .. } => code,
            Self::Internal { code, .. } => code,
        }
    }

    /// Attach the id of the generation call that produced this error
    pub fn with_generation_id(mut self, id: &str) -> Self {
        if let Self::Generation { generation_id, .. } = &mut self {
            *generation_id = Some(id.to_string());
        }
        self
    }

    /// The sampling filters removed every candidate
    pub fn is_sampling_exhausted(&self) -> bool {
        matches!(self, Self::Sampling { .. })
    }

    /// The scoring model failed; the generation call was aborted
    pub fn is_scoring_failure(&self) -> bool {
        matches!(self, Self::Model { .. })
    }

    /// A generation cache or stream was used in an invalid state
    pub fn is_state_error(&self) -> bool {
        matches!(self, Self::Generation { .. })
    }

    /// Invalid configuration or parameter rejected at construction time
    pub fn is_construction_error(&self) -> bool {
        matches!(self, Self::InvalidInput { .. } | Self::Configuration { .. })
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        let (code, suggestion) = match err.kind() {
            std::io::ErrorKind::NotFound => (
                "IO_FILE_NOT_FOUND",
                "Check that the file path is correct and the file exists"
            ),
            std::io::ErrorKind::PermissionDenied => (
                "IO_PERMISSION_DENIED",
                "Check file permissions or run with appropriate privileges"
            ),
            std::io::ErrorKind::InvalidData => (
                "IO_INVALID_DATA",
                "The file may be corrupted or in an unexpected format"
            ),
            _ => (
                "IO_UNKNOWN",
                "Check the file system and try the operation again"
            ),
        };

        Self::Io {
            code,
            message: err.to_string(),
            path: None,
            suggestion: suggestion.to_string(),
            source: err,
        }
    }
}

impl From<anyhow::Error> for CoreError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal {
            code: "INTERNAL_UNKNOWN",
            message: err.to_string(),
            context: "An unexpected error occurred".to_string(),
            source: Some(err),
        }
    }
}

/// Prelude module for common imports
pub mod prelude {
    pub use crate::{
        config::{EngineConfig, GenerationDefaults, PromptDefaults},
        generation::{
            cache::{GenerationCache, GenerationState},
            channel::{spawn_generation, StreamEvent},
            pipeline::{GenerationStream, TextGenerator},
            sampling::LogitsProcessor,
            FinishReason, GenerationConfig, GenerationConfigBuilder, GenerationResult,
            GenerationStats,
        },
        model::{bigram::BigramModel, Model},
        prompt::{compose, CompiledPrompt, StructuredPrompt},
        tags::{
            AspectRatioTag, ControlTag, IdentityTag, LengthTag, RatingTag, ReservedTag,
            SpecialTag, TagCategory,
        },
        tokenizer::{
            hf_tokenizer::HfTokenizer, tag_tokenizer::TagTokenizer, vocab::Vocabulary, Tokenizer,
        },
        CoreError, Result,
    };
}

// Re-export key types at the crate root
pub use generation::{pipeline::TextGenerator, GenerationConfig};
pub use model::Model;
pub use prompt::{compose, StructuredPrompt};
pub use tokenizer::Tokenizer;

pub mod error {
    pub use super::{CoreError, Result};
}
