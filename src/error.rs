use crate::llm::{ChainError, LlmError, OutputParseError};
use crate::query_constructor::parser::ParseError;
use crate::query_constructor::PromptError;
use crate::store::StoreError;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for selfquery
#[derive(Error, Debug)]
pub enum SelfQueryError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Query constructor prompt could not be built
    #[error("error loading query constructor: {0}")]
    Prompt(#[from] PromptError),

    /// Language model call failed
    #[error(transparent)]
    Llm(#[from] LlmError),

    /// Model output was not valid JSON inside its markdown block
    #[error("wrong json returned by json markdown parser: {0}")]
    MalformedOutput(#[from] OutputParseError),

    /// Model output had the wrong shape
    #[error("wrong type returned by json markdown parser: {field} must be {expected}")]
    WrongOutputType {
        field: &'static str,
        expected: &'static str,
    },

    /// Filter expression could not be parsed
    #[error("query constructor couldn't parse filter: {0}")]
    FilterParse(#[from] ParseError),

    /// Document store failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ChainError> for SelfQueryError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::Prompt(e) => SelfQueryError::Prompt(e),
            ChainError::Llm(e) => SelfQueryError::Llm(e),
            ChainError::Output(e) => SelfQueryError::MalformedOutput(e),
        }
    }
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for selfquery operations
pub type Result<T> = std::result::Result<T, SelfQueryError>;
