//! Language model seam, output parsing and the prompt-to-JSON chain

mod chain;
mod openai;
mod output_parser;

pub use chain::{ChainError, LlmChain};
pub use openai::OpenAiCompatibleModel;
pub use output_parser::{JsonMarkdownParser, OutputParseError};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("LLM client initialization failed: {0}")]
    InitializationError(String),

    #[error("LLM request failed: {0}")]
    RequestError(String),

    #[error("{provider} API error ({status}): {message}")]
    Api {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("No choices returned from {provider} API")]
    EmptyResponse { provider: String },
}

/// Per-call generation options
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub stop: Vec<String>,
}

impl CallOptions {
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Trait for text-completion backends
///
/// Allows abstraction over hosted APIs, local servers and scripted test doubles.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate a completion for a single prompt
    async fn generate(&self, prompt: &str, options: &CallOptions) -> Result<String, LlmError>;

    /// Get the model name
    fn model_name(&self) -> &str;
}
