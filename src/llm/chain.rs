//! Prompt template + language model + JSON-markdown output parser

use super::{CallOptions, JsonMarkdownParser, LanguageModel, LlmError, OutputParseError};
use crate::query_constructor::{PromptError, PromptTemplate};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Output(#[from] OutputParseError),
}

/// Formats a prompt, calls the model once and parses its JSON answer
pub struct LlmChain {
    llm: Arc<dyn LanguageModel>,
    prompt: PromptTemplate,
    options: CallOptions,
    parser: JsonMarkdownParser,
}

impl LlmChain {
    pub fn new(llm: Arc<dyn LanguageModel>, prompt: PromptTemplate) -> Self {
        Self {
            llm,
            prompt,
            options: CallOptions::default(),
            parser: JsonMarkdownParser::new(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.options.temperature = Some(temperature);
        self
    }

    pub fn with_options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }

    pub async fn call(&self, inputs: &HashMap<String, String>) -> Result<Value, ChainError> {
        let prompt = self.prompt.format(inputs)?;

        tracing::debug!(
            "Calling {} with {} byte prompt",
            self.llm.model_name(),
            prompt.len()
        );

        let completion = self.llm.generate(&prompt, &self.options).await?;

        tracing::debug!("Model completion: {}", completion);

        Ok(self.parser.parse(&completion)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct EchoModel {
        seen: Mutex<Vec<(String, CallOptions)>>,
        reply: String,
    }

    #[async_trait]
    impl LanguageModel for EchoModel {
        async fn generate(&self, prompt: &str, options: &CallOptions) -> Result<String, LlmError> {
            self.seen
                .lock()
                .unwrap()
                .push((prompt.to_string(), options.clone()));
            Ok(self.reply.clone())
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    #[tokio::test]
    async fn test_chain_formats_calls_and_parses() {
        let model = Arc::new(EchoModel {
            seen: Mutex::new(Vec::new()),
            reply: "```json\n{\"query\": \"ok\"}\n```".to_string(),
        });
        let chain = LlmChain::new(
            model.clone(),
            PromptTemplate::new("Q: {{query}}", vec!["query".to_string()]),
        )
        .with_temperature(0.0);

        let mut inputs = HashMap::new();
        inputs.insert("query".to_string(), "hello".to_string());
        let value = chain.call(&inputs).await.unwrap();

        assert_eq!(value["query"], "ok");
        let seen = model.seen.lock().unwrap();
        assert_eq!(seen[0].0, "Q: hello");
        assert_eq!(seen[0].1.temperature, Some(0.0));
    }

    #[tokio::test]
    async fn test_chain_missing_input() {
        let model = Arc::new(EchoModel {
            seen: Mutex::new(Vec::new()),
            reply: String::new(),
        });
        let chain = LlmChain::new(
            model.clone(),
            PromptTemplate::new("Q: {{query}}", vec!["query".to_string()]),
        );

        let err = chain.call(&HashMap::new()).await.unwrap_err();
        assert!(matches!(err, ChainError::Prompt(_)));
        assert!(model.seen.lock().unwrap().is_empty());
    }
}
