//! OpenAI-compatible chat completions client (OpenAI, Groq, Ollama, custom)

use super::{CallOptions, LanguageModel, LlmError};
use crate::config::LlmConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "no_stop_sequences")]
    stop: &'a [String],
}

fn no_stop_sequences(stop: &&[String]) -> bool {
    stop.is_empty()
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Default API base URL for a known provider
pub fn default_base_url(provider: &str) -> Option<&'static str> {
    match provider {
        "openai" => Some("https://api.openai.com/v1"),
        "groq" => Some("https://api.groq.com/openai/v1"),
        "ollama" => Some("http://localhost:11434/v1"),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiCompatibleModel {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    provider_name: String,
}

impl OpenAiCompatibleModel {
    pub fn new(
        provider_name: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::InitializationError(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            provider_name: provider_name.into(),
        })
    }

    /// Build a client from the `[llm]` config section
    ///
    /// The API key is read from the environment variable named by
    /// `api_key_env`; only `ollama` may run without one.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let base_url = match &config.base_url {
            Some(url) => url.clone(),
            None => default_base_url(&config.provider)
                .ok_or_else(|| {
                    LlmError::InitializationError(format!(
                        "No base_url configured for provider '{}'",
                        config.provider
                    ))
                })?
                .to_string(),
        };

        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.is_empty());

        if api_key.is_none() && config.provider != "ollama" {
            return Err(LlmError::InitializationError(format!(
                "Environment variable {} is not set",
                config.api_key_env
            )));
        }

        Self::new(
            config.provider.clone(),
            base_url,
            config.model.clone(),
            api_key,
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn endpoint_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl LanguageModel for OpenAiCompatibleModel {
    async fn generate(&self, prompt: &str, options: &CallOptions) -> Result<String, LlmError> {
        let payload = ChatCompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stop: &options.stop,
        };

        let mut req_builder = self
            .client
            .post(self.endpoint_url())
            .header("Content-Type", "application/json")
            .json(&payload);

        if let Some(api_key) = &self.api_key {
            req_builder = req_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req_builder
            .send()
            .await
            .map_err(|e| LlmError::RequestError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<unreadable body: {}>", e));
            return Err(LlmError::Api {
                provider: self.provider_name.clone(),
                status: status.as_u16(),
                message,
            });
        }

        let api_response: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::RequestError(e.to_string()))?;

        api_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or_else(|| LlmError::EmptyResponse {
                provider: self.provider_name.clone(),
            })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_base_urls() {
        assert_eq!(default_base_url("groq"), Some("https://api.groq.com/openai/v1"));
        assert_eq!(default_base_url("ollama"), Some("http://localhost:11434/v1"));
        assert_eq!(default_base_url("custom"), None);
    }

    #[test]
    fn test_endpoint_url_strips_trailing_slash() {
        let model = OpenAiCompatibleModel::new(
            "custom",
            "http://localhost:8080/v1/",
            "local-model",
            None,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(model.endpoint_url(), "http://localhost:8080/v1/chat/completions");
        assert_eq!(model.model_name(), "local-model");
    }

    #[test]
    fn test_request_payload_shape() {
        let stop = vec!["\n\n".to_string()];
        let payload = ChatCompletionRequest {
            model: "m",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            temperature: Some(0.0),
            max_tokens: None,
            stop: &stop,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["temperature"], 0.0);
        assert!(json.get("max_tokens").is_none());
        assert_eq!(json["stop"][0], "\n\n");
    }

    #[test]
    fn test_ollama_needs_no_key() {
        let config = LlmConfig {
            provider: "ollama".to_string(),
            base_url: None,
            api_key_env: "SELFQUERY_TEST_UNSET_OLLAMA_KEY".to_string(),
            model: "llama3.1".to_string(),
            max_tokens: None,
            timeout_secs: 30,
        };
        let model = OpenAiCompatibleModel::from_config(&config).unwrap();
        assert_eq!(model.endpoint_url(), "http://localhost:11434/v1/chat/completions");
    }

    #[test]
    fn test_hosted_provider_needs_key() {
        let config = LlmConfig {
            provider: "openai".to_string(),
            base_url: None,
            api_key_env: "SELFQUERY_TEST_UNSET_OPENAI_KEY".to_string(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: None,
            timeout_secs: 30,
        };
        let err = OpenAiCompatibleModel::from_config(&config).unwrap_err();
        assert!(err.to_string().contains("SELFQUERY_TEST_UNSET_OPENAI_KEY"));
    }
}
