//! Chat-completion providers
//!
//! `OpenAICompleter` talks to any OpenAI-compatible `/chat/completions`
//! endpoint. `EchoCompleter` answers from the retrieved context so the whole
//! chat path works offline.

use crate::config::CompletionConfig;
use crate::errors::{AppError, Result};
use crate::models::{latest_user_message, ChatTurn, Role};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const PROVIDER: &str = "completion";

/// Generation parameters forwarded to the provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1000,
        }
    }
}

/// Trait for chat completion
#[async_trait]
pub trait Completer: Send + Sync {
    /// Produce the assistant reply for an ordered list of turns
    async fn complete(&self, messages: &[ChatTurn], options: CompletionOptions) -> Result<String>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// OpenAI chat-completions client
pub struct OpenAICompleter {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatTurn],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorMessage,
}

#[derive(Deserialize)]
struct ApiErrorMessage {
    message: String,
}

impl OpenAICompleter {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AppError::Configuration {
                message: "completion.api_key (OPENAI_API_KEY) is required for the openai completion provider"
                    .to_string(),
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        let base = config
            .api_base
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            endpoint: format!("{}/chat/completions", base.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl Completer for OpenAICompleter {
    async fn complete(&self, messages: &[ChatTurn], options: CompletionOptions) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::provider(PROVIDER, format!("LLM API request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            // Surface the provider's own message when it sends the usual error envelope
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or(body);
            return Err(AppError::provider(
                PROVIDER,
                format!("LLM API error {}: {}", status, message),
            ));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::provider(PROVIDER, format!("Failed to parse LLM response: {}", e)))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AppError::provider(PROVIDER, "Empty response from LLM"))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Offline completer that replies with the retrieved context.
///
/// The reply quotes the context section of the system turn when present,
/// otherwise it acknowledges the latest user message.
#[derive(Debug, Default, Clone)]
pub struct EchoCompleter;

#[async_trait]
impl Completer for EchoCompleter {
    async fn complete(&self, messages: &[ChatTurn], _options: CompletionOptions) -> Result<String> {
        let context = messages
            .iter()
            .find(|t| t.role == Role::System)
            .and_then(|t| crate::context::extract_context(&t.content));

        let question = latest_user_message(messages).unwrap_or_default();

        Ok(match context {
            Some(context) => format!(
                "From what I know: {}",
                context.split("\n---\n").collect::<Vec<_>>().join(" ")
            ),
            None => format!("I don't have anything on file about that yet. You asked: {}", question),
        })
    }

    fn model_name(&self) -> &str {
        "echo"
    }
}

/// Create a completer based on configuration
pub fn create_completer(config: &CompletionConfig) -> Result<Arc<dyn Completer>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAICompleter::new(config)?)),
        "echo" => Ok(Arc::new(EchoCompleter)),
        other => Err(AppError::Configuration {
            message: format!("unknown completion provider '{}'", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PromptBuilder;

    #[tokio::test]
    async fn test_echo_quotes_context() {
        let turns = PromptBuilder::new(None).build(
            &[ChatTurn::user("What color does Doug like?")],
            &["Doug likes blue.".to_string()],
        );
        let reply = EchoCompleter.complete(&turns, CompletionOptions::default()).await.unwrap();
        assert!(reply.contains("blue"));
    }

    #[tokio::test]
    async fn test_echo_without_context() {
        let turns = vec![ChatTurn::user("hello there")];
        let reply = EchoCompleter.complete(&turns, CompletionOptions::default()).await.unwrap();
        assert!(reply.contains("hello there"));
    }

    #[test]
    fn test_chat_request_wire_format() {
        let turns = vec![ChatTurn::system("be nice"), ChatTurn::user("hi")];
        let request = ChatRequest {
            model: "gpt-4o",
            messages: &turns,
            max_tokens: 1000,
            temperature: 0.7,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4o");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert_eq!(json["max_tokens"], 1000);
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let config = CompletionConfig {
            provider: "carrier-pigeon".to_string(),
            ..CompletionConfig::default()
        };
        assert!(create_completer(&config).is_err());
    }
}
