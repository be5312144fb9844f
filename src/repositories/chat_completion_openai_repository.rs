use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    configuration::GenerationSettings,
    helper::error_chain_fmt,
    ports::completion_client::{CompletionClient, CompletionClientError},
};

/// Client for an OpenAI-compatible chat-completion API.
///
/// Decoding parameters (model, max tokens, temperature) are fixed from the
/// configuration. Every call is bounded by the configured timeout: a hung
/// upstream must not hang the request with it.
pub struct ChatCompletionOpenAiRepository {
    client: Client,
    base_url: String,
    api_key: Secret<String>,
    model: String,
    max_tokens: u16,
    temperature: f32,
}

#[derive(thiserror::Error)]
pub enum ChatCompletionOpenAiRepositoryError {
    #[error("Failed to build the HTTP client: {0}")]
    ClientError(#[from] reqwest::Error),
}

impl std::fmt::Debug for ChatCompletionOpenAiRepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ChatCompletionOpenAiRepository {
    pub fn new(settings: &GenerationSettings) -> Result<Self, ChatCompletionOpenAiRepositoryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
        })
    }
}

#[async_trait]
impl CompletionClient for ChatCompletionOpenAiRepository {
    #[tracing::instrument(name = "Requesting chat completion", skip(self, system_prompt, user_prompt))]
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, CompletionClientError> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    CompletionClientError::Timeout
                } else {
                    CompletionClientError::Transport(error.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CompletionClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|error| CompletionClientError::Transport(error.to_string()))?;

        info!("Received completion from the generation service");

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().to_string())
            .ok_or(CompletionClientError::EmptyResponse)
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u16,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    content: String,
}
