//! OpenAI-compatible chat client
//!
//! Works with OpenAI, Ollama, LM Studio and other local or hosted servers
//! that speak the `/chat/completions` shape.

use async_trait::async_trait;
use reqwest::{header::HeaderMap, Client as HttpClient, StatusCode};
use serde::{Deserialize, Serialize};

use super::chat::ChatMessage;
use super::{ChatProvider, ProviderError};

/// Connection settings for an OpenAI-compatible endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

pub struct OpenAiCompatibleClient {
    config: ProviderConfig,
    http_client: HttpClient,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

impl OpenAiCompatibleClient {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let http_client = HttpClient::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    fn build_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if !self.config.api_key.is_empty() {
            if let Ok(value) = format!("Bearer {}", self.config.api_key).parse() {
                headers.insert(reqwest::header::AUTHORIZATION, value);
            }
        }
        headers
    }
}

#[async_trait]
impl ChatProvider for OpenAiCompatibleClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let body = CompletionRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream: false,
        };

        let response = self
            .http_client
            .post(&url)
            .headers(self.build_headers())
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let parsed: CompletionResponse = response
                    .json()
                    .await
                    .map_err(|_| ProviderError::EmptyReply)?;
                parsed
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.message.content)
                    .filter(|content| !content.trim().is_empty())
                    .ok_or(ProviderError::EmptyReply)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                let message = response.text().await.unwrap_or_default();
                Err(ProviderError::Auth(message))
            }
            status => {
                let message = response.text().await.unwrap_or_default();
                Err(ProviderError::Status {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}
