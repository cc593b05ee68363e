//! Ollama-compatible chat client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LlmError, LlmResult};
use crate::generator::TextGenerator;

const DEFAULT_HOST: &str = "https://ollama.com";
const DEFAULT_MODEL: &str = "gemini-3-flash-preview:cloud";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Configuration for the Ollama client.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Base URL of the Ollama API
    pub host: String,
    /// Bearer token; required
    pub api_key: Option<String>,
    /// Model name
    pub model: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl OllamaConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string()),
            api_key: std::env::var("OLLAMA_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            model: std::env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            timeout: Duration::from_secs(
                std::env::var("LLM_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    stream: bool,
    format: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

/// Client for an Ollama `/api/chat` endpoint.
pub struct OllamaClient {
    http: Client,
    config: OllamaConfig,
    api_key: String,
}

impl OllamaClient {
    /// Create a new client. Fails if no API key is configured.
    pub fn new(config: OllamaConfig) -> LlmResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| LlmError::config("OLLAMA_API_KEY is not set"))?;

        let http = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            http,
            config,
            api_key,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> LlmResult<Self> {
        Self::new(OllamaConfig::from_env())
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    async fn generate_json(&self, prompt: &str, system: Option<&str>) -> LlmResult<String> {
        let url = format!("{}/api/chat", self.config.host.trim_end_matches('/'));

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        let request = ChatRequest {
            model: &self.config.model,
            stream: false,
            format: "json",
            messages,
        };

        debug!(model = %self.config.model, prompt_chars = prompt.len(), "Sending chat request");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::request_failed(format!(
                "chat endpoint returned {}: {}",
                status, body
            )));
        }

        let chat: ChatResponse = response.json().await?;
        let content = chat
            .message
            .map(|m| m.content.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| LlmError::invalid_response("LLM response missing message content"))?;

        Ok(content)
    }
}
