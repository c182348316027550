//! Grounded-completion clients.
//!
//! The language model is an opaque collaborator: given a system
//! instruction and a user prompt it returns text or fails. Failures are
//! reported as [`Error::Synthesis`] and turned into an `unavailable`
//! answer by the engine.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use health_copilot_core::{Error, Result};

use crate::config::CompletionConfig;

#[async_trait]
pub trait CompletionClient: Send + Sync {
    fn model_name(&self) -> &str;

    async fn complete(&self, system_instruction: &str, user_prompt: &str) -> Result<String>;
}

/// Always fails; answers degrade to `unavailable` with the evidence attached.
pub struct DisabledCompletion;

#[async_trait]
impl CompletionClient for DisabledCompletion {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _system_instruction: &str, _user_prompt: &str) -> Result<String> {
        Err(Error::synthesis("completion provider is disabled"))
    }
}

/// Any OpenAI-compatible `/chat/completions` endpoint (OpenAI, Groq, vLLM, ...).
pub struct OpenAiCompatibleClient {
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl OpenAiCompatibleClient {
    /// # Errors
    ///
    /// [`Error::Configuration`] when the API key variable is unset or empty.
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                Error::configuration(format!(
                    "{} environment variable not set",
                    config.api_key_env
                ))
            })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            client,
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl CompletionClient for OpenAiCompatibleClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system_instruction: &str, user_prompt: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_instruction,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key.trim()))
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::synthesis(format!("completion request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(Error::synthesis(format!(
                "completion service returned {}: {}",
                status, text
            )));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| Error::synthesis(format!("malformed completion response: {}", e)))?;
        parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| Error::synthesis("completion response had no content"))
    }
}

pub fn create_completion_client(config: &CompletionConfig) -> Result<Box<dyn CompletionClient>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledCompletion)),
        "openai" => Ok(Box::new(OpenAiCompatibleClient::new(config)?)),
        other => Err(Error::configuration(format!(
            "unknown completion provider: {}",
            other
        ))),
    }
}
