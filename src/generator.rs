//! Content generation via an OpenRouter-compatible chat completion API
//!
//! The agent only needs "a callable that may fail": the [`Generator`] trait
//! keeps the breaker and the orchestration code oblivious to which API is
//! behind it, and lets tests substitute a scripted implementation.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::RwLock;
use std::time::Duration;

use crate::constants::{LLM_TEMPERATURE, LLM_TIMEOUT_SECS, MAX_LLM_TOKENS};

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("system prompt is not set, configure the agent personality")]
    NoSystemPrompt,
    #[error("API error: {0}")]
    Api(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("completion was empty")]
    EmptyCompletion,
}

impl From<reqwest::Error> for GeneratorError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GeneratorError::Timeout
        } else {
            GeneratorError::Network(e.to_string())
        }
    }
}

/// A text generator with a runtime-adjustable system prompt.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate post content, optionally steered by user guidance.
    async fn generate(&self, guidance: Option<&str>) -> Result<String, GeneratorError>;

    /// Replace the system prompt (the `!set-prompt` command).
    fn set_system_prompt(&self, prompt: &str);

    /// Model identifier for status display.
    fn model(&self) -> &str;
}

pub struct OpenRouterGenerator {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    system_prompt: RwLock<String>,
}

impl OpenRouterGenerator {
    pub fn new(api_key: &str, model: &str, base_url: &str) -> Result<Self, GeneratorError> {
        // The request timeout doubles as the generation timeout the circuit
        // breaker relies on: a hung API surfaces as a failure here.
        let client = Client::builder()
            .timeout(Duration::from_secs(LLM_TIMEOUT_SECS))
            .build()?;

        tracing::info!("Initialized OpenRouter generator with model: {}", model);
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            system_prompt: RwLock::new(String::new()),
        })
    }

    fn current_prompt(&self) -> String {
        self.system_prompt
            .read()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, GeneratorError> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user}
            ],
            "temperature": LLM_TEMPERATURE,
            "max_tokens": MAX_LLM_TOKENS,
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(GeneratorError::Api(format!("status {}: {}", status, text)));
        }

        let response: ChatResponse = response.json().await?;
        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        let content = content.trim().to_string();
        if content.is_empty() {
            return Err(GeneratorError::EmptyCompletion);
        }
        Ok(content)
    }
}

#[async_trait]
impl Generator for OpenRouterGenerator {
    async fn generate(&self, guidance: Option<&str>) -> Result<String, GeneratorError> {
        let system = self.current_prompt();
        if system.trim().is_empty() {
            return Err(GeneratorError::NoSystemPrompt);
        }

        let user = match guidance {
            Some(guidance) => format!(
                "User guidance: {}\n\n\
                 Generate a Nostr post following this guidance. \
                 Keep it concise (under 500 characters), engaging, and authentic.",
                guidance
            ),
            None => "Generate a witty Nostr post. \
                     Keep it concise (under 500 characters), engaging, and authentic. \
                     No hashtags unless natural."
                .to_string(),
        };

        tracing::info!("Generating content with LLM...");
        let content = self.complete(&system, &user).await?;
        tracing::info!("Generated content ({} chars)", content.chars().count());
        Ok(content)
    }

    fn set_system_prompt(&self, prompt: &str) {
        if let Ok(mut current) = self.system_prompt.write() {
            *current = prompt.to_string();
            tracing::info!("System prompt updated");
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: Option<String>,
}
