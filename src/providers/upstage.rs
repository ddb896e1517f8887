//! Upstage Solar API client
//!
//! Chat completions for generation and the groundedness-check model for
//! verification. Uses a long-lived reqwest::Client for connection pooling.

use crate::error::AdvisorError;
use crate::models::GroundednessVerdict;
use crate::providers::{Generator, GroundednessChecker};
use crate::session::{ChatMessage, MessageRole};
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

pub const DEFAULT_BASE_URL: &str = "https://api.upstage.ai/v1/solar";
pub const DEFAULT_CHAT_MODEL: &str = "solar-pro";
const GROUNDEDNESS_MODEL: &str = "groundedness-check";

/// Reusable Upstage client (connection-pooled)
pub struct UpstageClient {
    client: Client,
    api_key: String,
    base_url: String,
    chat_model: String,
}

impl UpstageClient {
    pub fn new(
        api_key: String,
        base_url: impl Into<String>,
        chat_model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            chat_model: chat_model.into(),
        })
    }

    async fn complete(&self, model: &str, messages: Vec<Message>) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(AdvisorError::Config("UPSTAGE_API_KEY not configured".to_string()));
        }

        let url = format!("{}/chat/completions", self.base_url);
        let request = CompletionRequest {
            model: model.to_string(),
            messages,
            temperature: 0.0,
        };

        debug!(model = %model, "Calling Upstage API");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, "Upstage API error response: {}", error_text);
            return Err(AdvisorError::Generation(format!(
                "Upstage API returned {}: {}",
                status, error_text
            )));
        }

        let completion: CompletionResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Upstage response: {}", e);
            AdvisorError::Generation(format!("Upstage parse error: {}", e))
        })?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AdvisorError::Generation("Empty response from Upstage".to_string()))
    }
}

/// System prompt, then prior turns, then the current input
fn build_messages(system_prompt: &str, history: &[ChatMessage], user_input: &str) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(Message::new("system", system_prompt));
    for msg in history {
        let role = match msg.role {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        };
        messages.push(Message::new(role, &msg.content));
    }
    messages.push(Message::new("user", user_input));
    messages
}

#[async_trait]
impl Generator for UpstageClient {
    async fn generate(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
        user_input: &str,
    ) -> Result<String> {
        let messages = build_messages(system_prompt, history, user_input);
        self.complete(&self.chat_model, messages).await
    }
}

#[async_trait]
impl GroundednessChecker for UpstageClient {
    async fn check(&self, context: &str, answer: &str) -> Result<GroundednessVerdict> {
        let messages = vec![Message::new("user", context), Message::new("assistant", answer)];
        let raw = self
            .complete(GROUNDEDNESS_MODEL, messages)
            .await
            .map_err(|e| AdvisorError::Groundedness(e.to_string()))?;

        Ok(GroundednessVerdict::parse(&raw))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

impl Message {
    fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}
