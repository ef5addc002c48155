//! Anthropic Client
//!
//! Messages API adapter. The transcript maps one-to-one onto
//! `messages`; the system prompt travels in its own field.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::backend::AgentBackend;
use super::llm_client::{LlmClient, PromptMessage, Sampling};
use crate::types::Role;

const ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

#[derive(Clone)]
pub struct AnthropicClient {
    api_key: String,
    client: reqwest::Client,
    model: String,
    sampling: Sampling,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Deserialize)]
struct WireResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

impl AnthropicClient {
    pub fn new(api_key: String) -> Self {
        Self::with_model(api_key, &AgentBackend::Anthropic.model_from_env())
    }

    pub fn with_model(api_key: String, model: &str) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
            model: model.to_string(),
            sampling: Sampling::default(),
        }
    }

    pub fn with_sampling(mut self, sampling: Sampling) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(AgentBackend::Anthropic.api_key_from_env()?))
    }

    fn request<'a>(&'a self, system_prompt: &'a str, transcript: &'a [PromptMessage]) -> WireRequest<'a> {
        WireRequest {
            model: &self.model,
            max_tokens: self.sampling.max_tokens,
            temperature: self.sampling.temperature,
            system: system_prompt,
            messages: transcript
                .iter()
                .map(|m| WireMessage {
                    role: match m.role {
                        Role::User => "user",
                        Role::Assistant => "assistant",
                    },
                    content: &m.content,
                })
                .collect(),
        }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, system_prompt: &str, transcript: &[PromptMessage]) -> Result<String> {
        let response = self
            .client
            .post(ENDPOINT)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&self.request(system_prompt, transcript))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Anthropic API error {}: {}", status, body));
        }

        let body: WireResponse = response.json().await?;
        if body.stop_reason.as_deref() == Some("max_tokens") {
            tracing::warn!(model = %self.model, "Anthropic reply truncated at max_tokens");
        }
        let text: String = body.content.into_iter().filter_map(|b| b.text).collect();
        if text.trim().is_empty() {
            return Err(anyhow!("Empty response from Anthropic"));
        }
        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &str {
        "Anthropic"
    }
}
