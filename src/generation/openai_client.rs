//! OpenAI Client
//!
//! Chat completions adapter; the system prompt is sent as the first
//! message.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::backend::AgentBackend;
use super::llm_client::{LlmClient, PromptMessage, Sampling};
use crate::types::Role;

const ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Clone)]
pub struct OpenAiClient {
    api_key: String,
    client: reqwest::Client,
    model: String,
    sampling: Sampling,
}

impl OpenAiClient {
    pub fn new(api_key: String) -> Self {
        Self::with_model(api_key, &AgentBackend::OpenAi.model_from_env())
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
        Ok(Self::new(AgentBackend::OpenAi.api_key_from_env()?))
    }

    fn body(&self, system_prompt: &str, transcript: &[PromptMessage]) -> Value {
        let mut messages = vec![json!({"role": "system", "content": system_prompt})];
        messages.extend(transcript.iter().map(|m| {
            let role = match m.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            json!({"role": role, "content": m.content})
        }));
        json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": self.sampling.max_tokens,
            "temperature": self.sampling.temperature,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, system_prompt: &str, transcript: &[PromptMessage]) -> Result<String> {
        let response = self
            .client
            .post(ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&self.body(system_prompt, transcript))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("OpenAI API error {}: {}", status, body));
        }

        #[derive(Deserialize)]
        struct Message {
            content: Option<String>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: Message,
            #[serde(default)]
            finish_reason: Option<String>,
        }
        #[derive(Deserialize)]
        struct ApiResponse {
            choices: Vec<Choice>,
        }

        let api_response: ApiResponse = response.json().await?;
        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("OpenAI returned no choices"))?;
        if choice.finish_reason.as_deref() == Some("length") {
            tracing::warn!(model = %self.model, "OpenAI reply truncated at max_tokens");
        }
        choice
            .message
            .content
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| anyhow!("Empty response from OpenAI"))
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &str {
        "OpenAI"
    }
}
