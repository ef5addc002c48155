//! Gemini Client
//!
//! Generative Language API adapter. Gemini calls the assistant role
//! `model` and takes the system prompt as `systemInstruction`.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::backend::AgentBackend;
use super::llm_client::{LlmClient, PromptMessage, Sampling};
use crate::types::Role;

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Clone)]
pub struct GeminiClient {
    api_key: String,
    client: reqwest::Client,
    model: String,
    sampling: Sampling,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        Self::with_model(api_key, &AgentBackend::Gemini.model_from_env())
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
        Ok(Self::new(AgentBackend::Gemini.api_key_from_env()?))
    }

    fn body(&self, system_prompt: &str, transcript: &[PromptMessage]) -> Value {
        let contents: Vec<Value> = transcript
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                };
                json!({"role": role, "parts": [{"text": m.content}]})
            })
            .collect();
        json!({
            "systemInstruction": {"parts": [{"text": system_prompt}]},
            "contents": contents,
            "generationConfig": {
                "maxOutputTokens": self.sampling.max_tokens,
                "temperature": self.sampling.temperature,
            },
        })
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, system_prompt: &str, transcript: &[PromptMessage]) -> Result<String> {
        let url = format!("{}/{}:generateContent", BASE_URL, self.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&self.body(system_prompt, transcript))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Gemini API error {}: {}", status, body));
        }

        #[derive(Deserialize)]
        struct Part {
            text: Option<String>,
        }
        #[derive(Deserialize)]
        struct Content {
            #[serde(default)]
            parts: Vec<Part>,
        }
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Candidate {
            content: Option<Content>,
            #[serde(default)]
            finish_reason: Option<String>,
        }
        #[derive(Deserialize)]
        struct ApiResponse {
            #[serde(default)]
            candidates: Vec<Candidate>,
        }

        let api_response: ApiResponse = response.json().await?;
        let candidate = api_response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Gemini returned no candidates"))?;
        if let Some(reason) = candidate.finish_reason.as_deref().filter(|r| *r != "STOP") {
            tracing::warn!(model = %self.model, reason, "Gemini stopped early");
        }
        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(anyhow!("Empty response from Gemini"));
        }
        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &str {
        "Gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assistant_role_is_model() {
        let client = GeminiClient::with_model("test-key".to_string(), "gemini-1.5-pro");
        assert_eq!(client.model_name(), "gemini-1.5-pro");

        let body = client.body(
            "Be kind.",
            &[PromptMessage::user("hi"), PromptMessage::assistant("hello"), PromptMessage::user("ok")],
        );
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be kind.");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 2048);
    }
}
