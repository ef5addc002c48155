//! LLM Client Trait
//!
//! Provider-neutral chat completion over a short transcript. Each vendor
//! client maps [`PromptMessage`] roles onto its own wire format.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use super::{AgentBackend, AnthropicClient, GeminiClient, OpenAiClient};
use crate::types::Role;

/// One transcript entry sent to a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Reshape a transcript so it opens with a user turn and roles
/// alternate. Leading assistant turns are dropped and consecutive turns
/// from the same speaker are joined.
pub fn alternate(messages: impl IntoIterator<Item = PromptMessage>) -> Vec<PromptMessage> {
    let mut out: Vec<PromptMessage> = Vec::new();
    for message in messages {
        if message.content.trim().is_empty() {
            continue;
        }
        match out.last_mut() {
            None if message.role == Role::Assistant => {}
            Some(last) if last.role == message.role => {
                last.content.push_str("\n\n");
                last.content.push_str(&message.content);
            }
            _ => out.push(message),
        }
    }
    out
}

/// Sampling settings shared by all providers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for Sampling {
    fn default() -> Self {
        Self {
            max_tokens: 2048,
            temperature: 0.3,
        }
    }
}

/// Unified LLM client interface
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Complete the transcript, which ends with a user turn
    async fn complete(&self, system_prompt: &str, transcript: &[PromptMessage]) -> Result<String>;

    /// Get the model name for logging
    fn model_name(&self) -> &str;

    /// Get the provider name for logging
    fn provider_name(&self) -> &str;
}

/// Build the client selected by `AGENT_BACKEND`, reading its API key from
/// the environment
pub fn create_llm_client() -> Result<Arc<dyn LlmClient>> {
    client_for(AgentBackend::from_env()?)
}

/// Build the client for an explicit backend
pub fn client_for(backend: AgentBackend) -> Result<Arc<dyn LlmClient>> {
    let client: Arc<dyn LlmClient> = match backend {
        AgentBackend::Anthropic => Arc::new(AnthropicClient::from_env()?),
        AgentBackend::OpenAi => Arc::new(OpenAiClient::from_env()?),
        AgentBackend::Gemini => Arc::new(GeminiClient::from_env()?),
    };
    tracing::info!(
        provider = client.provider_name(),
        model = client.model_name(),
        "generation backend selected"
    );
    Ok(client)
}
