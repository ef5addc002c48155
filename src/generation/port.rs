//! Adapter from [`LlmClient`] to [`TextGenerationPort`]
//!
//! Renders a [`GenerationRequest`] into a system prompt (stage
//! instructions plus the response contract) and a transcript: recent
//! history as real chat turns, closed by a user turn carrying the stage
//! and context JSON. Vendor errors fold into [`GenerationError`].

use std::sync::Arc;

use async_trait::async_trait;

use super::llm_client::{alternate, PromptMessage};
use super::{GenerationRequest, LlmClient, TextGenerationPort};
use crate::contract::protocol_instructions;
use crate::error::GenerationError;
use crate::types::Role;

pub struct LlmGenerationPort {
    client: Arc<dyn LlmClient>,
}

impl LlmGenerationPort {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    pub fn system_prompt(request: &GenerationRequest) -> String {
        format!(
            "{}\n\n{}",
            request.instructions.trim(),
            protocol_instructions()
        )
    }

    /// History turns followed by the stage/context block
    pub fn transcript(request: &GenerationRequest) -> Vec<PromptMessage> {
        let context = serde_json::to_string_pretty(&request.context)
            .unwrap_or_else(|_| request.context.to_string());
        let briefing = format!("## Stage\n{}\n\n## Context\n{}", request.stage, context);

        let history = request.history.iter().map(|m| match m.role {
            Role::User => PromptMessage::user(m.content.as_str()),
            Role::Assistant => PromptMessage::assistant(m.content.as_str()),
        });
        alternate(history.chain(std::iter::once(PromptMessage::user(briefing))))
    }
}

#[async_trait]
impl TextGenerationPort for LlmGenerationPort {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        tracing::debug!(
            provider = self.client.provider_name(),
            model = self.client.model_name(),
            stage = %request.stage,
            task = ?request.task,
            "generation request"
        );
        let text = self
            .client
            .complete(&Self::system_prompt(request), &Self::transcript(request))
            .await
            .map_err(|e| GenerationError::Backend(format!("{:#}", e)))?;

        if text.trim().is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        Ok(text)
    }
}
