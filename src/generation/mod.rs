//! Text generation
//!
//! [`TextGenerationPort`] is the only thing stage handlers know about the
//! generation backend: a structured request in, raw text out. The vendor
//! clients below implement the lower-level [`LlmClient`] interface and
//! are adapted to the port by [`LlmGenerationPort`].

mod anthropic_client;
mod backend;
mod gemini_client;
mod llm_client;
mod openai_client;
mod port;

pub use anthropic_client::AnthropicClient;
pub use backend::{AgentBackend, ParseBackendError, BACKEND_ENV};
pub use gemini_client::GeminiClient;
pub use llm_client::{alternate, client_for, create_llm_client, LlmClient, PromptMessage, Sampling};
pub use openai_client::OpenAiClient;
pub use port::LlmGenerationPort;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;
use crate::types::{ChatMessage, Stage};

/// What a generation call is for. Backends may ignore it; test doubles
/// use it to script replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationTask {
    IntakeReply,
    SupplementaryQuestion,
    HypothesisReport,
    ValidationQuestions,
    ValidationScoring,
    SeverityQuestions,
    SeverityScoring,
    FinalSummary,
}

/// One structured generation request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub stage: Stage,
    pub task: GenerationTask,
    pub instructions: String,
    /// Structured context (previous stage artifacts, evidence)
    pub context: serde_json::Value,
    /// Bounded recent conversation history
    pub history: Vec<ChatMessage>,
}

/// Generation port
///
/// Pure from the caller's view. Failures, timeouts and empty text are
/// all `Err`; the caller must not mutate state on failure.
#[async_trait]
pub trait TextGenerationPort: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

/// Last `window` messages, each cut to at most `max_chars` characters
pub fn bounded_history(messages: &[ChatMessage], window: usize, max_chars: usize) -> Vec<ChatMessage> {
    let start = messages.len().saturating_sub(window);
    messages[start..]
        .iter()
        .map(|m| {
            let mut m = m.clone();
            if let Some((cut, _)) = m.content.char_indices().nth(max_chars) {
                m.content.truncate(cut);
            }
            m
        })
        .collect()
}
