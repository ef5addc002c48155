//! Backend Selection
//!
//! Which vendor serves generation, and where each one reads its API key
//! and model override from.

use std::str::FromStr;

use anyhow::{anyhow, Result};

pub const BACKEND_ENV: &str = "AGENT_BACKEND";

/// LLM backend provider selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AgentBackend {
    #[default]
    Anthropic,
    OpenAi,
    Gemini,
}

impl AgentBackend {
    /// Read `AGENT_BACKEND`; unset means Anthropic
    pub fn from_env() -> Result<Self> {
        match std::env::var(BACKEND_ENV) {
            Ok(value) => value.parse().map_err(|e: ParseBackendError| anyhow!("{}", e)),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AgentBackend::Anthropic => "Anthropic",
            AgentBackend::OpenAi => "OpenAI",
            AgentBackend::Gemini => "Gemini",
        }
    }

    /// Environment variable holding the API key
    pub fn api_key_env(&self) -> &'static str {
        match self {
            AgentBackend::Anthropic => "ANTHROPIC_API_KEY",
            AgentBackend::OpenAi => "OPENAI_API_KEY",
            AgentBackend::Gemini => "GEMINI_API_KEY",
        }
    }

    /// Environment variable overriding the model
    pub fn model_env(&self) -> &'static str {
        match self {
            AgentBackend::Anthropic => "ANTHROPIC_MODEL",
            AgentBackend::OpenAi => "OPENAI_MODEL",
            AgentBackend::Gemini => "GEMINI_MODEL",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            AgentBackend::Anthropic => "claude-sonnet-4-20250514",
            AgentBackend::OpenAi => "gpt-4o",
            AgentBackend::Gemini => "gemini-2.0-flash",
        }
    }

    /// Model from the override variable, else the default
    pub fn model_from_env(&self) -> String {
        std::env::var(self.model_env())
            .ok()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| self.default_model().to_string())
    }

    /// API key from the environment
    pub fn api_key_from_env(&self) -> Result<String> {
        std::env::var(self.api_key_env())
            .map_err(|_| anyhow!("{} environment variable not set", self.api_key_env()))
    }
}

/// Error type for parsing AgentBackend
#[derive(Debug)]
pub struct ParseBackendError(String);

impl std::fmt::Display for ParseBackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ParseBackendError {}

impl FromStr for AgentBackend {
    type Err = ParseBackendError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "anthropic" | "claude" => Ok(AgentBackend::Anthropic),
            "openai" | "gpt" => Ok(AgentBackend::OpenAi),
            "gemini" | "google" => Ok(AgentBackend::Gemini),
            other => Err(ParseBackendError(format!(
                "unknown backend '{}' (expected anthropic, openai or gemini)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for AgentBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
