//! Error types for the intake dialogue engine
//!
//! Port failures (retrieval, generation) have their own enums so adapters
//! can report them without knowing about stages. `StageError` is the
//! taxonomy the engine works with: four recoverable classes that never
//! leave the engine, and `InvariantViolation`, which ends the session.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::types::Stage;

/// Failures of the retrieval collaborator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RetrievalError {
    #[error("retrieval backend unavailable: {0}")]
    Unavailable(String),

    #[error("retrieval timed out after {0:?}")]
    Timeout(Duration),

    #[error("retrieval response could not be decoded: {0}")]
    Decode(String),
}

/// Failures of the generation collaborator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error("generation backend error: {0}")]
    Backend(String),

    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("generation returned empty text")]
    EmptyResponse,
}

/// Errors raised while running a stage handler
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StageError {
    #[error("retrieval unavailable: {0}")]
    RetrievalUnavailable(#[from] RetrievalError),

    #[error("generation failed: {0}")]
    GenerationFailure(#[from] GenerationError),

    #[error("contract violation in {stage}: {detail}")]
    ContractViolation { stage: Stage, detail: String },

    #[error("input rejected in {stage}: {detail}")]
    InputValidationFailure { stage: Stage, detail: String },

    #[error("invariant violated in {stage}: {detail}")]
    InvariantViolation { stage: Stage, detail: String },
}

impl StageError {
    pub fn contract(stage: Stage, detail: impl Into<String>) -> Self {
        StageError::ContractViolation {
            stage,
            detail: detail.into(),
        }
    }

    pub fn input(stage: Stage, detail: impl Into<String>) -> Self {
        StageError::InputValidationFailure {
            stage,
            detail: detail.into(),
        }
    }

    pub fn invariant(stage: Stage, detail: impl Into<String>) -> Self {
        StageError::InvariantViolation {
            stage,
            detail: detail.into(),
        }
    }

    /// Everything except `InvariantViolation` is handled inside the engine
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, StageError::InvariantViolation { .. })
    }

    /// Short class name for logs and reports
    pub fn kind(&self) -> &'static str {
        match self {
            StageError::RetrievalUnavailable(_) => "retrieval_unavailable",
            StageError::GenerationFailure(_) => "generation_failure",
            StageError::ContractViolation { .. } => "contract_violation",
            StageError::InputValidationFailure { .. } => "input_validation_failure",
            StageError::InvariantViolation { .. } => "invariant_violation",
        }
    }
}

/// Errors surfaced to callers of the conversation runner
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("session {0} not found")]
    NotFound(Uuid),

    #[error("session {0} already has a turn in flight")]
    Busy(Uuid),

    #[error("session {0} has already finished")]
    Terminated(Uuid),

    #[error("session {session_id} aborted: {source}")]
    Aborted {
        session_id: Uuid,
        #[source]
        source: StageError,
    },
}

/// Configuration loading and component wiring errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid value for {key}: '{value}'")]
    InvalidEnv { key: String, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("missing component: {0}")]
    MissingComponent(&'static str),
}
