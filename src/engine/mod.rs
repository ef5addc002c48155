//! Stage Engine
//!
//! The engine owns per-stage logic and the transition table. One call to
//! [`StageEngine::step`] runs the current stage's handler once, applies
//! the returned deltas, then evaluates the transition guards:
//!
//! ```text
//! step(state, input)
//!   ├─ handler(stage, &state, input) ──► HandlerOutput { changes, messages }
//!   │      recoverable StageError ─────► recovery message, no changes
//!   ├─ state.apply(change) for each change
//!   ├─ guards::next_transition ────────► StateChange::Transition
//!   └─ blockers refreshed
//! ```
//!
//! Handlers read state but never write it. Chaining across stages is the
//! runner's job, not the engine's.

pub mod guards;
pub mod prompts;

mod hypothesis;
mod intake;
mod questionnaire;
mod severity;
mod solution;
mod validation;

use std::sync::Arc;

use serde_json::Value;

use crate::config::FlowConfig;
use crate::contract::{ParsedResponse, ResponseContractParser};
use crate::error::{GenerationError, StageError};
use crate::evidence::{EvidenceStore, HypothesisRanker, TimeoutEvidenceStore};
use crate::generation::{bounded_history, GenerationRequest, GenerationTask, TextGenerationPort};
use crate::severity::SeverityScaleRegistry;
use crate::state::{SessionState, StateChange};
use crate::types::Stage;

/// Result of one handler step
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    /// Stage whose handler ran
    pub stage: Stage,
    /// Outward messages, in order
    pub messages: Vec<String>,
    /// Transition taken after the handler, if any
    pub transition: Option<(Stage, Stage)>,
    /// Handler asked to run again without waiting for input
    pub follow_up: bool,
    /// Recoverable error absorbed during the step
    pub recovered: Option<StageError>,
}

impl StepOutcome {
    /// Whether the runner should invoke the engine again this turn
    pub fn should_chain(&self) -> bool {
        self.transition.is_some() || self.follow_up
    }
}

/// What a stage handler returns
#[derive(Debug, Default)]
pub(crate) struct HandlerOutput {
    changes: Vec<StateChange>,
    messages: Vec<String>,
    follow_up: bool,
}

impl HandlerOutput {
    fn none() -> Self {
        Self::default()
    }

    fn message(text: impl Into<String>) -> Self {
        let mut output = Self::default();
        output.say(text);
        output
    }

    fn change(&mut self, change: StateChange) -> &mut Self {
        self.changes.push(change);
        self
    }

    /// Queue an outward message; blank text is dropped
    fn say(&mut self, text: impl Into<String>) -> &mut Self {
        let text = text.into();
        if !text.trim().is_empty() {
            self.messages.push(text.trim().to_string());
        }
        self
    }
}

pub struct StageEngine {
    config: Arc<FlowConfig>,
    evidence: Arc<dyn EvidenceStore>,
    generator: Arc<dyn TextGenerationPort>,
    ranker: HypothesisRanker,
    scales: SeverityScaleRegistry,
}

impl StageEngine {
    pub fn new(
        config: Arc<FlowConfig>,
        evidence: Arc<dyn EvidenceStore>,
        generator: Arc<dyn TextGenerationPort>,
    ) -> Self {
        let evidence: Arc<dyn EvidenceStore> =
            Arc::new(TimeoutEvidenceStore::new(evidence, config.retrieval_timeout()));
        Self {
            ranker: HypothesisRanker::new(config.retrieval_top_k, config.candidate_count),
            scales: SeverityScaleRegistry::new(config.severity_scales.clone()),
            config,
            evidence,
            generator,
        }
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// Run the current stage once and evaluate transitions.
    ///
    /// Returns `Err` only for `InvariantViolation`; every other error is
    /// turned into a message and leaves state untouched.
    pub async fn step(
        &self,
        state: &mut SessionState,
        input: Option<&str>,
    ) -> Result<StepOutcome, StageError> {
        let stage = state.stage;
        let input = input.map(str::trim).filter(|s| !s.is_empty());

        let (output, recovered) = match self.dispatch(stage, state, input).await {
            Ok(output) => (output, None),
            Err(err) if err.is_recoverable() => {
                tracing::warn!(
                    session_id = %state.session_id,
                    stage = %stage,
                    kind = err.kind(),
                    error = %err,
                    "stage step recovered"
                );
                (HandlerOutput::message(self.recovery_message(&err, state)), Some(err))
            }
            Err(err) => {
                tracing::error!(
                    session_id = %state.session_id,
                    stage = %stage,
                    error = %err,
                    "invariant violation"
                );
                return Err(err);
            }
        };

        for change in output.changes {
            state.apply(change);
        }

        let transition = guards::next_transition(state, &self.config).map(|rule| {
            tracing::info!(
                session_id = %state.session_id,
                from = %rule.from,
                to = %rule.to,
                guard = rule.name,
                "stage transition"
            );
            state.apply(StateChange::Transition {
                to: rule.to,
                reason: rule.name.to_string(),
            });
            (rule.from, rule.to)
        });

        self.refresh_blockers(state);

        Ok(StepOutcome {
            stage,
            messages: output.messages,
            transition,
            follow_up: output.follow_up,
            recovered,
        })
    }

    /// Recompute blockers, touching state only when they changed
    pub fn refresh_blockers(&self, state: &mut SessionState) {
        let blockers = guards::blockers(state, &self.config);
        if blockers != state.blockers {
            state.apply(StateChange::Blockers(blockers));
        }
    }

    async fn dispatch(
        &self,
        stage: Stage,
        state: &SessionState,
        input: Option<&str>,
    ) -> Result<HandlerOutput, StageError> {
        match stage {
            Stage::Intake => self.run_intake(state, input).await,
            Stage::Hypothesis => self.run_hypothesis(state).await,
            Stage::Validation => self.run_validation(state, input).await,
            Stage::Severity => self.run_severity(state, input).await,
            Stage::Solution => self.run_solution(state).await,
            Stage::Terminal => Ok(match input {
                Some(_) => HandlerOutput::message(prompts::SESSION_COMPLETE),
                None => HandlerOutput::none(),
            }),
        }
    }

    fn recovery_message(&self, err: &StageError, state: &SessionState) -> String {
        match err {
            StageError::RetrievalUnavailable(_) => prompts::RETRIEVAL_APOLOGY.to_string(),
            StageError::GenerationFailure(_) => prompts::GENERATION_APOLOGY.to_string(),
            StageError::InputValidationFailure { stage, .. } => {
                let hint = prompts::answer_hint(self.config.answer_min, self.config.answer_max);
                let current = match stage {
                    Stage::Validation => state.validation.questionnaire.current_question(),
                    Stage::Severity => state.severity.questionnaire.current_question(),
                    _ => None,
                };
                match current {
                    Some(question) => format!("{}\n{}", hint, question.text),
                    None => hint,
                }
            }
            StageError::ContractViolation { stage, .. } => match stage {
                Stage::Hypothesis => prompts::HYPOTHESIS_RETRY.to_string(),
                Stage::Validation | Stage::Severity => {
                    let questionnaire = if *stage == Stage::Validation {
                        &state.validation.questionnaire
                    } else {
                        &state.severity.questionnaire
                    };
                    if questionnaire.is_started() {
                        prompts::SCORING_RETRY.to_string()
                    } else {
                        prompts::QUESTIONS_RETRY.to_string()
                    }
                }
                _ => prompts::GENERATION_APOLOGY.to_string(),
            },
            StageError::InvariantViolation { .. } => prompts::SESSION_ABORTED.to_string(),
        }
    }

    /// One generation call with timeout, parsed through the response contract
    async fn generate(
        &self,
        state: &SessionState,
        task: GenerationTask,
        instructions: &str,
        context: Value,
    ) -> Result<ParsedResponse, StageError> {
        let request = GenerationRequest {
            stage: state.stage,
            task,
            instructions: instructions.to_string(),
            context,
            history: bounded_history(
                &state.messages,
                self.config.history_window,
                self.config.history_message_chars,
            ),
        };

        let timeout = self.config.generation_timeout();
        let raw = tokio::time::timeout(timeout, self.generator.generate(&request))
            .await
            .map_err(|_| GenerationError::Timeout(timeout))??;
        if raw.trim().is_empty() {
            return Err(GenerationError::EmptyResponse.into());
        }

        tracing::debug!(
            session_id = %state.session_id,
            stage = %state.stage,
            task = ?task,
            chars = raw.len(),
            "generation response"
        );
        Ok(ResponseContractParser::parse(&raw))
    }
}
